/// Router Module Index
///
/// Routing is split by access level. Protection is applied to a whole
/// router (via a route layer in `create_router`), never per handler, so a
/// new endpoint cannot be exposed by forgetting an extractor.

/// Routes open to everyone. Handlers take the optional `Identity` extractor,
/// so a valid token only personalizes the response.
pub mod public;

/// Routes behind the `AuthUser` route layer. Requires a valid session token.
pub mod authenticated;
