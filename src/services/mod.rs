//! Business rules, one module per resource.
//!
//! Every operation takes the request's `Identity` explicitly and is generic
//! over the narrowest store traits it needs, so handlers pass
//! `&*state.repo` and tests pass an `InMemoryRepository` directly.

pub mod article;
pub mod comment;
pub mod favorite;
pub mod profile;
pub mod slug;
pub mod tag;
pub mod user;
