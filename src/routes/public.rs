use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only content plus the account gateway (register, login, logout).
/// Anonymous callers get `favorited=false` and `following=false` everywhere.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(handlers::health))
        // --- Account Gateway ---
        .route("/api/users", post(handlers::users::register))
        .route("/api/users/login", post(handlers::users::login))
        // POST /api/users/logout
        // Expires the session cookie.
        .route("/api/users/logout", post(handlers::users::logout))
        // --- Content ---
        // GET /api/articles?tag=&author=&favorited=&limit=&offset=
        .route("/api/articles", get(handlers::articles::list_articles))
        .route("/api/articles/{slug}", get(handlers::articles::get_article))
        .route(
            "/api/articles/{slug}/comments",
            get(handlers::comments::list_comments),
        )
        .route(
            "/api/profiles/{username}",
            get(handlers::profiles::get_profile),
        )
        .route("/api/tags", get(handlers::tags::list_tags))
}
