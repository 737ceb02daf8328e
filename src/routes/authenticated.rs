use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Every mutation lives here. The router is wrapped in the auth route layer,
/// and each handler also takes `AuthUser`, which carries the caller's id and
/// role into the ownership checks (author-only update, author-or-admin delete).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /api/user
        // The caller's own account.
        .route(
            "/api/user",
            get(handlers::users::get_current_user).put(handlers::users::update_current_user),
        )
        // GET /api/articles/feed
        // Articles by followed authors. Registered as a static segment, so it
        // wins over the public `/api/articles/{slug}`.
        .route("/api/articles/feed", get(handlers::articles::feed_articles))
        // --- Article Lifecycle ---
        .route("/api/articles", post(handlers::articles::create_article))
        .route(
            "/api/articles/{slug}",
            put(handlers::articles::update_article)
                .delete(handlers::articles::delete_article),
        )
        .route(
            "/api/articles/{slug}/favorite",
            post(handlers::articles::favorite_article)
                .delete(handlers::articles::unfavorite_article),
        )
        // --- Comments ---
        .route(
            "/api/articles/{slug}/comments",
            post(handlers::comments::add_comment),
        )
        .route(
            "/api/articles/{slug}/comments/{id}",
            delete(handlers::comments::delete_comment),
        )
        // --- Social Graph ---
        .route(
            "/api/profiles/{username}/follow",
            post(handlers::profiles::follow_user).delete(handlers::profiles::unfollow_user),
        )
}
