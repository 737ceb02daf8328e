use axum::Json;
use serde_json::{Value, json};

pub mod articles;
pub mod comments;
pub mod profiles;
pub mod tags;
pub mod users;

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "health"
)]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
