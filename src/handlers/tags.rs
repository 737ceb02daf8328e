use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    error::AppError,
    models::{Page, PageQuery, TagListResponse},
    services::tag,
};

/// list_tags
///
/// [Public Route] Every tag ever used, alphabetically.
#[utoipa::path(
    get,
    path = "/api/tags",
    params(PageQuery),
    responses((status = 200, description = "Tags", body = TagListResponse)),
    tag = "tags"
)]
pub async fn list_tags(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<TagListResponse>, AppError> {
    let (tags, pagination) = tag::list_tags(&*state.repo, Page::from(&page)).await?;
    Ok(Json(TagListResponse { tags, pagination }))
}
