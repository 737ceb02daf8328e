use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, Identity},
    error::{AppError, ErrorBody},
    models::{CommentListResponse, CommentResponse, CreateCommentRequest, Page, PageQuery},
    services::comment,
};

/// list_comments
///
/// [Public Route] Comments on a live article, oldest first.
#[utoipa::path(
    get,
    path = "/api/articles/{slug}/comments",
    params(("slug" = String, Path, description = "Article slug"), PageQuery),
    responses(
        (status = 200, description = "Comments", body = CommentListResponse),
        (status = 404, description = "Article not found", body = ErrorBody)
    ),
    tag = "comments"
)]
pub async fn list_comments(
    identity: Identity,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<CommentListResponse>, AppError> {
    let (comments, pagination) =
        comment::list_comments(&*state.repo, &identity, &slug, Page::from(&page)).await?;
    Ok(Json(CommentListResponse {
        comments,
        pagination,
    }))
}

/// add_comment
///
/// [Authenticated Route] Posts a comment on a live article.
#[utoipa::path(
    post,
    path = "/api/articles/{slug}/comments",
    params(("slug" = String, Path, description = "Article slug")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentResponse),
        (status = 404, description = "Article not found", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody)
    ),
    tag = "comments"
)]
pub async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let input = payload.comment.validate()?;
    let comment = comment::add_comment(&*state.repo, &Identity::from(auth), &slug, input).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

/// delete_comment
///
/// [Authenticated Route] Soft-deletes a comment.
///
/// *Authorization*: the comment's author or an admin.
#[utoipa::path(
    delete,
    path = "/api/articles/{slug}/comments/{id}",
    params(
        ("slug" = String, Path, description = "Article slug"),
        ("id" = Uuid, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author or an admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    comment::delete_comment(&*state.repo, &Identity::from(auth), &slug, id)
        .await
        .map_err(|e| match e {
            AppError::NoEffect(_) => AppError::not_found("comment"),
            other => other,
        })?;
    Ok(StatusCode::NO_CONTENT)
}
