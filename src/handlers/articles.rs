use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AuthUser, Identity},
    error::{AppError, ErrorBody},
    models::{
        ArticleListQuery, ArticleListResponse, ArticlePreview, ArticleResponse,
        CreateArticleRequest, PageQuery, Pagination, UpdateArticleRequest,
    },
    services::{
        article::{self, ListMode},
        favorite,
    },
};

fn list_response(articles: Vec<ArticlePreview>, pagination: Pagination) -> Json<ArticleListResponse> {
    Json(ArticleListResponse {
        articles,
        articles_count: pagination.total,
        pagination,
    })
}

/// list_articles
///
/// [Public Route] Newest-first article list with optional `tag`, `author`
/// and `favorited` filters. Signed-in callers see their own favorite and
/// follow flags.
#[utoipa::path(
    get,
    path = "/api/articles",
    params(ArticleListQuery),
    responses((status = 200, description = "Articles", body = ArticleListResponse)),
    tag = "articles"
)]
pub async fn list_articles(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<ArticleListQuery>,
) -> Result<Json<ArticleListResponse>, AppError> {
    let (articles, pagination) =
        article::list_articles(&*state.repo, &identity, ListMode::Discovery, &query).await?;
    Ok(list_response(articles, pagination))
}

/// feed_articles
///
/// [Authenticated Route] Articles by authors the caller follows.
#[utoipa::path(
    get,
    path = "/api/articles/feed",
    params(PageQuery),
    responses(
        (status = 200, description = "Feed", body = ArticleListResponse),
        (status = 401, description = "Not signed in", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn feed_articles(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ArticleListResponse>, AppError> {
    let query = ArticleListQuery {
        limit: page.limit,
        offset: page.offset,
        ..ArticleListQuery::default()
    };
    let (articles, pagination) =
        article::list_articles(&*state.repo, &Identity::from(auth), ListMode::Feed, &query).await?;
    Ok(list_response(articles, pagination))
}

/// get_article
///
/// [Public Route] A single live article by slug.
#[utoipa::path(
    get,
    path = "/api/articles/{slug}",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Article", body = ArticleResponse),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn get_article(
    identity: Identity,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, AppError> {
    let article = article::get_article(&*state.repo, &identity, &slug).await?;
    Ok(Json(ArticleResponse { article }))
}

/// create_article
///
/// [Authenticated Route] Publishes an article. The slug is derived from the
/// title and made unique by suffixing.
#[utoipa::path(
    post,
    path = "/api/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Created", body = ArticleResponse),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn create_article(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ArticleResponse>), AppError> {
    let input = payload.article.validate()?;
    let article = article::create_article(&*state.repo, &Identity::from(auth), input).await?;
    Ok((StatusCode::CREATED, Json(ArticleResponse { article })))
}

/// update_article
///
/// [Authenticated Route] Edits an article.
///
/// *Authorization*: author only. Admins get 403 like everyone else.
#[utoipa::path(
    put,
    path = "/api/articles/{slug}",
    params(("slug" = String, Path, description = "Article slug")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = ArticleResponse),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn update_article(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateArticleRequest>,
) -> Result<Json<ArticleResponse>, AppError> {
    let patch = payload.article.validate()?;
    let article = article::update_article(&*state.repo, &Identity::from(auth), &slug, patch).await?;
    Ok(Json(ArticleResponse { article }))
}

/// delete_article
///
/// [Authenticated Route] Soft-deletes an article.
///
/// *Authorization*: the author or an admin. A slug that matched nothing is
/// reported as 404.
#[utoipa::path(
    delete,
    path = "/api/articles/{slug}",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author or an admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn delete_article(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    article::delete_article(&*state.repo, &Identity::from(auth), &slug)
        .await
        .map_err(|e| match e {
            AppError::NoEffect(_) => AppError::not_found("article"),
            other => other,
        })?;
    Ok(StatusCode::NO_CONTENT)
}

/// favorite_article
///
/// [Authenticated Route] Favorites an article. A repeat is a 400.
#[utoipa::path(
    post,
    path = "/api/articles/{slug}/favorite",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Favorited", body = ArticleResponse),
        (status = 400, description = "Already favorited", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn favorite_article(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, AppError> {
    let article = favorite::favorite_article(&*state.repo, &Identity::from(auth), &slug).await?;
    Ok(Json(ArticleResponse { article }))
}

/// unfavorite_article
///
/// [Authenticated Route] Removes a favorite. Removing one that is not there is a 400.
#[utoipa::path(
    delete,
    path = "/api/articles/{slug}/favorite",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Unfavorited", body = ArticleResponse),
        (status = 400, description = "Not favorited", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn unfavorite_article(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, AppError> {
    let article = favorite::unfavorite_article(&*state.repo, &Identity::from(auth), &slug).await?;
    Ok(Json(ArticleResponse { article }))
}
