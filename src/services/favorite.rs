use uuid::Uuid;

use crate::{
    auth::Identity,
    error::AppError,
    models::ArticleDetail,
    repository::{ArticleStore, FavoriteStore, RepoError},
    services::article::{find_live_article, load_detail},
};

/// Marks the article as a favorite of the viewer. Favoriting twice is `NoEffect`.
pub async fn favorite_article<S>(store: &S, identity: &Identity, slug: &str) -> Result<ArticleDetail, AppError>
where
    S: ArticleStore + FavoriteStore + ?Sized,
{
    let viewer = identity.require()?;
    let article = find_live_article(store, slug).await?;
    if favorited(store, viewer, article.id).await? {
        return Err(AppError::NoEffect("article is already favorited".to_string()));
    }

    store
        .insert_favorite(viewer, article.id)
        .await
        .map_err(|e| match e {
            RepoError::NoEffect => AppError::NoEffect("article is already favorited".to_string()),
            other => AppError::from_repo(other, "favorite article"),
        })?;

    tracing::debug!(slug = %article.slug, user = %viewer, "article favorited");
    load_detail(store, identity, &article.slug).await
}

/// Removes the viewer's favorite. Removing one that does not exist is `NoEffect`.
pub async fn unfavorite_article<S>(store: &S, identity: &Identity, slug: &str) -> Result<ArticleDetail, AppError>
where
    S: ArticleStore + FavoriteStore + ?Sized,
{
    let viewer = identity.require()?;
    let article = find_live_article(store, slug).await?;
    if !favorited(store, viewer, article.id).await? {
        return Err(AppError::NoEffect("article is not favorited".to_string()));
    }

    store
        .delete_favorite(viewer, article.id)
        .await
        .map_err(|e| match e {
            RepoError::NoEffect => AppError::NoEffect("article is not favorited".to_string()),
            other => AppError::from_repo(other, "unfavorite article"),
        })?;

    tracing::debug!(slug = %article.slug, user = %viewer, "article unfavorited");
    load_detail(store, identity, &article.slug).await
}

async fn favorited<S>(store: &S, viewer: Uuid, article_id: Uuid) -> Result<bool, AppError>
where
    S: FavoriteStore + ?Sized,
{
    store
        .exists_favorite(viewer, article_id)
        .await
        .map_err(|e| AppError::from_repo(e, "favorite lookup"))
}
