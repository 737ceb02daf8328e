use crate::{
    auth::Identity,
    error::AppError,
    models::{
        Article, ArticleChanges, ArticleDetail, ArticleFilter, ArticleListQuery, ArticlePatch,
        ArticlePreview, NewArticle, NewArticleInput, Page, Pagination,
    },
    repository::{ArticleStore, RepoError},
    services::slug::SlugAllocator,
};

/// Which article list a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Everything, narrowed by the optional discovery filters.
    Discovery,
    /// Only authors the viewer follows.
    Feed,
}

/// Looks up a live article or fails with `NotFound`.
pub(crate) async fn find_live_article<S>(store: &S, slug: &str) -> Result<Article, AppError>
where
    S: ArticleStore + ?Sized,
{
    store
        .get_article_by_slug(slug)
        .await
        .map_err(|e| AppError::from_repo(e, "article lookup"))?
        .ok_or_else(|| AppError::not_found("article"))
}

/// Viewer-relative detail for a live article.
pub(crate) async fn load_detail<S>(store: &S, identity: &Identity, slug: &str) -> Result<ArticleDetail, AppError>
where
    S: ArticleStore + ?Sized,
{
    store
        .get_article_detail(identity.viewer(), slug)
        .await
        .map_err(|e| AppError::from_repo(e, "article detail"))?
        .ok_or_else(|| AppError::not_found("article"))
}

/// create_article
///
/// Allocates a slug from the title and persists the article with its tags.
/// When the insert loses the slug to a concurrent writer, allocation resumes
/// at the next suffix.
pub async fn create_article<S>(
    store: &S,
    identity: &Identity,
    input: NewArticleInput,
) -> Result<ArticleDetail, AppError>
where
    S: ArticleStore + ?Sized,
{
    let author_id = identity.require()?;
    let mut slugs = SlugAllocator::new(&input.title);

    let article = loop {
        let slug = slugs.next_available(store, None).await?;
        let new = NewArticle {
            author_id,
            slug,
            title: input.title.clone(),
            description: input.description.clone(),
            body: input.body.clone(),
        };

        match store.insert_article(new, &input.tag_list).await {
            Ok(article) => break article,
            Err(RepoError::Conflict) => {
                tracing::debug!(base = slugs.base(), "slug taken during insert, retrying");
            }
            Err(e) => return Err(AppError::from_repo(e, "insert article")),
        }
    };

    tracing::info!(slug = %article.slug, author = %author_id, "article created");
    load_detail(store, identity, &article.slug).await
}

/// list_articles
///
/// Feed mode requires a signed-in viewer and ignores the discovery filters.
/// Returns the page together with the unpaged total.
pub async fn list_articles<S>(
    store: &S,
    identity: &Identity,
    mode: ListMode,
    query: &ArticleListQuery,
) -> Result<(Vec<ArticlePreview>, Pagination), AppError>
where
    S: ArticleStore + ?Sized,
{
    let page = Page::parse(query.limit.as_deref(), query.offset.as_deref());
    let filter = match mode {
        ListMode::Feed => ArticleFilter {
            viewer: identity.viewer(),
            feed_of: Some(identity.require()?),
            limit: page.limit,
            offset: page.offset,
            ..ArticleFilter::default()
        },
        ListMode::Discovery => ArticleFilter {
            viewer: identity.viewer(),
            feed_of: None,
            tag: non_empty(&query.tag),
            author: non_empty(&query.author),
            favorited_by: non_empty(&query.favorited),
            limit: page.limit,
            offset: page.offset,
        },
    };

    let (articles, total) = store
        .list_articles(&filter)
        .await
        .map_err(|e| AppError::from_repo(e, "list articles"))?;
    Ok((articles, page.with_total(total)))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn get_article<S>(store: &S, identity: &Identity, slug: &str) -> Result<ArticleDetail, AppError>
where
    S: ArticleStore + ?Sized,
{
    load_detail(store, identity, slug).await
}

/// update_article
///
/// Author-only; admins are refused too. Absent fields keep their value. A
/// changed title re-runs slug allocation with the article's own row excluded,
/// so a title that maps to the same slug keeps it.
pub async fn update_article<S>(
    store: &S,
    identity: &Identity,
    slug: &str,
    patch: ArticlePatch,
) -> Result<ArticleDetail, AppError>
where
    S: ArticleStore + ?Sized,
{
    let viewer = identity.require()?;
    let article = find_live_article(store, slug).await?;
    if article.author_id != viewer {
        return Err(AppError::Forbidden(
            "only the author may edit this article".to_string(),
        ));
    }

    let title = patch.title.unwrap_or_else(|| article.title.clone());
    let description = patch.description.unwrap_or_else(|| article.description.clone());
    let body = patch.body.unwrap_or_else(|| article.body.clone());
    let title_changed = title != article.title;
    let mut slugs = SlugAllocator::new(&title);

    loop {
        let next_slug = if title_changed {
            slugs.next_available(store, Some(article.id)).await?
        } else {
            article.slug.clone()
        };
        let changes = ArticleChanges {
            slug: next_slug,
            title: title.clone(),
            description: description.clone(),
            body: body.clone(),
        };

        match store.update_article(article.id, changes).await {
            Ok(updated) => {
                tracing::info!(old_slug = %article.slug, slug = %updated.slug, "article updated");
                return load_detail(store, identity, &updated.slug).await;
            }
            Err(RepoError::Conflict) if title_changed => {
                tracing::debug!(base = slugs.base(), "slug taken during update, retrying");
            }
            Err(e) => return Err(AppError::from_repo(e, "update article")),
        }
    }
}

/// delete_article
///
/// Admins or the author may delete. A slug that resolves to no live article
/// reports `NoEffect`, as does a soft delete that matched no row.
pub async fn delete_article<S>(store: &S, identity: &Identity, slug: &str) -> Result<(), AppError>
where
    S: ArticleStore + ?Sized,
{
    let viewer = identity.require()?;
    let article = store
        .get_article_by_slug(slug)
        .await
        .map_err(|e| AppError::from_repo(e, "article lookup"))?
        .ok_or_else(|| AppError::NoEffect("article not found".to_string()))?;

    if !identity.is_admin() && article.author_id != viewer {
        return Err(AppError::Forbidden(
            "only the author or an admin may delete this article".to_string(),
        ));
    }

    store
        .soft_delete_article(article.id)
        .await
        .map_err(|e| AppError::from_repo(e, "delete article"))?;

    tracing::info!(slug = %article.slug, by = %viewer, admin = identity.is_admin(), "article deleted");
    Ok(())
}
