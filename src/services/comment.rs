use uuid::Uuid;

use crate::{
    auth::Identity,
    error::AppError,
    models::{CommentDetail, NewComment, NewCommentInput, Page, Pagination},
    repository::{ArticleStore, CommentStore},
    services::article::find_live_article,
};

/// add_comment
///
/// Any signed-in user may comment on a live article.
pub async fn add_comment<S>(
    store: &S,
    identity: &Identity,
    slug: &str,
    input: NewCommentInput,
) -> Result<CommentDetail, AppError>
where
    S: ArticleStore + CommentStore + ?Sized,
{
    let author_id = identity.require()?;
    let article = find_live_article(store, slug).await?;

    let comment = store
        .insert_comment(NewComment {
            article_id: article.id,
            author_id,
            body: input.body,
        })
        .await
        .map_err(|e| AppError::from_repo(e, "insert comment"))?;

    tracing::info!(comment = %comment.id, slug = %article.slug, "comment added");
    store
        .get_comment_detail(identity.viewer(), comment.id)
        .await
        .map_err(|e| AppError::from_repo(e, "comment detail"))?
        .ok_or_else(|| AppError::not_found("comment"))
}

pub async fn list_comments<S>(
    store: &S,
    identity: &Identity,
    slug: &str,
    page: Page,
) -> Result<(Vec<CommentDetail>, Pagination), AppError>
where
    S: ArticleStore + CommentStore + ?Sized,
{
    let article = find_live_article(store, slug).await?;
    let (comments, total) = store
        .list_comments(identity.viewer(), article.id, page.limit, page.offset)
        .await
        .map_err(|e| AppError::from_repo(e, "list comments"))?;
    Ok((comments, page.with_total(total)))
}

/// delete_comment
///
/// Ownership is checked against the comment's author, not the article's.
/// Admins may delete any comment.
pub async fn delete_comment<S>(
    store: &S,
    identity: &Identity,
    slug: &str,
    comment_id: Uuid,
) -> Result<(), AppError>
where
    S: ArticleStore + CommentStore + ?Sized,
{
    let viewer = identity.require()?;
    let article = find_live_article(store, slug).await?;
    let comment = store
        .get_comment(article.id, comment_id)
        .await
        .map_err(|e| AppError::from_repo(e, "comment lookup"))?
        .ok_or_else(|| AppError::not_found("comment"))?;

    if !identity.is_admin() && comment.author_id != viewer {
        return Err(AppError::Forbidden(
            "only the author or an admin may delete this comment".to_string(),
        ));
    }

    store
        .soft_delete_comment(comment.id)
        .await
        .map_err(|e| AppError::from_repo(e, "delete comment"))?;

    tracing::info!(comment = %comment.id, by = %viewer, "comment deleted");
    Ok(())
}
