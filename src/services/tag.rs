use crate::{
    error::AppError,
    models::{Page, Pagination},
    repository::TagStore,
};

/// Alphabetical tag names with pagination.
pub async fn list_tags<S>(store: &S, page: Page) -> Result<(Vec<String>, Pagination), AppError>
where
    S: TagStore + ?Sized,
{
    let (tags, total) = store
        .list_tags(page.limit, page.offset)
        .await
        .map_err(|e| AppError::from_repo(e, "list tags"))?;
    Ok((tags, page.with_total(total)))
}
