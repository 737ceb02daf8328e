use uuid::Uuid;

use crate::{error::AppError, repository::ArticleStore};

/// Upper bound on candidates probed for one title.
pub const MAX_SLUG_ATTEMPTS: usize = 1000;

const FALLBACK_SLUG: &str = "article";

/// URL-safe base slug for a title. Titles with no usable characters fall
/// back to `article`.
pub fn base_slug(title: &str) -> String {
    let base = ::slug::slugify(title);
    if base.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        base
    }
}

/// SlugAllocator
///
/// Walks the deterministic candidate sequence `base`, `base-0`, `base-1`, ...
/// and returns the first one the store reports as free.
///
/// The allocator keeps its position, so after an insert loses a race on the
/// unique constraint the caller asks again and gets the next suffix instead
/// of the same collision.
#[derive(Debug, Clone)]
pub struct SlugAllocator {
    base: String,
    position: usize,
}

impl SlugAllocator {
    pub fn new(title: &str) -> Self {
        Self {
            base: base_slug(title),
            position: 0,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn candidate(&self, position: usize) -> String {
        match position {
            0 => self.base.clone(),
            n => format!("{}-{}", self.base, n - 1),
        }
    }

    /// next_available
    ///
    /// `exclude` names an article whose own slug does not count as taken.
    /// Fails with `SlugExhausted` once `MAX_SLUG_ATTEMPTS` candidates have
    /// been consumed.
    pub async fn next_available<S>(&mut self, store: &S, exclude: Option<Uuid>) -> Result<String, AppError>
    where
        S: ArticleStore + ?Sized,
    {
        while self.position < MAX_SLUG_ATTEMPTS {
            let candidate = self.candidate(self.position);
            self.position += 1;

            let free = store
                .slug_available(&candidate, exclude)
                .await
                .map_err(|e| AppError::from_repo(e, "slug lookup"))?;
            if free {
                return Ok(candidate);
            }
        }

        tracing::warn!(base = %self.base, "slug candidates exhausted");
        Err(AppError::SlugExhausted)
    }
}

