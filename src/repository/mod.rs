use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Article, ArticleChanges, ArticleDetail, ArticleFilter, ArticlePreview, Comment, CommentDetail,
    NewArticle, NewComment, NewUser, ProfilePreview, User, UserChanges,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Outcomes a store can report. `Conflict` is a unique-constraint hit,
/// `NoEffect` a mutation that matched zero rows.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated")]
    Conflict,
    #[error("no rows affected")]
    NoEffect,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            _ => RepoError::Database(err),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

// --- Per-Entity Contracts ---
//
// Reads exclude soft-deleted rows unless a method says otherwise. `viewer`
// arguments only shape the `favorited` / `following` flags.

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Conflict` when the email or username is taken.
    async fn insert_user(&self, new: NewUser) -> RepoResult<User>;
    async fn get_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<User>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// True when no article, deleted ones included, holds `slug`. `exclude`
    /// lets an article keep its own slug during an update.
    async fn slug_available(&self, slug: &str, exclude: Option<Uuid>) -> RepoResult<bool>;
    /// Inserts the article, upserts its tags by name and links them, all in
    /// one transaction. `Conflict` when the slug was taken meanwhile.
    async fn insert_article(&self, new: NewArticle, tags: &[String]) -> RepoResult<Article>;
    async fn get_article_by_slug(&self, slug: &str) -> RepoResult<Option<Article>>;
    async fn get_article_detail(
        &self,
        viewer: Option<Uuid>,
        slug: &str,
    ) -> RepoResult<Option<ArticleDetail>>;
    /// Returns one page plus the total number of matching rows.
    async fn list_articles(&self, filter: &ArticleFilter) -> RepoResult<(Vec<ArticlePreview>, i64)>;
    async fn update_article(&self, id: Uuid, changes: ArticleChanges) -> RepoResult<Article>;
    /// `NoEffect` unless exactly one live row was marked deleted.
    async fn soft_delete_article(&self, id: Uuid) -> RepoResult<()>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment>;
    /// A live comment belonging to `article_id`.
    async fn get_comment(&self, article_id: Uuid, comment_id: Uuid) -> RepoResult<Option<Comment>>;
    async fn get_comment_detail(
        &self,
        viewer: Option<Uuid>,
        comment_id: Uuid,
    ) -> RepoResult<Option<CommentDetail>>;
    /// Oldest first.
    async fn list_comments(
        &self,
        viewer: Option<Uuid>,
        article_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepoResult<(Vec<CommentDetail>, i64)>;
    async fn soft_delete_comment(&self, comment_id: Uuid) -> RepoResult<()>;
}

#[async_trait]
pub trait FavoriteStore: Send + Sync {
    async fn exists_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<bool>;
    /// `NoEffect` when already favorited.
    async fn insert_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<()>;
    /// `NoEffect` when there was nothing to remove.
    async fn delete_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<()>;
}

#[async_trait]
pub trait FollowStore: Send + Sync {
    async fn exists_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<bool>;
    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<()>;
    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<()>;
    async fn get_profile(
        &self,
        viewer: Option<Uuid>,
        username: &str,
    ) -> RepoResult<Option<ProfilePreview>>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Alphabetical page of tag names plus the total count.
    async fn list_tags(&self, limit: i64, offset: i64) -> RepoResult<(Vec<String>, i64)>;
}

/// Repository
///
/// Everything the HTTP layer needs, as one trait object. Services stay
/// generic over the narrower per-entity traits.
pub trait Repository:
    UserStore + ArticleStore + CommentStore + FavoriteStore + FollowStore + TagStore
{
}

impl<T> Repository for T where
    T: UserStore + ArticleStore + CommentStore + FavoriteStore + FollowStore + TagStore
{
}

/// RepositoryState
///
/// The shared persistence handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
