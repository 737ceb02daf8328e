use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ArticleStore, CommentStore, FavoriteStore, FollowStore, RepoError, RepoResult, TagStore,
    UserStore,
};
use crate::{
    auth::Role,
    models::{
        Article, ArticleChanges, ArticleDetail, ArticleFilter, ArticlePreview, Comment,
        CommentDetail, NewArticle, NewComment, NewUser, ProfilePreview, User, UserChanges,
    },
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    // Insertion order doubles as the newest-first tiebreak for equal timestamps.
    articles: Vec<StoredArticle>,
    comments: Vec<Comment>,
    tags: BTreeSet<String>,
    favorites: HashSet<(Uuid, Uuid)>,
    follows: HashSet<(Uuid, Uuid)>,
}

struct StoredArticle {
    row: Article,
    tags: BTreeSet<String>,
}

/// InMemoryRepository
///
/// Process-local store with the same observable behavior as the Postgres
/// adapter. Backs the test suite and local runs without `DATABASE_URL`.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw article row by slug, soft-deleted rows included.
    pub async fn find_article_row(&self, slug: &str) -> Option<Article> {
        let s = self.state.read().await;
        s.articles
            .iter()
            .find(|a| a.row.slug == slug)
            .map(|a| a.row.clone())
    }

    /// Raw comment row by id, soft-deleted rows included.
    pub async fn find_comment_row(&self, id: Uuid) -> Option<Comment> {
        let s = self.state.read().await;
        s.comments.iter().find(|c| c.id == id).cloned()
    }

    /// Overrides a user's stored role.
    pub async fn set_role(&self, user_id: Uuid, role: Role) -> RepoResult<()> {
        let mut s = self.state.write().await;
        let user = s
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(RepoError::NotFound)?;
        user.role = role.as_str().to_string();
        Ok(())
    }
}

impl State {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    fn live_article(&self, slug: &str) -> Option<&StoredArticle> {
        self.articles
            .iter()
            .find(|a| a.row.slug == slug && a.row.deleted_at.is_none())
    }

    fn profile(&self, viewer: Option<Uuid>, user: &User) -> ProfilePreview {
        ProfilePreview {
            username: user.username.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
            following: viewer.is_some_and(|v| self.follows.contains(&(v, user.id))),
            followers_count: self.follows.iter().filter(|(_, f)| *f == user.id).count() as i64,
        }
    }

    fn detail(&self, viewer: Option<Uuid>, article: &StoredArticle) -> ArticleDetail {
        let row = &article.row;
        let author = self
            .user(row.author_id)
            .map(|u| self.profile(viewer, u))
            .unwrap_or_default();

        ArticleDetail {
            slug: row.slug.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            body: row.body.clone(),
            tag_list: article.tags.iter().cloned().collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            favorited: viewer.is_some_and(|v| self.favorites.contains(&(v, row.id))),
            favorites_count: self.favorites.iter().filter(|(_, a)| *a == row.id).count() as i64,
            author,
        }
    }

    fn comment_detail(&self, viewer: Option<Uuid>, comment: &Comment) -> CommentDetail {
        CommentDetail {
            id: comment.id,
            body: comment.body.clone(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            author: self
                .user(comment.author_id)
                .map(|u| self.profile(viewer, u))
                .unwrap_or_default(),
        }
    }

    fn matches(&self, article: &StoredArticle, filter: &ArticleFilter) -> bool {
        let row = &article.row;
        if row.deleted_at.is_some() {
            return false;
        }
        if let Some(follower) = filter.feed_of {
            return self.follows.contains(&(follower, row.author_id));
        }
        if let Some(tag) = &filter.tag {
            if !article.tags.contains(tag) {
                return false;
            }
        }
        if let Some(author) = &filter.author {
            if self.user(row.author_id).is_none_or(|u| &u.username != author) {
                return false;
            }
        }
        if let Some(username) = &filter.favorited_by {
            let favorited = self
                .user_by_username(username)
                .is_some_and(|u| self.favorites.contains(&(u.id, row.id)));
            if !favorited {
                return false;
            }
        }
        true
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserStore for InMemoryRepository {
    async fn insert_user(&self, new: NewUser) -> RepoResult<User> {
        let mut s = self.state.write().await;
        if s
            .users
            .iter()
            .any(|u| u.email == new.email || u.username == new.username)
        {
            return Err(RepoError::Conflict);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password: new.password_hash,
            bio: None,
            image: None,
            role: new.role.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        s.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.state.read().await.user(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let s = self.state.read().await;
        Ok(s.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self.state.read().await.user_by_username(username).cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<User> {
        let mut s = self.state.write().await;

        let taken = s.users.iter().any(|u| {
            u.id != id
                && (changes.email.as_ref() == Some(&u.email)
                    || changes.username.as_ref() == Some(&u.username))
        });
        if taken {
            return Err(RepoError::Conflict);
        }

        let user = s
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(hash) = changes.password_hash {
            user.password = hash;
        }
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        if let Some(image) = changes.image {
            user.image = Some(image);
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl ArticleStore for InMemoryRepository {
    async fn slug_available(&self, slug: &str, exclude: Option<Uuid>) -> RepoResult<bool> {
        let s = self.state.read().await;
        Ok(!s
            .articles
            .iter()
            .any(|a| a.row.slug == slug && Some(a.row.id) != exclude))
    }

    async fn insert_article(&self, new: NewArticle, tags: &[String]) -> RepoResult<Article> {
        let mut s = self.state.write().await;
        if s.articles.iter().any(|a| a.row.slug == new.slug) {
            return Err(RepoError::Conflict);
        }

        let now = Utc::now();
        let row = Article {
            id: Uuid::new_v4(),
            author_id: new.author_id,
            slug: new.slug,
            title: new.title,
            description: new.description,
            body: new.body,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let tags: BTreeSet<String> = tags.iter().cloned().collect();
        s.tags.extend(tags.iter().cloned());
        s.articles.push(StoredArticle {
            row: row.clone(),
            tags,
        });
        Ok(row)
    }

    async fn get_article_by_slug(&self, slug: &str) -> RepoResult<Option<Article>> {
        let s = self.state.read().await;
        Ok(s.live_article(slug).map(|a| a.row.clone()))
    }

    async fn get_article_detail(
        &self,
        viewer: Option<Uuid>,
        slug: &str,
    ) -> RepoResult<Option<ArticleDetail>> {
        let s = self.state.read().await;
        Ok(s.live_article(slug).map(|a| s.detail(viewer, a)))
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> RepoResult<(Vec<ArticlePreview>, i64)> {
        let s = self.state.read().await;
        let mut matching: Vec<&StoredArticle> =
            s.articles.iter().rev().filter(|a| s.matches(a, filter)).collect();
        // Stable sort keeps the reversed insertion order for equal timestamps.
        matching.sort_by(|a, b| b.row.created_at.cmp(&a.row.created_at));

        let total = matching.len() as i64;
        let previews = page(matching, filter.limit, filter.offset)
            .into_iter()
            .map(|a| ArticlePreview::from(s.detail(filter.viewer, a)))
            .collect();
        Ok((previews, total))
    }

    async fn update_article(&self, id: Uuid, changes: ArticleChanges) -> RepoResult<Article> {
        let mut s = self.state.write().await;
        if s
            .articles
            .iter()
            .any(|a| a.row.slug == changes.slug && a.row.id != id)
        {
            return Err(RepoError::Conflict);
        }

        let article = s
            .articles
            .iter_mut()
            .find(|a| a.row.id == id && a.row.deleted_at.is_none())
            .ok_or(RepoError::NotFound)?;
        article.row.slug = changes.slug;
        article.row.title = changes.title;
        article.row.description = changes.description;
        article.row.body = changes.body;
        article.row.updated_at = Utc::now();
        Ok(article.row.clone())
    }

    async fn soft_delete_article(&self, id: Uuid) -> RepoResult<()> {
        let mut s = self.state.write().await;
        let article = s
            .articles
            .iter_mut()
            .find(|a| a.row.id == id && a.row.deleted_at.is_none())
            .ok_or(RepoError::NoEffect)?;
        article.row.deleted_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl CommentStore for InMemoryRepository {
    async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment> {
        let mut s = self.state.write().await;
        if !s
            .articles
            .iter()
            .any(|a| a.row.id == new.article_id && a.row.deleted_at.is_none())
        {
            return Err(RepoError::NotFound);
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            article_id: new.article_id,
            author_id: new.author_id,
            body: new.body,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        s.comments.push(comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, article_id: Uuid, comment_id: Uuid) -> RepoResult<Option<Comment>> {
        let s = self.state.read().await;
        Ok(s.comments
            .iter()
            .find(|c| c.id == comment_id && c.article_id == article_id && c.deleted_at.is_none())
            .cloned())
    }

    async fn get_comment_detail(
        &self,
        viewer: Option<Uuid>,
        comment_id: Uuid,
    ) -> RepoResult<Option<CommentDetail>> {
        let s = self.state.read().await;
        Ok(s.comments
            .iter()
            .find(|c| c.id == comment_id && c.deleted_at.is_none())
            .map(|c| s.comment_detail(viewer, c)))
    }

    async fn list_comments(
        &self,
        viewer: Option<Uuid>,
        article_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepoResult<(Vec<CommentDetail>, i64)> {
        let s = self.state.read().await;
        let live: Vec<&Comment> = s
            .comments
            .iter()
            .filter(|c| c.article_id == article_id && c.deleted_at.is_none())
            .collect();

        let total = live.len() as i64;
        let details = page(live, limit, offset)
            .into_iter()
            .map(|c| s.comment_detail(viewer, c))
            .collect();
        Ok((details, total))
    }

    async fn soft_delete_comment(&self, comment_id: Uuid) -> RepoResult<()> {
        let mut s = self.state.write().await;
        let comment = s
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id && c.deleted_at.is_none())
            .ok_or(RepoError::NoEffect)?;
        comment.deleted_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl FavoriteStore for InMemoryRepository {
    async fn exists_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<bool> {
        Ok(self.state.read().await.favorites.contains(&(user_id, article_id)))
    }

    async fn insert_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<()> {
        if self.state.write().await.favorites.insert((user_id, article_id)) {
            Ok(())
        } else {
            Err(RepoError::NoEffect)
        }
    }

    async fn delete_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<()> {
        if self.state.write().await.favorites.remove(&(user_id, article_id)) {
            Ok(())
        } else {
            Err(RepoError::NoEffect)
        }
    }
}

#[async_trait]
impl FollowStore for InMemoryRepository {
    async fn exists_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<bool> {
        Ok(self.state.read().await.follows.contains(&(follower_id, following_id)))
    }

    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<()> {
        if self.state.write().await.follows.insert((follower_id, following_id)) {
            Ok(())
        } else {
            Err(RepoError::NoEffect)
        }
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<()> {
        if self.state.write().await.follows.remove(&(follower_id, following_id)) {
            Ok(())
        } else {
            Err(RepoError::NoEffect)
        }
    }

    async fn get_profile(
        &self,
        viewer: Option<Uuid>,
        username: &str,
    ) -> RepoResult<Option<ProfilePreview>> {
        let s = self.state.read().await;
        Ok(s.user_by_username(username).map(|u| s.profile(viewer, u)))
    }
}

#[async_trait]
impl TagStore for InMemoryRepository {
    async fn list_tags(&self, limit: i64, offset: i64) -> RepoResult<(Vec<String>, i64)> {
        let s = self.state.read().await;
        let total = s.tags.len() as i64;
        let names = page(s.tags.iter().cloned().collect(), limit, offset);
        Ok((names, total))
    }
}
