use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{auth::Role, error::AppError};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Account record from the `users` table. The password hash is write-only:
/// it is read for login verification and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    // 'admin' or 'user'. Parsed leniently through `User::role()`.
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse_lenient(Some(&self.role))
    }
}

/// Article
///
/// Raw row from the `articles` table. A set `deleted_at` hides the row from
/// every read while keeping its slug reserved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Article {
    pub id: Uuid,
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Comment
///
/// Raw row from the `comments` table, soft-deleted like articles.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Comment {
    pub id: Uuid,
    pub article_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// --- Presentation Schemas (Viewer-Relative) ---

/// ProfilePreview
///
/// Public view of a user as seen by the current viewer. `following` is always
/// false for anonymous viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfilePreview {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
    #[ts(type = "number")]
    pub followers_count: i64,
}

/// ArticleDetail
///
/// Full article view with aggregated tags, favorite state and author profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticleDetail {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub favorited: bool,
    #[ts(type = "number")]
    pub favorites_count: i64,
    pub author: ProfilePreview,
}

/// ArticlePreview
///
/// List entry: the detail view without `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticlePreview {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub tag_list: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub favorited: bool,
    #[ts(type = "number")]
    pub favorites_count: i64,
    pub author: ProfilePreview,
}

impl From<ArticleDetail> for ArticlePreview {
    fn from(detail: ArticleDetail) -> Self {
        Self {
            slug: detail.slug,
            title: detail.title,
            description: detail.description,
            tag_list: detail.tag_list,
            created_at: detail.created_at,
            updated_at: detail.updated_at,
            favorited: detail.favorited,
            favorites_count: detail.favorites_count,
            author: detail.author,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentDetail {
    pub id: Uuid,
    pub body: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub author: ProfilePreview,
}

/// Pagination
///
/// Attached to every list response. `total` is the number of rows matching
/// the filters, not the size of the returned page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Pagination {
    #[ts(type = "number")]
    pub limit: i64,
    #[ts(type = "number")]
    pub offset: i64,
    #[ts(type = "number")]
    pub total: i64,
}

/// UserAuth
///
/// The signed-in user's own view, including a fresh session token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserAuth {
    pub email: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub token: String,
    pub role: Role,
}

impl UserAuth {
    pub fn new(user: User, token: String) -> Self {
        let role = user.role();
        Self {
            email: user.email,
            username: user.username,
            bio: user.bio,
            image: user.image,
            token,
            role,
        }
    }
}

// --- Response Envelopes ---

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub user: UserAuth,
}

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProfileResponse {
    pub profile: ProfilePreview,
}

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleResponse {
    pub article: ArticleDetail,
}

/// ArticleListResponse
///
/// `articlesCount` mirrors `total` for RealWorld clients; the pagination
/// fields are flattened into the top level.
#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticlePreview>,
    #[ts(type = "number")]
    pub articles_count: i64,
    #[serde(flatten)]
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentResponse {
    pub comment: CommentDetail,
}

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentListResponse {
    pub comments: Vec<CommentDetail>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TagListResponse {
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

// --- Request Payloads (Input Schemas) ---

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_BODY_LEN: usize = 50_000;
pub const MAX_TAG_LEN: usize = 50;
pub const MAX_COMMENT_LEN: usize = 10_000;
pub const MAX_BIO_LEN: usize = 255;
pub const MAX_IMAGE_LEN: usize = 2048;

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub user: RegisterUser,
}

impl RegisterUser {
    /// Trims identifiers (never the password) and checks every field.
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.email = self.email.trim().to_string();
        self.username = self.username.trim().to_string();

        let mut problems = Vec::new();
        check_email(&self.email, &mut problems);
        check_username(&self.username, &mut problems);
        check_password(&self.password, &mut problems);
        finish(self, problems)
    }
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub user: LoginUser,
}

impl LoginUser {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.email = self.email.trim().to_string();

        let mut problems = Vec::new();
        if self.email.is_empty() {
            problems.push("email is required".to_string());
        }
        if self.password.is_empty() {
            problems.push("password is required".to_string());
        }
        finish(self, problems)
    }
}

/// UserPatch
///
/// Partial self-update. Absent or blank identity fields are left unchanged;
/// `bio` and `image` may be cleared by sending an empty string.
#[derive(Debug, Clone, Default, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserPatch {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub user: UserPatch,
}

impl UserPatch {
    pub fn validate(self) -> Result<Self, AppError> {
        let patch = Self {
            email: non_blank(self.email),
            username: non_blank(self.username),
            password: self.password.filter(|p| !p.is_empty()),
            bio: self.bio.map(|b| b.trim().to_string()),
            image: self.image.map(|i| i.trim().to_string()),
        };

        let mut problems = Vec::new();
        if let Some(email) = &patch.email {
            check_email(email, &mut problems);
        }
        if let Some(username) = &patch.username {
            check_username(username, &mut problems);
        }
        if let Some(password) = &patch.password {
            check_password(password, &mut problems);
        }
        if patch.bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_LEN) {
            problems.push(format!("bio must be at most {MAX_BIO_LEN} characters"));
        }
        if patch.image.as_ref().is_some_and(|i| i.chars().count() > MAX_IMAGE_LEN) {
            problems.push(format!("image must be at most {MAX_IMAGE_LEN} characters"));
        }
        finish(patch, problems)
    }
}

/// NewArticleInput
///
/// Body of `POST /api/articles`. Tags are trimmed and de-duplicated; the
/// slug is derived from the title by the server.
#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewArticleInput {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateArticleRequest {
    pub article: NewArticleInput,
}

impl NewArticleInput {
    pub fn validate(self) -> Result<Self, AppError> {
        let mut tag_list: Vec<String> = Vec::new();
        for tag in self.tag_list.iter().map(|t| t.trim()) {
            if !tag_list.iter().any(|seen| seen == tag) {
                tag_list.push(tag.to_string());
            }
        }

        let input = Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            body: self.body.trim().to_string(),
            tag_list,
        };

        let mut problems = Vec::new();
        check_required("title", &input.title, MAX_TITLE_LEN, &mut problems);
        check_required("description", &input.description, MAX_DESCRIPTION_LEN, &mut problems);
        check_required("body", &input.body, MAX_BODY_LEN, &mut problems);
        for tag in &input.tag_list {
            check_tag(tag, &mut problems);
        }
        finish(input, problems)
    }
}

/// ArticlePatch
///
/// Body of `PUT /api/articles/{slug}`. Absent or blank fields are unchanged.
#[derive(Debug, Clone, Default, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateArticleRequest {
    pub article: ArticlePatch,
}

impl ArticlePatch {
    pub fn validate(self) -> Result<Self, AppError> {
        let patch = Self {
            title: non_blank(self.title),
            description: non_blank(self.description),
            body: non_blank(self.body),
        };

        let mut problems = Vec::new();
        if let Some(title) = &patch.title {
            check_required("title", title, MAX_TITLE_LEN, &mut problems);
        }
        if let Some(description) = &patch.description {
            check_required("description", description, MAX_DESCRIPTION_LEN, &mut problems);
        }
        if let Some(body) = &patch.body {
            check_required("body", body, MAX_BODY_LEN, &mut problems);
        }
        finish(patch, problems)
    }
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewCommentInput {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub comment: NewCommentInput,
}

impl NewCommentInput {
    pub fn validate(self) -> Result<Self, AppError> {
        let input = Self {
            body: self.body.trim().to_string(),
        };
        let mut problems = Vec::new();
        check_required("body", &input.body, MAX_COMMENT_LEN, &mut problems);
        finish(input, problems)
    }
}

// --- Query Parameters ---

/// ArticleListQuery
///
/// Discovery filters for `GET /api/articles`. Unset filters pass everything.
/// `limit` and `offset` are taken as raw strings and normalized by `Page`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArticleListQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Page
///
/// Normalized paging window. Missing, unparseable, zero or oversized limits
/// fall back to the default; negative or unparseable offsets become 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Self {
        let limit = limit
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|l| (1..=MAX_PAGE_LIMIT).contains(l))
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        let offset = offset
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|o| *o >= 0)
            .unwrap_or(0);
        Self { limit, offset }
    }

    pub fn with_total(self, total: i64) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
            total,
        }
    }
}

impl From<&PageQuery> for Page {
    fn from(query: &PageQuery) -> Self {
        Page::parse(query.limit.as_deref(), query.offset.as_deref())
    }
}

// --- Store Inputs ---

/// Insert payload for a new account; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Column updates for a user; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
}

/// Full replacement values for an article's mutable columns.
#[derive(Debug, Clone)]
pub struct ArticleChanges {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
}

/// ArticleFilter
///
/// Store-level list query. `feed_of` switches to feed mode, where only
/// authors followed by that user match and the discovery filters are ignored.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub viewer: Option<Uuid>,
    pub feed_of: Option<Uuid>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited_by: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

// --- Validation Helpers ---

fn finish<T>(value: T, problems: Vec<String>) -> Result<T, AppError> {
    if problems.is_empty() {
        Ok(value)
    } else {
        Err(AppError::Validation(problems))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_required(field: &str, value: &str, max: usize, problems: &mut Vec<String>) {
    if value.is_empty() {
        problems.push(format!("{field} is required"));
    } else if value.chars().count() > max {
        problems.push(format!("{field} must be at most {max} characters"));
    }
}

fn check_email(email: &str, problems: &mut Vec<String>) {
    let well_formed = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@')
    });
    if email.is_empty() {
        problems.push("email is required".to_string());
    } else if !well_formed || email.contains(char::is_whitespace) || email.len() > 320 {
        problems.push("email is not a valid address".to_string());
    }
}

fn check_username(username: &str, problems: &mut Vec<String>) {
    let len = username.chars().count();
    if !(2..=50).contains(&len) {
        problems.push("username must be between 2 and 50 characters".to_string());
    } else if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        problems.push("username may only contain letters, digits and underscores".to_string());
    }
}

fn check_password(password: &str, problems: &mut Vec<String>) {
    let len = password.chars().count();
    if !(8..=50).contains(&len) {
        problems.push("password must be between 8 and 50 characters".to_string());
        return;
    }
    let strong = password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_punctuation());
    if !strong {
        problems.push(
            "password needs an uppercase letter, a lowercase letter, a digit and a symbol".to_string(),
        );
    }
}

fn check_tag(tag: &str, problems: &mut Vec<String>) {
    if tag.is_empty() {
        problems.push("tags must not be empty".to_string());
    } else if tag.chars().count() > MAX_TAG_LEN {
        problems.push(format!("tag '{tag}' must be at most {MAX_TAG_LEN} characters"));
    } else if !tag
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '-'))
    {
        problems.push(format!("tag '{tag}' contains unsupported characters"));
    }
}
