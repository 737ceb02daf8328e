use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::{
    ArticleStore, CommentStore, FavoriteStore, FollowStore, RepoError, RepoResult, TagStore,
    UserStore,
};
use crate::models::{
    Article, ArticleChanges, ArticleDetail, ArticleFilter, ArticlePreview, Comment, CommentDetail,
    NewArticle, NewComment, NewUser, ProfilePreview, User, UserChanges,
};

const USER_COLUMNS: &str =
    "id, email, username, password, bio, image, role, created_at, updated_at";
const ARTICLE_COLUMNS: &str =
    "id, author_id, slug, title, description, body, created_at, updated_at, deleted_at";
const COMMENT_COLUMNS: &str = "id, article_id, author_id, body, created_at, updated_at, deleted_at";

/// PostgresRepository
///
/// The relational adapter. All queries go through `query_as` / `QueryBuilder`
/// with bound parameters; nothing is interpolated into SQL text.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// --- Row Shapes ---

/// Flat result of the article detail/list select, folded into `ArticleDetail`.
#[derive(FromRow)]
struct ArticleRow {
    slug: String,
    title: String,
    description: String,
    body: String,
    tag_list: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    favorited: bool,
    favorites_count: i64,
    author_username: String,
    author_bio: Option<String>,
    author_image: Option<String>,
    author_following: bool,
    author_followers_count: i64,
}

impl From<ArticleRow> for ArticleDetail {
    fn from(row: ArticleRow) -> Self {
        Self {
            slug: row.slug,
            title: row.title,
            description: row.description,
            body: row.body,
            tag_list: row.tag_list,
            created_at: row.created_at,
            updated_at: row.updated_at,
            favorited: row.favorited,
            favorites_count: row.favorites_count,
            author: ProfilePreview {
                username: row.author_username,
                bio: row.author_bio,
                image: row.author_image,
                following: row.author_following,
                followers_count: row.author_followers_count,
            },
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_username: String,
    author_bio: Option<String>,
    author_image: Option<String>,
    author_following: bool,
    author_followers_count: i64,
}

impl From<CommentRow> for CommentDetail {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
            author: ProfilePreview {
                username: row.author_username,
                bio: row.author_bio,
                image: row.author_image,
                following: row.author_following,
                followers_count: row.author_followers_count,
            },
        }
    }
}

// --- Query Fragments ---

/// Pushes the viewer-relative article select. Expects `a` (articles) and
/// `u` (author) in the FROM clause that follows.
fn push_article_select(builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Uuid>) {
    builder.push(
        r#"
        SELECT
            a.slug, a.title, a.description, a.body, a.created_at, a.updated_at,
            ARRAY(
                SELECT t.name FROM article_tags art
                JOIN tags t ON t.id = art.tag_id
                WHERE art.article_id = a.id
                ORDER BY t.name
            ) AS tag_list,
            EXISTS(SELECT 1 FROM favorites f WHERE f.article_id = a.id AND f.user_id = "#,
    );
    builder.push_bind(viewer);
    builder.push(
        r#") AS favorited,
            (SELECT COUNT(*) FROM favorites f WHERE f.article_id = a.id) AS favorites_count,
            u.username AS author_username, u.bio AS author_bio, u.image AS author_image,
            EXISTS(SELECT 1 FROM follows fo WHERE fo.following_id = u.id AND fo.follower_id = "#,
    );
    builder.push_bind(viewer);
    builder.push(
        r#") AS author_following,
            (SELECT COUNT(*) FROM follows fo WHERE fo.following_id = u.id) AS author_followers_count
        FROM articles a
        JOIN users u ON u.id = a.author_id
        "#,
    );
}

/// Shared WHERE clause for the list and count queries.
fn push_article_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ArticleFilter) {
    builder.push(" WHERE a.deleted_at IS NULL");

    if let Some(follower) = filter.feed_of {
        builder.push(" AND a.author_id IN (SELECT following_id FROM follows WHERE follower_id = ");
        builder.push_bind(follower);
        builder.push(")");
        return;
    }

    if let Some(tag) = &filter.tag {
        builder.push(
            " AND EXISTS (SELECT 1 FROM article_tags art JOIN tags t ON t.id = art.tag_id \
             WHERE art.article_id = a.id AND t.name = ",
        );
        builder.push_bind(tag.clone());
        builder.push(")");
    }
    if let Some(author) = &filter.author {
        builder.push(" AND u.username = ");
        builder.push_bind(author.clone());
    }
    if let Some(username) = &filter.favorited_by {
        builder.push(
            " AND EXISTS (SELECT 1 FROM favorites f JOIN users fu ON fu.id = f.user_id \
             WHERE f.article_id = a.id AND fu.username = ",
        );
        builder.push_bind(username.clone());
        builder.push(")");
    }
}

fn push_comment_select(builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Uuid>) {
    builder.push(
        r#"
        SELECT
            c.id, c.body, c.created_at, c.updated_at,
            u.username AS author_username, u.bio AS author_bio, u.image AS author_image,
            EXISTS(SELECT 1 FROM follows fo WHERE fo.following_id = u.id AND fo.follower_id = "#,
    );
    builder.push_bind(viewer);
    builder.push(
        r#") AS author_following,
            (SELECT COUNT(*) FROM follows fo WHERE fo.following_id = u.id) AS author_followers_count
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.deleted_at IS NULL
        "#,
    );
}

/// Upserts tags by name and returns their ids. The no-op DO UPDATE makes
/// RETURNING yield ids for names that already existed.
async fn upsert_tags_by_name(conn: &mut PgConnection, names: &[String]) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO tags (name)
        SELECT * FROM UNNEST($1::text[])
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(names.to_vec())
    .fetch_all(conn)
    .await?;
    Ok(ids)
}

async fn link_article_tags(conn: &mut PgConnection, article_id: Uuid, tag_ids: &[i64]) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO article_tags (article_id, tag_id)
        SELECT $1, UNNEST($2::bigint[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(article_id)
    .bind(tag_ids.to_vec())
    .execute(conn)
    .await?;
    Ok(())
}

fn expect_one_row(rows_affected: u64) -> RepoResult<()> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(RepoError::NoEffect)
    }
}

#[async_trait]
impl UserStore for PostgresRepository {
    async fn insert_user(&self, new: NewUser) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, username, password, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.email)
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    /// COALESCE keeps every column whose change is `None`.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                username = COALESCE($3, username),
                password = COALESCE($4, password),
                bio = COALESCE($5, bio),
                image = COALESCE($6, image),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.username)
        .bind(changes.password_hash)
        .bind(changes.bio)
        .bind(changes.image)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl ArticleStore for PostgresRepository {
    async fn slug_available(&self, slug: &str, exclude: Option<Uuid>) -> RepoResult<bool> {
        let available = sqlx::query_scalar::<_, bool>(
            "SELECT NOT EXISTS (SELECT 1 FROM articles WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(available)
    }

    /// insert_article
    ///
    /// Article row, tag upsert and tag links share one transaction. Any early
    /// return (or a dropped future) rolls the whole thing back.
    async fn insert_article(&self, new: NewArticle, tags: &[String]) -> RepoResult<Article> {
        let mut tx = self.pool.begin().await?;

        let article = sqlx::query_as::<_, Article>(&format!(
            "INSERT INTO articles (id, author_id, slug, title, description, body) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.author_id)
        .bind(new.slug)
        .bind(new.title)
        .bind(new.description)
        .bind(new.body)
        .fetch_one(&mut *tx)
        .await?;

        if !tags.is_empty() {
            let tag_ids = upsert_tags_by_name(&mut tx, tags).await?;
            link_article_tags(&mut tx, article.id, &tag_ids).await?;
        }

        tx.commit().await?;
        Ok(article)
    }

    async fn get_article_by_slug(&self, slug: &str) -> RepoResult<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE slug = $1 AND deleted_at IS NULL"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn get_article_detail(
        &self,
        viewer: Option<Uuid>,
        slug: &str,
    ) -> RepoResult<Option<ArticleDetail>> {
        let mut builder = QueryBuilder::new("");
        push_article_select(&mut builder, viewer);
        builder.push(" WHERE a.deleted_at IS NULL AND a.slug = ");
        builder.push_bind(slug);

        let row = builder
            .build_query_as::<ArticleRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ArticleDetail::from))
    }

    /// list_articles
    ///
    /// Two queries over the same filter: the page (newest first) and the
    /// unpaged count.
    async fn list_articles(&self, filter: &ArticleFilter) -> RepoResult<(Vec<ArticlePreview>, i64)> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles a JOIN users u ON u.id = a.author_id");
        push_article_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::new("");
        push_article_select(&mut builder, filter.viewer);
        push_article_filters(&mut builder, filter);
        builder.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ");
        builder.push_bind(filter.limit);
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset);

        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(&self.pool)
            .await?;
        let previews = rows
            .into_iter()
            .map(|row| ArticlePreview::from(ArticleDetail::from(row)))
            .collect();
        Ok((previews, total))
    }

    async fn update_article(&self, id: Uuid, changes: ArticleChanges) -> RepoResult<Article> {
        sqlx::query_as::<_, Article>(&format!(
            r#"
            UPDATE articles SET
                slug = $2, title = $3, description = $4, body = $5, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.slug)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.body)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)
    }

    async fn soft_delete_article(&self, id: Uuid) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE articles SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        expect_one_row(result.rows_affected())
    }
}

#[async_trait]
impl CommentStore for PostgresRepository {
    async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (id, article_id, author_id, body) \
             VALUES ($1, $2, $3, $4) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.article_id)
        .bind(new.author_id)
        .bind(new.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn get_comment(&self, article_id: Uuid, comment_id: Uuid) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE id = $1 AND article_id = $2 AND deleted_at IS NULL"
        ))
        .bind(comment_id)
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn get_comment_detail(
        &self,
        viewer: Option<Uuid>,
        comment_id: Uuid,
    ) -> RepoResult<Option<CommentDetail>> {
        let mut builder = QueryBuilder::new("");
        push_comment_select(&mut builder, viewer);
        builder.push(" AND c.id = ");
        builder.push_bind(comment_id);

        let row = builder
            .build_query_as::<CommentRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CommentDetail::from))
    }

    async fn list_comments(
        &self,
        viewer: Option<Uuid>,
        article_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepoResult<(Vec<CommentDetail>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE article_id = $1 AND deleted_at IS NULL",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;

        let mut builder = QueryBuilder::new("");
        push_comment_select(&mut builder, viewer);
        builder.push(" AND c.article_id = ");
        builder.push_bind(article_id);
        builder.push(" ORDER BY c.created_at ASC, c.id ASC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<CommentRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok((rows.into_iter().map(CommentDetail::from).collect(), total))
    }

    async fn soft_delete_comment(&self, comment_id: Uuid) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE comments SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(comment_id)
        .execute(&self.pool)
        .await?;
        expect_one_row(result.rows_affected())
    }
}

#[async_trait]
impl FavoriteStore for PostgresRepository {
    async fn exists_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND article_id = $2)",
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<()> {
        let result = sqlx::query(
            "INSERT INTO favorites (user_id, article_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        expect_one_row(result.rows_affected())
    }

    async fn delete_favorite(&self, user_id: Uuid, article_id: Uuid) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        expect_one_row(result.rows_affected())
    }
}

#[async_trait]
impl FollowStore for PostgresRepository {
    async fn exists_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<()> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, following_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&self.pool)
        .await?;
        expect_one_row(result.rows_affected())
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;
        expect_one_row(result.rows_affected())
    }

    async fn get_profile(
        &self,
        viewer: Option<Uuid>,
        username: &str,
    ) -> RepoResult<Option<ProfilePreview>> {
        let profile = sqlx::query_as::<_, ProfilePreview>(
            r#"
            SELECT
                u.username, u.bio, u.image,
                EXISTS(SELECT 1 FROM follows f WHERE f.following_id = u.id AND f.follower_id = $1) AS following,
                (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id) AS followers_count
            FROM users u
            WHERE u.username = $2
            "#,
        )
        .bind(viewer)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }
}

#[async_trait]
impl TagStore for PostgresRepository {
    async fn list_tags(&self, limit: i64, offset: i64) -> RepoResult<(Vec<String>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags")
            .fetch_one(&self.pool)
            .await?;
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM tags ORDER BY name LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((names, total))
    }
}
