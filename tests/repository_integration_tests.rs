//! Postgres adapter tests. They need a reachable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use realworld_api::{
    auth::Role,
    models::{ArticleChanges, ArticleFilter, NewArticle, NewComment, NewUser, User, UserChanges},
    repository::{
        ArticleStore, CommentStore, FavoriteStore, FollowStore, PostgresRepository, RepoError,
        TagStore, UserStore,
    },
};
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// A simple structure to hold the database pool for testing
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Every run uses fresh names so tests can share one database.
fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..12])
}

async fn create_test_user(repo: &PostgresRepository) -> User {
    let username = unique("user");
    repo.insert_user(NewUser {
        email: format!("{username}@test.com"),
        username,
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        role: Role::User,
    })
    .await
    .expect("Failed to create test user")
}

async fn create_test_article(repo: &PostgresRepository, author: &User, tags: &[String]) -> String {
    let slug = unique("article").replace('_', "-");
    repo.insert_article(
        NewArticle {
            author_id: author.id,
            slug: slug.clone(),
            title: "Integration".to_string(),
            description: "desc".to_string(),
            body: "body".to_string(),
        },
        tags,
    )
    .await
    .expect("Failed to create test article");
    slug
}

// --- Tests ---

#[test]
#[ignore]
async fn test_user_round_trip_and_conflicts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo).await;

    let by_email = repo.get_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.role(), Role::User);

    let duplicate = repo
        .insert_user(NewUser {
            email: user.email.clone(),
            username: unique("other"),
            password_hash: "x".to_string(),
            role: Role::User,
        })
        .await;
    assert!(matches!(duplicate, Err(RepoError::Conflict)));

    let updated = repo
        .update_user(
            user.id,
            UserChanges {
                bio: Some("hello".to_string()),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.bio.as_deref(), Some("hello"));
    assert_eq!(updated.email, user.email);
}

#[test]
#[ignore]
async fn test_article_insert_tags_and_slug_conflict() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let tag_a = unique("tag");
    let tag_b = unique("tag");
    let slug = create_test_article(&repo, &author, &[tag_b.clone(), tag_a.clone()]).await;

    let detail = repo.get_article_detail(None, &slug).await.unwrap().unwrap();
    let mut expected = vec![tag_a.clone(), tag_b.clone()];
    expected.sort();
    assert_eq!(detail.tag_list, expected);
    assert_eq!(detail.author.username, author.username);
    assert!(!detail.favorited);

    assert!(!repo.slug_available(&slug, None).await.unwrap());
    let row = repo.get_article_by_slug(&slug).await.unwrap().unwrap();
    assert!(repo.slug_available(&slug, Some(row.id)).await.unwrap());

    let clash = repo
        .insert_article(
            NewArticle {
                author_id: author.id,
                slug: slug.clone(),
                title: "t".to_string(),
                description: "d".to_string(),
                body: "b".to_string(),
            },
            &[tag_a],
        )
        .await;
    assert!(matches!(clash, Err(RepoError::Conflict)));

    let (tags, total) = repo.list_tags(200, 0).await.unwrap();
    assert!(total >= 2);
    assert!(tags.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
#[ignore]
async fn test_article_insert_rolls_back_when_tags_fail() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let slug = unique("atomic").replace('_', "-");

    // Postgres refuses NUL bytes in text, so the tag upsert fails after the article row.
    let result = repo
        .insert_article(
            NewArticle {
                author_id: author.id,
                slug: slug.clone(),
                title: "Atomic".to_string(),
                description: "d".to_string(),
                body: "b".to_string(),
            },
            &["bad\0tag".to_string()],
        )
        .await;

    assert!(result.is_err());
    assert!(repo.slug_available(&slug, None).await.unwrap());
    assert!(repo.get_article_by_slug(&slug).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_article_update_and_soft_delete() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let slug = create_test_article(&repo, &author, &[]).await;
    let row = repo.get_article_by_slug(&slug).await.unwrap().unwrap();

    let new_slug = format!("{slug}-renamed");
    let updated = repo
        .update_article(
            row.id,
            ArticleChanges {
                slug: new_slug.clone(),
                title: "Renamed".to_string(),
                description: row.description.clone(),
                body: row.body.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.slug, new_slug);

    repo.soft_delete_article(row.id).await.unwrap();
    assert!(repo.get_article_by_slug(&new_slug).await.unwrap().is_none());
    // Deleted slugs stay reserved.
    assert!(!repo.slug_available(&new_slug, None).await.unwrap());
    assert!(matches!(
        repo.soft_delete_article(row.id).await,
        Err(RepoError::NoEffect)
    ));
}

#[test]
#[ignore]
async fn test_favorites_follows_and_feed() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let reader = create_test_user(&repo).await;
    let slug = create_test_article(&repo, &author, &[]).await;
    let article = repo.get_article_by_slug(&slug).await.unwrap().unwrap();

    repo.insert_favorite(reader.id, article.id).await.unwrap();
    assert!(matches!(
        repo.insert_favorite(reader.id, article.id).await,
        Err(RepoError::NoEffect)
    ));
    assert!(repo.exists_favorite(reader.id, article.id).await.unwrap());

    let detail = repo
        .get_article_detail(Some(reader.id), &slug)
        .await
        .unwrap()
        .unwrap();
    assert!(detail.favorited);
    assert_eq!(detail.favorites_count, 1);

    let (favorited, total) = repo
        .list_articles(&ArticleFilter {
            favorited_by: Some(reader.username.clone()),
            limit: 10,
            ..ArticleFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(favorited[0].slug, slug);

    repo.insert_follow(reader.id, author.id).await.unwrap();
    let profile = repo
        .get_profile(Some(reader.id), &author.username)
        .await
        .unwrap()
        .unwrap();
    assert!(profile.following);
    assert_eq!(profile.followers_count, 1);

    let (feed, total) = repo
        .list_articles(&ArticleFilter {
            viewer: Some(reader.id),
            feed_of: Some(reader.id),
            limit: 10,
            ..ArticleFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert!(feed[0].author.following);

    repo.delete_follow(reader.id, author.id).await.unwrap();
    assert!(matches!(
        repo.delete_follow(reader.id, author.id).await,
        Err(RepoError::NoEffect)
    ));
    repo.delete_favorite(reader.id, article.id).await.unwrap();
}

#[test]
#[ignore]
async fn test_comments_order_and_soft_delete() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let slug = create_test_article(&repo, &author, &[]).await;
    let article = repo.get_article_by_slug(&slug).await.unwrap().unwrap();

    let first = repo
        .insert_comment(NewComment {
            article_id: article.id,
            author_id: author.id,
            body: "first".to_string(),
        })
        .await
        .unwrap();
    repo.insert_comment(NewComment {
        article_id: article.id,
        author_id: author.id,
        body: "second".to_string(),
    })
    .await
    .unwrap();

    let (comments, total) = repo.list_comments(None, article.id, 10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(comments[0].body, "first");
    assert_eq!(comments[1].body, "second");

    repo.soft_delete_comment(first.id).await.unwrap();
    assert!(repo.get_comment(article.id, first.id).await.unwrap().is_none());
    let (_, total) = repo.list_comments(None, article.id, 10, 0).await.unwrap();
    assert_eq!(total, 1);
}
