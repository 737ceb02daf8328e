use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use realworld_api::{
    AppConfig, AppError, InMemoryRepository,
    auth::{Identity, Role, validate_token},
    models::{
        Article, ArticleChanges, ArticleDetail, ArticleFilter, ArticleListQuery, ArticlePatch,
        ArticlePreview, LoginUser, NewArticle, NewArticleInput, NewCommentInput, Page,
        RegisterUser, UserPatch,
    },
    repository::{ArticleStore, FavoriteStore, FollowStore, RepoError, RepoResult},
    services::{
        article::{self, ListMode},
        comment, favorite, profile,
        slug::{MAX_SLUG_ATTEMPTS, SlugAllocator, base_slug},
        tag, user,
    },
};
use uuid::Uuid;

// --- Helper Functions ---

const PASSWORD: &str = "P@ssw0rd1";

async fn sign_up(repo: &InMemoryRepository, username: &str) -> Identity {
    let session = user::register(
        repo,
        &AppConfig::default(),
        RegisterUser {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .await
    .unwrap();
    Identity::authenticated(session.user.id, Role::User)
}

fn as_admin(identity: &Identity) -> Identity {
    Identity::authenticated(identity.viewer().unwrap(), Role::Admin)
}

fn article_input(title: &str, tags: &[&str]) -> NewArticleInput {
    NewArticleInput {
        title: title.to_string(),
        description: format!("about {title}"),
        body: format!("body of {title}"),
        tag_list: tags.iter().map(|t| t.to_string()).collect(),
    }
}

async fn publish(repo: &InMemoryRepository, author: &Identity, title: &str, tags: &[&str]) -> ArticleDetail {
    article::create_article(repo, author, article_input(title, tags))
        .await
        .unwrap()
}

fn slugs(previews: &[ArticlePreview]) -> Vec<&str> {
    previews.iter().map(|p| p.slug.as_str()).collect()
}

fn discovery(tag: Option<&str>, author: Option<&str>, favorited: Option<&str>) -> ArticleListQuery {
    ArticleListQuery {
        tag: tag.map(str::to_string),
        author: author.map(str::to_string),
        favorited: favorited.map(str::to_string),
        ..ArticleListQuery::default()
    }
}

// --- Slugs ---

#[test]
fn test_base_slug_normalizes_titles() {
    assert_eq!(base_slug("Hello World"), "hello-world");
    assert_eq!(base_slug("  Rust & Axum: 2024!  "), "rust-axum-2024");
    assert_eq!(base_slug("!!!"), "article");
}

#[tokio::test]
async fn test_slug_sequence_for_repeated_titles() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;

    let first = publish(&repo, &alice, "Hello World", &[]).await;
    let second = publish(&repo, &alice, "Hello World", &[]).await;
    let third = publish(&repo, &alice, "hello   world", &[]).await;

    assert_eq!(first.slug, "hello-world");
    assert_eq!(second.slug, "hello-world-0");
    assert_eq!(third.slug, "hello-world-1");
}

#[tokio::test]
async fn test_deleted_slug_stays_reserved() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;

    publish(&repo, &alice, "Gone", &[]).await;
    article::delete_article(&repo, &alice, "gone").await.unwrap();

    let next = publish(&repo, &alice, "Gone", &[]).await;
    assert_eq!(next.slug, "gone-0");
}

/// Store whose inserts lose the slug race a fixed number of times.
struct RacingStore {
    inner: InMemoryRepository,
    conflicts_left: AtomicUsize,
}

#[async_trait]
impl ArticleStore for RacingStore {
    async fn slug_available(&self, slug: &str, exclude: Option<Uuid>) -> RepoResult<bool> {
        self.inner.slug_available(slug, exclude).await
    }
    async fn insert_article(&self, new: NewArticle, tags: &[String]) -> RepoResult<Article> {
        let left = self.conflicts_left.load(Ordering::SeqCst);
        if left > 0 {
            self.conflicts_left.store(left - 1, Ordering::SeqCst);
            return Err(RepoError::Conflict);
        }
        self.inner.insert_article(new, tags).await
    }
    async fn get_article_by_slug(&self, slug: &str) -> RepoResult<Option<Article>> {
        self.inner.get_article_by_slug(slug).await
    }
    async fn get_article_detail(&self, viewer: Option<Uuid>, slug: &str) -> RepoResult<Option<ArticleDetail>> {
        self.inner.get_article_detail(viewer, slug).await
    }
    async fn list_articles(&self, filter: &ArticleFilter) -> RepoResult<(Vec<ArticlePreview>, i64)> {
        self.inner.list_articles(filter).await
    }
    async fn update_article(&self, id: Uuid, changes: ArticleChanges) -> RepoResult<Article> {
        self.inner.update_article(id, changes).await
    }
    async fn soft_delete_article(&self, id: Uuid) -> RepoResult<()> {
        self.inner.soft_delete_article(id).await
    }
}

#[tokio::test]
async fn test_create_retries_next_slug_after_insert_conflict() {
    let store = RacingStore {
        inner: InMemoryRepository::new(),
        conflicts_left: AtomicUsize::new(2),
    };
    let author = Identity::authenticated(Uuid::new_v4(), Role::User);

    let created = article::create_article(&store, &author, article_input("Race", &[]))
        .await
        .unwrap();

    assert_eq!(created.slug, "race-1");
}

/// Store that reports every slug as taken and counts the probes.
#[derive(Default)]
struct FullStore {
    probes: AtomicUsize,
}

#[async_trait]
impl ArticleStore for FullStore {
    async fn slug_available(&self, _slug: &str, _exclude: Option<Uuid>) -> RepoResult<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
    async fn insert_article(&self, _new: NewArticle, _tags: &[String]) -> RepoResult<Article> {
        unreachable!("no slug is ever free")
    }
    async fn get_article_by_slug(&self, _slug: &str) -> RepoResult<Option<Article>> {
        Ok(None)
    }
    async fn get_article_detail(&self, _viewer: Option<Uuid>, _slug: &str) -> RepoResult<Option<ArticleDetail>> {
        Ok(None)
    }
    async fn list_articles(&self, _filter: &ArticleFilter) -> RepoResult<(Vec<ArticlePreview>, i64)> {
        Ok((Vec::new(), 0))
    }
    async fn update_article(&self, _id: Uuid, _changes: ArticleChanges) -> RepoResult<Article> {
        Err(RepoError::NotFound)
    }
    async fn soft_delete_article(&self, _id: Uuid) -> RepoResult<()> {
        Err(RepoError::NoEffect)
    }
}

#[tokio::test]
async fn test_slug_allocation_gives_up_after_bounded_attempts() {
    let store = FullStore::default();
    let author = Identity::authenticated(Uuid::new_v4(), Role::User);

    let result = article::create_article(&store, &author, article_input("Crowded", &[])).await;

    assert!(matches!(result, Err(AppError::SlugExhausted)));
    assert_eq!(store.probes.load(Ordering::SeqCst), MAX_SLUG_ATTEMPTS);
}

#[tokio::test]
async fn test_slug_allocator_ignores_excluded_article() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    publish(&repo, &alice, "Mine", &[]).await;
    let own_id = repo.find_article_row("mine").await.unwrap().id;

    let mut allocator = SlugAllocator::new("Mine");
    assert_eq!(allocator.next_available(&repo, Some(own_id)).await.unwrap(), "mine");

    let mut allocator = SlugAllocator::new("Mine");
    assert_eq!(allocator.next_available(&repo, None).await.unwrap(), "mine-0");
}

// --- Articles ---

#[tokio::test]
async fn test_create_requires_authentication() {
    let repo = InMemoryRepository::new();
    let result = article::create_article(&repo, &Identity::anonymous(), article_input("Nope", &[])).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_created_article_detail() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;

    let detail = publish(&repo, &alice, "Tagged", &["rust", "axum"]).await;

    assert_eq!(detail.tag_list, vec!["axum".to_string(), "rust".to_string()]);
    assert!(!detail.favorited);
    assert_eq!(detail.favorites_count, 0);
    assert_eq!(detail.author.username, "alice");
    assert!(!detail.author.following);
}

#[tokio::test]
async fn test_update_by_non_author_is_forbidden_even_for_admin() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    let bob = sign_up(&repo, "bob").await;
    publish(&repo, &alice, "Owned", &[]).await;

    let patch = ArticlePatch {
        body: Some("hijacked".to_string()),
        ..ArticlePatch::default()
    };

    let by_bob = article::update_article(&repo, &bob, "owned", patch.clone()).await;
    assert!(matches!(by_bob, Err(AppError::Forbidden(_))));

    let by_admin = article::update_article(&repo, &as_admin(&bob), "owned", patch).await;
    assert!(matches!(by_admin, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_update_title_reslugs_and_same_title_keeps_slug() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    publish(&repo, &alice, "First Draft", &[]).await;

    let kept = article::update_article(
        &repo,
        &alice,
        "first-draft",
        ArticlePatch {
            title: Some("First Draft".to_string()),
            body: Some("edited".to_string()),
            ..ArticlePatch::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(kept.slug, "first-draft");
    assert_eq!(kept.body, "edited");

    let renamed = article::update_article(
        &repo,
        &alice,
        "first-draft",
        ArticlePatch {
            title: Some("Final Version".to_string()),
            ..ArticlePatch::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.slug, "final-version");
    assert_eq!(renamed.body, "edited");

    let old = article::get_article(&repo, &alice, "first-draft").await;
    assert!(matches!(old, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_update_title_collision_gets_suffix() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    publish(&repo, &alice, "Taken", &[]).await;
    publish(&repo, &alice, "Other", &[]).await;

    let renamed = article::update_article(
        &repo,
        &alice,
        "other",
        ArticlePatch {
            title: Some("Taken".to_string()),
            ..ArticlePatch::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.slug, "taken-0");
}

#[tokio::test]
async fn test_delete_rules_and_soft_delete() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    let bob = sign_up(&repo, "bob").await;
    publish(&repo, &alice, "Doomed", &[]).await;

    let by_bob = article::delete_article(&repo, &bob, "doomed").await;
    assert!(matches!(by_bob, Err(AppError::Forbidden(_))));

    article::delete_article(&repo, &as_admin(&bob), "doomed")
        .await
        .unwrap();

    let detail = article::get_article(&repo, &alice, "doomed").await;
    assert!(matches!(detail, Err(AppError::NotFound(_))));

    // The row survives with a deletion timestamp.
    let row = repo.find_article_row("doomed").await.unwrap();
    assert!(row.deleted_at.is_some());

    let again = article::delete_article(&repo, &alice, "doomed").await;
    assert!(matches!(again, Err(AppError::NoEffect(_))));
}

#[tokio::test]
async fn test_deleted_articles_leave_lists() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    publish(&repo, &alice, "Keep", &[]).await;
    publish(&repo, &alice, "Drop", &[]).await;
    article::delete_article(&repo, &alice, "drop").await.unwrap();

    let (articles, pagination) = article::list_articles(
        &repo,
        &Identity::anonymous(),
        ListMode::Discovery,
        &ArticleListQuery::default(),
    )
    .await
    .unwrap();

    assert_eq!(slugs(&articles), vec!["keep"]);
    assert_eq!(pagination.total, 1);
}

#[tokio::test]
async fn test_discovery_filters_and_ordering() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    let bob = sign_up(&repo, "bob").await;

    publish(&repo, &alice, "One", &["rust"]).await;
    publish(&repo, &bob, "Two", &["go"]).await;
    publish(&repo, &alice, "Three", &["rust", "go"]).await;
    favorite::favorite_article(&repo, &bob, "one").await.unwrap();

    let anon = Identity::anonymous();
    let all = article::list_articles(&repo, &anon, ListMode::Discovery, &discovery(None, None, None))
        .await
        .unwrap();
    assert_eq!(slugs(&all.0), vec!["three", "two", "one"]);

    let rust = article::list_articles(&repo, &anon, ListMode::Discovery, &discovery(Some("rust"), None, None))
        .await
        .unwrap();
    assert_eq!(slugs(&rust.0), vec!["three", "one"]);

    let by_bob = article::list_articles(&repo, &anon, ListMode::Discovery, &discovery(None, Some("bob"), None))
        .await
        .unwrap();
    assert_eq!(slugs(&by_bob.0), vec!["two"]);

    let fav = article::list_articles(&repo, &anon, ListMode::Discovery, &discovery(None, None, Some("bob")))
        .await
        .unwrap();
    assert_eq!(slugs(&fav.0), vec!["one"]);
    assert_eq!(fav.1.total, 1);

    let combined = article::list_articles(
        &repo,
        &anon,
        ListMode::Discovery,
        &discovery(Some("go"), Some("alice"), None),
    )
    .await
    .unwrap();
    assert_eq!(slugs(&combined.0), vec!["three"]);

    let nobody = article::list_articles(&repo, &anon, ListMode::Discovery, &discovery(None, Some("ghost"), None))
        .await
        .unwrap();
    assert!(nobody.0.is_empty());
    assert_eq!(nobody.1.total, 0);
}

#[tokio::test]
async fn test_list_pagination_reports_unpaged_total() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    for title in ["A", "B", "C", "D", "E"] {
        publish(&repo, &alice, title, &[]).await;
    }

    let query = ArticleListQuery {
        limit: Some("2".to_string()),
        offset: Some("1".to_string()),
        ..ArticleListQuery::default()
    };
    let (articles, pagination) = article::list_articles(&repo, &alice, ListMode::Discovery, &query)
        .await
        .unwrap();

    assert_eq!(slugs(&articles), vec!["d", "c"]);
    assert_eq!((pagination.limit, pagination.offset, pagination.total), (2, 1, 5));
}

#[tokio::test]
async fn test_feed_shows_followed_authors_only() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    let bob = sign_up(&repo, "bob").await;
    let carol = sign_up(&repo, "carol").await;

    publish(&repo, &alice, "From Alice", &[]).await;
    publish(&repo, &carol, "From Carol", &["rust"]).await;
    profile::follow_user(&repo, &bob, "carol").await.unwrap();

    // Discovery filters are ignored in feed mode.
    let (feed, pagination) = article::list_articles(
        &repo,
        &bob,
        ListMode::Feed,
        &discovery(Some("nothing-matches"), None, None),
    )
    .await
    .unwrap();

    assert_eq!(slugs(&feed), vec!["from-carol"]);
    assert!(feed[0].author.following);
    assert_eq!(pagination.total, 1);

    let anon = article::list_articles(&repo, &Identity::anonymous(), ListMode::Feed, &ArticleListQuery::default()).await;
    assert!(matches!(anon, Err(AppError::Unauthorized)));
}

// --- Favorites ---

#[tokio::test]
async fn test_favorite_toggle_and_no_effect() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    let bob = sign_up(&repo, "bob").await;
    publish(&repo, &alice, "Liked", &[]).await;

    let bob_id = bob.viewer().unwrap();
    let article_id = repo.find_article_row("liked").await.unwrap().id;
    assert!(!repo.exists_favorite(bob_id, article_id).await.unwrap());

    let liked = favorite::favorite_article(&repo, &bob, "liked").await.unwrap();
    assert!(liked.favorited);
    assert_eq!(liked.favorites_count, 1);
    assert!(repo.exists_favorite(bob_id, article_id).await.unwrap());

    let seen_by_alice = article::get_article(&repo, &alice, "liked").await.unwrap();
    assert!(!seen_by_alice.favorited);
    assert_eq!(seen_by_alice.favorites_count, 1);

    let twice = favorite::favorite_article(&repo, &bob, "liked").await;
    assert!(matches!(twice, Err(AppError::NoEffect(_))));

    let unliked = favorite::unfavorite_article(&repo, &bob, "liked").await.unwrap();
    assert!(!unliked.favorited);
    assert_eq!(unliked.favorites_count, 0);
    assert!(!repo.exists_favorite(bob_id, article_id).await.unwrap());

    let again = favorite::unfavorite_article(&repo, &bob, "liked").await;
    assert!(matches!(again, Err(AppError::NoEffect(_))));

    let missing = favorite::favorite_article(&repo, &bob, "missing").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

// --- Profiles ---

#[tokio::test]
async fn test_follow_rules() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    let bob = sign_up(&repo, "bob").await;
    let (alice_id, bob_id) = (alice.viewer().unwrap(), bob.viewer().unwrap());

    let followed = profile::follow_user(&repo, &alice, "bob").await.unwrap();
    assert!(followed.following);
    assert_eq!(followed.followers_count, 1);
    assert!(repo.exists_follow(alice_id, bob_id).await.unwrap());
    assert!(!repo.exists_follow(bob_id, alice_id).await.unwrap());

    let twice = profile::follow_user(&repo, &alice, "bob").await;
    assert!(matches!(twice, Err(AppError::NoEffect(_))));

    let anon_view = profile::get_profile(&repo, &Identity::anonymous(), "bob").await.unwrap();
    assert!(!anon_view.following);
    assert_eq!(anon_view.followers_count, 1);

    let unfollowed = profile::unfollow_user(&repo, &alice, "bob").await.unwrap();
    assert!(!unfollowed.following);
    assert_eq!(unfollowed.followers_count, 0);
    assert!(!repo.exists_follow(alice_id, bob_id).await.unwrap());

    let not_following = profile::unfollow_user(&repo, &alice, "bob").await;
    assert!(matches!(not_following, Err(AppError::NoEffect(_))));

    let ghost = profile::follow_user(&repo, &alice, "ghost").await;
    assert!(matches!(ghost, Err(AppError::NotFound(_))));

    let ghost_profile = profile::get_profile(&repo, &alice, "ghost").await;
    assert!(matches!(ghost_profile, Err(AppError::NotFound(_))));
}

// --- Comments ---

#[tokio::test]
async fn test_comment_lifecycle() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    let bob = sign_up(&repo, "bob").await;
    let carol = sign_up(&repo, "carol").await;
    publish(&repo, &alice, "Discussed", &[]).await;

    let first = comment::add_comment(
        &repo,
        &bob,
        "discussed",
        NewCommentInput {
            body: "first".to_string(),
        },
    )
    .await
    .unwrap();
    let second = comment::add_comment(
        &repo,
        &carol,
        "discussed",
        NewCommentInput {
            body: "second".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(first.author.username, "bob");

    let (listed, pagination) = comment::list_comments(&repo, &Identity::anonymous(), "discussed", Page::default())
        .await
        .unwrap();
    let bodies: Vec<&str> = listed.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second"]);
    assert_eq!(pagination.total, 2);

    // The article's author does not own other people's comments.
    let by_article_author = comment::delete_comment(&repo, &alice, "discussed", first.id).await;
    assert!(matches!(by_article_author, Err(AppError::Forbidden(_))));

    comment::delete_comment(&repo, &bob, "discussed", first.id)
        .await
        .unwrap();
    comment::delete_comment(&repo, &as_admin(&alice), "discussed", second.id)
        .await
        .unwrap();

    assert!(repo.find_comment_row(first.id).await.unwrap().deleted_at.is_some());

    let gone = comment::delete_comment(&repo, &bob, "discussed", first.id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    let (listed, pagination) = comment::list_comments(&repo, &alice, "discussed", Page::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
    assert_eq!(pagination.total, 0);
}

#[tokio::test]
async fn test_comments_require_live_article() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    publish(&repo, &alice, "Short Lived", &[]).await;
    article::delete_article(&repo, &alice, "short-lived").await.unwrap();

    let add = comment::add_comment(
        &repo,
        &alice,
        "short-lived",
        NewCommentInput {
            body: "hello?".to_string(),
        },
    )
    .await;
    assert!(matches!(add, Err(AppError::NotFound(_))));

    let list = comment::list_comments(&repo, &alice, "short-lived", Page::default()).await;
    assert!(matches!(list, Err(AppError::NotFound(_))));

    let delete = comment::delete_comment(&repo, &alice, "short-lived", Uuid::new_v4()).await;
    assert!(matches!(delete, Err(AppError::NotFound(_))));
}

// --- Tags ---

#[tokio::test]
async fn test_tags_are_alphabetical_and_distinct() {
    let repo = InMemoryRepository::new();
    let alice = sign_up(&repo, "alice").await;
    publish(&repo, &alice, "One", &["zig", "rust"]).await;
    publish(&repo, &alice, "Two", &["rust", "go"]).await;

    let (tags, pagination) = tag::list_tags(&repo, Page::default()).await.unwrap();
    assert_eq!(tags, vec!["go", "rust", "zig"]);
    assert_eq!(pagination.total, 3);

    let (tags, _) = tag::list_tags(&repo, Page::parse(Some("1"), Some("1"))).await.unwrap();
    assert_eq!(tags, vec!["rust"]);
}

// --- Users ---

#[tokio::test]
async fn test_register_conflicts() {
    let repo = InMemoryRepository::new();
    let config = AppConfig::default();
    sign_up(&repo, "alice").await;

    let same_email = user::register(
        &repo,
        &config,
        RegisterUser {
            email: "alice@example.com".to_string(),
            username: "alice2".to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .await;
    assert!(matches!(same_email, Err(AppError::Conflict(msg)) if msg.contains("email")));

    let same_username = user::register(
        &repo,
        &config,
        RegisterUser {
            email: "other@example.com".to_string(),
            username: "alice".to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .await;
    assert!(matches!(same_username, Err(AppError::Conflict(msg)) if msg.contains("username")));
}

#[tokio::test]
async fn test_login_outcomes() {
    let repo = InMemoryRepository::new();
    let config = AppConfig::default();
    sign_up(&repo, "alice").await;

    let session = user::login(
        &repo,
        &config,
        LoginUser {
            email: "alice@example.com".to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(session.user.username, "alice");
    assert!(!session.token.is_empty());
    // The stored secret is a hash, never the plaintext.
    assert_ne!(session.user.password, PASSWORD);

    let wrong_password = user::login(
        &repo,
        &config,
        LoginUser {
            email: "alice@example.com".to_string(),
            password: "Wr0ng!pass".to_string(),
        },
    )
    .await;
    assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));

    let unknown = user::login(
        &repo,
        &config,
        LoginUser {
            email: "nobody@example.com".to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_login_token_carries_stored_role() {
    let repo = InMemoryRepository::new();
    let config = AppConfig::default();
    let alice = sign_up(&repo, "alice").await;
    repo.set_role(alice.viewer().unwrap(), Role::Admin).await.unwrap();

    let session = user::login(
        &repo,
        &config,
        LoginUser {
            email: "alice@example.com".to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .await
    .unwrap();

    let (user_id, role) = validate_token(&session.token, &config.jwt_secret).unwrap();
    assert_eq!(user_id, session.user.id);
    assert_eq!(role, Role::Admin);
}

#[tokio::test]
async fn test_update_user_fields_and_password() {
    let repo = InMemoryRepository::new();
    let config = AppConfig::default();
    let alice = sign_up(&repo, "alice").await;
    sign_up(&repo, "bob").await;

    let taken = user::update_user(
        &repo,
        &config,
        &alice,
        UserPatch {
            username: Some("bob".to_string()),
            ..UserPatch::default()
        },
    )
    .await;
    assert!(matches!(taken, Err(AppError::Conflict(_))));

    // Re-submitting your own email is not a conflict.
    let updated = user::update_user(
        &repo,
        &config,
        &alice,
        UserPatch {
            email: Some("alice@example.com".to_string()),
            bio: Some("hello".to_string()),
            password: Some("N3w!Passw0rd".to_string()),
            ..UserPatch::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.user.bio.as_deref(), Some("hello"));

    let relogin = user::login(
        &repo,
        &config,
        LoginUser {
            email: "alice@example.com".to_string(),
            password: "N3w!Passw0rd".to_string(),
        },
    )
    .await;
    assert!(relogin.is_ok());

    let current = user::current_user(&repo, &config, &alice).await.unwrap();
    assert_eq!(current.user.bio.as_deref(), Some("hello"));

    let anon = user::current_user(&repo, &config, &Identity::anonymous()).await;
    assert!(matches!(anon, Err(AppError::Unauthorized)));
}
