use std::env;

/// AppConfig
///
/// Immutable runtime configuration, loaded once at startup and shared with
/// handlers and extractors through `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which settings are mandatory.
    pub env: Env,
    // Postgres connection string. `None` in local mode selects the in-memory store.
    pub database_url: Option<String>,
    pub pg_pool_max: u32,
    // Socket address the HTTP server binds to.
    pub http_addr: String,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    pub jwt_issuer: String,
    // Token lifetime, also used as the cookie Max-Age.
    pub jwt_ttl_secs: u64,
    pub jwt_cookie_name: String,
    // Allowed CORS origins. Empty means any origin.
    pub cors_allow_origins: Vec<String>,
}

/// Env
///
/// Distinguishes developer machines (pretty logs, in-memory fallback, default
/// secret) from deployments (JSON logs, every secret mandatory).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_COOKIE_NAME: &str = "realworld-jwt";
const LOCAL_JWT_SECRET: &str = "realworld-local-development-secret";

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state scaffolding. No database URL,
    /// so anything built from it runs against the in-memory store.
    fn default() -> Self {
        Self {
            env: Env::Local,
            database_url: None,
            pg_pool_max: 5,
            http_addr: "127.0.0.1:8080".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_issuer: "realworld-api".to_string(),
            jwt_ttl_secs: 24 * 60 * 60,
            jwt_cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cors_allow_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `JWT_SECRET` is missing, so
    /// the server never starts with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let defaults = Self::default();

        let env = match env::var("APP_ENV").unwrap_or_default().as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (database_url, jwt_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production")),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
                env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            ),
        };

        Self {
            env,
            database_url,
            pg_pool_max: parse_var("PG_POOL_MAX").unwrap_or(defaults.pg_pool_max),
            http_addr: env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_ttl_secs: parse_var("JWT_TTL_SECS").unwrap_or(defaults.jwt_ttl_secs),
            jwt_cookie_name: env::var("JWT_COOKIE_NAME").unwrap_or(defaults.jwt_cookie_name),
            cors_allow_origins: env::var("CORS_ALLOW_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

// Unparseable values fall back to the default instead of aborting startup.
fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}
