use std::{convert::Infallible, fmt};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError};

/// Scheme keyword expected in the `Authorization` header (`Token <jwt>`).
pub const TOKEN_SCHEME: &str = "Token";

/// Role
///
/// Privilege level carried in the token. Anything that is not exactly an
/// admin claim resolves to `User`, never the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Lenient parse used for token claims and stored rows. Only the exact
    /// string `admin` grants `Admin`.
    pub fn parse_lenient(raw: Option<&str>) -> Role {
        match raw {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims
///
/// Payload signed into every session token. `sub` and `role` default when
/// absent so that their absence surfaces as a typed `TokenError` instead of a
/// generic decode failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID in string form.
    #[serde(default)]
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub iat: u64,
    /// Absolute expiry, Unix seconds.
    pub exp: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token claims are malformed")]
    MalformedClaims,
    #[error("token has no subject")]
    MissingSubject,
    #[error("token lifetime of {0}s is out of range")]
    LifetimeOutOfRange(u64),
    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// issue_token
///
/// Signs an HS256 token for `user_id` that expires `ttl_secs` from now.
pub fn issue_token(
    user_id: Uuid,
    role: Role,
    secret: &str,
    issuer: &str,
    ttl_secs: u64,
) -> Result<String, TokenError> {
    let now = Utc::now().timestamp().max(0) as u64;
    let exp = now
        .checked_add(ttl_secs)
        .ok_or(TokenError::LifetimeOutOfRange(ttl_secs))?;
    let claims = Claims {
        sub: user_id.to_string(),
        role: Some(role.as_str().to_string()),
        iss: issuer.to_string(),
        iat: now,
        exp,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// validate_token
///
/// Verifies signature and expiry and returns the subject and role.
///
/// *Algorithms*: only the HMAC family is accepted. A token declaring any other
/// algorithm is rejected as `InvalidSignature`, which closes the
/// algorithm-confusion hole. Expiry is checked with zero leeway.
pub fn validate_token(token: &str, secret: &str) -> Result<(Uuid, Role), TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
            _ => TokenError::MalformedClaims,
        })?;

    let sub = data.claims.sub.trim();
    if sub.is_empty() {
        return Err(TokenError::MissingSubject);
    }
    let user_id = Uuid::parse_str(sub).map_err(|_| TokenError::MalformedClaims)?;

    Ok((user_id, Role::parse_lenient(data.claims.role.as_deref())))
}

/// Signs a session token with the configured secret, issuer and lifetime.
pub fn issue_session_token(config: &AppConfig, user_id: Uuid, role: Role) -> Result<String, AppError> {
    issue_token(
        user_id,
        role,
        &config.jwt_secret,
        &config.jwt_issuer,
        config.jwt_ttl_secs,
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

// --- Request Identity ---

/// Identity
///
/// The resolved caller for one request. Built once by the guard and handed
/// explicitly to every service call; anonymous callers carry the nil UUID and
/// `Role::User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    authenticated: bool,
    user_id: Uuid,
    role: Role,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: Uuid::nil(),
            role: Role::User,
        }
    }

    pub fn authenticated(user_id: Uuid, role: Role) -> Self {
        Self {
            authenticated: true,
            user_id,
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The caller's id when authenticated.
    pub fn viewer(&self) -> Option<Uuid> {
        self.authenticated.then_some(self.user_id)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.authenticated && self.role == Role::Admin
    }

    /// Returns the caller's id or `Unauthorized` for anonymous callers.
    pub fn require(&self) -> Result<Uuid, AppError> {
        self.viewer().ok_or(AppError::Unauthorized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Required,
    Optional,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credentials supplied")]
    MissingCredentials,
    #[error("authorization header is malformed")]
    MalformedHeader,
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// authorize
///
/// The single authorization guard behind both extractors.
///
/// *Credential sources*: the `Authorization: Token <jwt>` header, else the
/// session cookie. A header that is present but malformed is a failure in
/// itself; the cookie is only consulted when the header is absent.
///
/// *Modes*: `Required` returns every failure to the caller. `Optional` turns
/// every failure into an anonymous identity.
pub fn authorize(headers: &HeaderMap, config: &AppConfig, mode: AuthMode) -> Result<Identity, AuthError> {
    let resolved = extract_token(headers, &config.jwt_cookie_name).and_then(|token| {
        validate_token(&token, &config.jwt_secret).map_err(AuthError::from)
    });

    match (resolved, mode) {
        (Ok((user_id, role)), _) => Ok(Identity::authenticated(user_id, role)),
        (Err(err), AuthMode::Required) => Err(err),
        (Err(AuthError::MissingCredentials), AuthMode::Optional) => Ok(Identity::anonymous()),
        (Err(err), AuthMode::Optional) => {
            tracing::debug!(error = %err, "credentials rejected, continuing anonymously");
            Ok(Identity::anonymous())
        }
    }
}

fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Result<String, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return session_cookie_value(headers, cookie_name).ok_or(AuthError::MissingCredentials);
    };

    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case(TOKEN_SCHEME) || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.to_string())
}

/// Finds `name` among the request's `Cookie` headers.
pub fn session_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Set-Cookie value carrying a fresh session token.
pub fn session_cookie(config: &AppConfig, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        config.jwt_cookie_name, token, config.jwt_ttl_secs
    )
}

/// Set-Cookie value that makes the browser drop the session cookie.
pub fn expired_session_cookie(config: &AppConfig) -> String {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        config.jwt_cookie_name
    )
}

// --- Extractors ---

/// AuthUser
///
/// Extractor for routes that require a signed-in caller. Rejects with
/// `401 Unauthorized` on any guard failure.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl From<AuthUser> for Identity {
    fn from(user: AuthUser) -> Self {
        Identity::authenticated(user.id, user.role)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let identity = authorize(&parts.headers, &config, AuthMode::Required).map_err(|err| {
            tracing::debug!(error = %err, "rejecting unauthenticated request");
            AppError::Unauthorized
        })?;

        Ok(AuthUser {
            id: identity.require()?,
            role: identity.role(),
        })
    }
}

/// Optional-mode extractor: never rejects, degrades to anonymous.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(authorize(&parts.headers, &config, AuthMode::Optional).unwrap_or_else(|_| Identity::anonymous()))
    }
}
