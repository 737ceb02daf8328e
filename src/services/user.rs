use crate::{
    auth::{Identity, Role, issue_session_token},
    config::AppConfig,
    error::AppError,
    models::{LoginUser, NewUser, RegisterUser, User, UserChanges, UserPatch},
    password::{hash_password, verify_password},
    repository::{RepoError, UserStore},
};

/// Session
///
/// A user together with a freshly signed token for them.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

impl Session {
    fn issue(config: &AppConfig, user: User) -> Result<Self, AppError> {
        let token = issue_session_token(config, user.id, user.role())?;
        Ok(Self { user, token })
    }
}

/// register
///
/// New accounts always start with `Role::User`. Duplicate email or username
/// is a `Conflict`; the pre-checks give a precise message, the unique
/// constraint covers the race.
pub async fn register<S>(store: &S, config: &AppConfig, input: RegisterUser) -> Result<Session, AppError>
where
    S: UserStore + ?Sized,
{
    ensure_email_free(store, &input.email, None).await?;
    ensure_username_free(store, &input.username, None).await?;

    let password_hash = hash_password(input.password).await?;
    let user = store
        .insert_user(NewUser {
            email: input.email,
            username: input.username,
            password_hash,
            role: Role::User,
        })
        .await
        .map_err(|e| match e {
            RepoError::Conflict => AppError::Conflict("email or username is already taken".to_string()),
            other => AppError::from_repo(other, "insert user"),
        })?;

    tracing::info!(user = %user.id, username = %user.username, "user registered");
    Session::issue(config, user)
}

/// login
///
/// Unknown email is `NotFound`, a wrong password `InvalidCredentials`. The
/// handler answers both with the same 401.
pub async fn login<S>(store: &S, config: &AppConfig, input: LoginUser) -> Result<Session, AppError>
where
    S: UserStore + ?Sized,
{
    let user = store
        .get_user_by_email(&input.email)
        .await
        .map_err(|e| AppError::from_repo(e, "user lookup"))?
        .ok_or_else(|| AppError::not_found("user"))?;

    if !verify_password(input.password, user.password.clone()).await? {
        tracing::debug!(user = %user.id, "login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    Session::issue(config, user)
}

pub async fn current_user<S>(store: &S, config: &AppConfig, identity: &Identity) -> Result<Session, AppError>
where
    S: UserStore + ?Sized,
{
    let user = load_user(store, identity).await?;
    Session::issue(config, user)
}

/// update_user
///
/// Applies only the provided fields. A new password is hashed before it
/// reaches the store.
pub async fn update_user<S>(
    store: &S,
    config: &AppConfig,
    identity: &Identity,
    patch: UserPatch,
) -> Result<Session, AppError>
where
    S: UserStore + ?Sized,
{
    let user = load_user(store, identity).await?;

    let email = patch.email.filter(|e| *e != user.email);
    let username = patch.username.filter(|u| *u != user.username);
    if let Some(email) = &email {
        ensure_email_free(store, email, Some(&user)).await?;
    }
    if let Some(username) = &username {
        ensure_username_free(store, username, Some(&user)).await?;
    }

    let password_hash = match patch.password {
        Some(plain) => Some(hash_password(plain).await?),
        None => None,
    };

    let updated = store
        .update_user(
            user.id,
            UserChanges {
                email,
                username,
                password_hash,
                bio: patch.bio,
                image: patch.image,
            },
        )
        .await
        .map_err(|e| match e {
            RepoError::Conflict => AppError::Conflict("email or username is already taken".to_string()),
            other => AppError::from_repo(other, "update user"),
        })?;

    tracing::info!(user = %updated.id, "user updated");
    Session::issue(config, updated)
}

async fn load_user<S>(store: &S, identity: &Identity) -> Result<User, AppError>
where
    S: UserStore + ?Sized,
{
    let id = identity.require()?;
    store
        .get_user_by_id(id)
        .await
        .map_err(|e| AppError::from_repo(e, "user lookup"))?
        .ok_or_else(|| AppError::not_found("user"))
}

async fn ensure_email_free<S>(store: &S, email: &str, current: Option<&User>) -> Result<(), AppError>
where
    S: UserStore + ?Sized,
{
    let existing = store
        .get_user_by_email(email)
        .await
        .map_err(|e| AppError::from_repo(e, "user lookup"))?;
    match existing {
        Some(other) if current.is_none_or(|me| me.id != other.id) => {
            Err(AppError::Conflict("email is already taken".to_string()))
        }
        _ => Ok(()),
    }
}

async fn ensure_username_free<S>(store: &S, username: &str, current: Option<&User>) -> Result<(), AppError>
where
    S: UserStore + ?Sized,
{
    let existing = store
        .get_user_by_username(username)
        .await
        .map_err(|e| AppError::from_repo(e, "user lookup"))?;
    match existing {
        Some(other) if current.is_none_or(|me| me.id != other.id) => {
            Err(AppError::Conflict("username is already taken".to_string()))
        }
        _ => Ok(()),
    }
}
