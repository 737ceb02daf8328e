use uuid::Uuid;

use crate::{
    auth::Identity,
    error::AppError,
    models::ProfilePreview,
    repository::{FollowStore, RepoError, UserStore},
};

pub async fn get_profile<S>(store: &S, identity: &Identity, username: &str) -> Result<ProfilePreview, AppError>
where
    S: FollowStore + ?Sized,
{
    store
        .get_profile(identity.viewer(), username)
        .await
        .map_err(|e| AppError::from_repo(e, "profile lookup"))?
        .ok_or_else(|| AppError::not_found("profile"))
}

/// follow_user
///
/// The target must exist. Following someone already followed is `NoEffect`.
/// Following yourself is allowed.
pub async fn follow_user<S>(store: &S, identity: &Identity, username: &str) -> Result<ProfilePreview, AppError>
where
    S: UserStore + FollowStore + ?Sized,
{
    let viewer = identity.require()?;
    let target = store
        .get_user_by_username(username)
        .await
        .map_err(|e| AppError::from_repo(e, "user lookup"))?
        .ok_or_else(|| AppError::not_found("profile"))?;
    if following(store, viewer, target.id).await? {
        return Err(AppError::NoEffect(format!("already following {username}")));
    }

    store
        .insert_follow(viewer, target.id)
        .await
        .map_err(|e| match e {
            RepoError::NoEffect => AppError::NoEffect(format!("already following {username}")),
            other => AppError::from_repo(other, "follow user"),
        })?;

    tracing::debug!(follower = %viewer, following = %target.id, "user followed");
    get_profile(store, identity, username).await
}

pub async fn unfollow_user<S>(store: &S, identity: &Identity, username: &str) -> Result<ProfilePreview, AppError>
where
    S: UserStore + FollowStore + ?Sized,
{
    let viewer = identity.require()?;
    let target = store
        .get_user_by_username(username)
        .await
        .map_err(|e| AppError::from_repo(e, "user lookup"))?
        .ok_or_else(|| AppError::not_found("profile"))?;
    if !following(store, viewer, target.id).await? {
        return Err(AppError::NoEffect(format!("not following {username}")));
    }

    store
        .delete_follow(viewer, target.id)
        .await
        .map_err(|e| match e {
            RepoError::NoEffect => AppError::NoEffect(format!("not following {username}")),
            other => AppError::from_repo(other, "unfollow user"),
        })?;

    tracing::debug!(follower = %viewer, following = %target.id, "user unfollowed");
    get_profile(store, identity, username).await
}

async fn following<S>(store: &S, follower: Uuid, target: Uuid) -> Result<bool, AppError>
where
    S: FollowStore + ?Sized,
{
    store
        .exists_follow(follower, target)
        .await
        .map_err(|e| AppError::from_repo(e, "follow lookup"))
}
