use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    auth::{AuthUser, Identity},
    error::{AppError, ErrorBody},
    models::ProfileResponse,
    services::profile,
};

/// get_profile
///
/// [Public Route] A user's public profile.
#[utoipa::path(
    get,
    path = "/api/profiles/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "profiles"
)]
pub async fn get_profile(
    identity: Identity,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = profile::get_profile(&*state.repo, &identity, &username).await?;
    Ok(Json(ProfileResponse { profile }))
}

#[utoipa::path(
    post,
    path = "/api/profiles/{username}/follow",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Followed", body = ProfileResponse),
        (status = 400, description = "Already following", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "profiles"
)]
pub async fn follow_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = profile::follow_user(&*state.repo, &Identity::from(auth), &username).await?;
    Ok(Json(ProfileResponse { profile }))
}

#[utoipa::path(
    delete,
    path = "/api/profiles/{username}/follow",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Unfollowed", body = ProfileResponse),
        (status = 400, description = "Not following", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    tag = "profiles"
)]
pub async fn unfollow_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = profile::unfollow_user(&*state.repo, &Identity::from(auth), &username).await?;
    Ok(Json(ProfileResponse { profile }))
}
