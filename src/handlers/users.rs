use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::{
    AppState,
    auth::{AuthUser, Identity, expired_session_cookie, session_cookie},
    config::AppConfig,
    error::{AppError, ErrorBody},
    models::{LoginRequest, RegisterRequest, UpdateUserRequest, UserAuth, UserResponse},
    services::user::{self, Session},
};

/// Wraps a session as `{"user": ...}` and refreshes the session cookie.
fn session_response(config: &AppConfig, status: StatusCode, session: Session) -> impl IntoResponse + use<> {
    let cookie = session_cookie(config, &session.token);
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse {
            user: UserAuth::new(session.user, session.token),
        }),
    )
}

/// register
///
/// [Public Route] Creates an account and signs the caller in.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserResponse),
        (status = 409, description = "Email or username taken", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = payload.user.validate()?;
    let session = user::register(&*state.repo, &state.config, input).await?;
    Ok(session_response(&state.config, StatusCode::CREATED, session))
}

/// login
///
/// [Public Route] Exchanges email and password for a session token.
///
/// *Note*: an unknown email and a wrong password get the same 401 so the
/// endpoint does not reveal which emails are registered.
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = UserResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = payload.user.validate()?;
    let session = user::login(&*state.repo, &state.config, input)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::InvalidCredentials,
            other => other,
        })?;
    Ok(session_response(&state.config, StatusCode::OK, session))
}

/// logout
///
/// [Public Route] Expires the session cookie. Tokens held elsewhere stay
/// valid until they expire.
#[utoipa::path(
    post,
    path = "/api/users/logout",
    responses((status = 204, description = "Cookie cleared")),
    tag = "users"
)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, expired_session_cookie(&state.config))],
    )
}

/// get_current_user
///
/// [Authenticated Route] Returns the caller's account with a fresh token.
#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not signed in", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let session = user::current_user(&*state.repo, &state.config, &Identity::from(auth)).await?;
    Ok(session_response(&state.config, StatusCode::OK, session))
}

/// update_current_user
///
/// [Authenticated Route] Partial update of the caller's own account.
#[utoipa::path(
    put,
    path = "/api/user",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserResponse),
        (status = 409, description = "Email or username taken", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn update_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let patch = payload.user.validate()?;
    let session =
        user::update_user(&*state.repo, &state.config, &Identity::from(auth), patch).await?;
    Ok(session_response(&state.config, StatusCode::OK, session))
}
