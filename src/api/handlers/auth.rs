use crate::AppState;
use crate::api::error::AppError;
use crate::models::AccountProfile;
use crate::utils::auth::{Role, create_jwt};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    /// Session lifetime in seconds.
    pub expires_in: u64,
    /// Present for account logins.
    pub account: Option<AccountProfile>,
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Account session issued", body = LoginResponse),
        (status = 401, description = "Invalid username or password, or the account has expired")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let account = state.portal.login_account(&req.username, &req.password)?;
    let config = state.portal.config();
    let token = create_jwt(
        &account.id,
        Role::Account,
        &config.jwt_secret,
        config.session_timeout_secs,
    )?;

    Ok(Json(LoginResponse {
        token,
        role: Role::Account,
        expires_in: config.session_timeout_secs,
        account: Some(AccountProfile::from(&account)),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Administrator session issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .portal
        .login_administrator(&req.username, &req.password)?;
    let config = state.portal.config();
    let token = create_jwt(
        &req.username,
        Role::Admin,
        &config.jwt_secret,
        config.session_timeout_secs,
    )?;

    Ok(Json(LoginResponse {
        token,
        role: Role::Admin,
        expires_in: config.session_timeout_secs,
        account: None,
    }))
}
