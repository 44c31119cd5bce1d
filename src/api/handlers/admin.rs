use crate::AppState;
use crate::api::error::AppError;
use crate::models::{
    Account, CreateAccountRequest, FileRecord, QuotaUsage, SystemStatus, UpdateAccountRequest,
};
use crate::services::portal::Requester;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An account as administrators see it, credentials included.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccountView {
    #[serde(flatten)]
    pub account: Account,
    pub usage: QuotaUsage,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountResponse {
    pub id: String,
    pub deleted_files: Vec<String>,
}

fn view(state: &AppState, account: Account) -> AdminAccountView {
    AdminAccountView {
        usage: state.portal.quota().usage_for(&account),
        account,
    }
}

#[utoipa::path(
    get,
    path = "/admin/accounts",
    responses(
        (status = 200, description = "All accounts in creation order", body = [AdminAccountView]),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn list_accounts(State(state): State<AppState>) -> Json<Vec<AdminAccountView>> {
    let accounts = state.portal.list_accounts();
    Json(accounts.into_iter().map(|a| view(&state, a)).collect())
}

#[utoipa::path(
    post,
    path = "/admin/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AdminAccountView),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username already exists")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.portal.create_account(req)?;
    Ok((StatusCode::CREATED, Json(view(&state, account))))
}

#[utoipa::path(
    get,
    path = "/admin/accounts/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account with usage", body = AdminAccountView),
        (status = 404, description = "Account not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdminAccountView>, AppError> {
    let account = state.portal.get_account(&id)?;
    Ok(Json(view(&state, account)))
}

#[utoipa::path(
    patch,
    path = "/admin/accounts/{id}",
    params(("id" = String, Path, description = "Account id")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = AdminAccountView),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Username already exists")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<AdminAccountView>, AppError> {
    let account = state.portal.update_account(&id, req)?;
    Ok(Json(view(&state, account)))
}

#[utoipa::path(
    delete,
    path = "/admin/accounts/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account and its files deleted", body = DeleteAccountResponse),
        (status = 404, description = "Account not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteAccountResponse>, AppError> {
    let deleted_files = state.portal.delete_account(&id).await?;
    Ok(Json(DeleteAccountResponse { id, deleted_files }))
}

#[utoipa::path(
    get,
    path = "/admin/files",
    responses(
        (status = 200, description = "Every stored file", body = [FileRecord])
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn list_all_files(State(state): State<AppState>) -> Json<Vec<FileRecord>> {
    Json(state.portal.list_all_files())
}

#[utoipa::path(
    delete,
    path = "/admin/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn delete_any_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.portal.delete_file(Requester::Admin, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/status",
    responses(
        (status = 200, description = "Store-wide counters", body = SystemStatus)
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.portal.status())
}
