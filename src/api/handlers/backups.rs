use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::files::content_disposition;
use crate::models::{BackupSnapshot, RestoreReport};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

#[utoipa::path(
    get,
    path = "/admin/backups",
    responses(
        (status = 200, description = "Backup history, newest first", body = [BackupSnapshot])
    ),
    security(("jwt" = [])),
    tag = "backups"
)]
pub async fn list_backups(State(state): State<AppState>) -> Json<Vec<BackupSnapshot>> {
    Json(state.portal.list_backups())
}

#[utoipa::path(
    post,
    path = "/admin/backups",
    responses(
        (status = 201, description = "Snapshot taken", body = BackupSnapshot),
        (status = 409, description = "Backups are disabled")
    ),
    security(("jwt" = [])),
    tag = "backups"
)]
pub async fn create_backup(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    match state.portal.create_backup().await? {
        Some(snapshot) => Ok((StatusCode::CREATED, Json(snapshot))),
        None => Err(AppError::Conflict("Backups are disabled".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/admin/backups/import",
    request_body(content = String, description = "An exported backup document", content_type = "application/json"),
    responses(
        (status = 201, description = "Backup imported", body = BackupSnapshot),
        (status = 400, description = "Invalid backup format")
    ),
    security(("jwt" = [])),
    tag = "backups"
)]
pub async fn import_backup(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.portal.import_backup(&body)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

#[utoipa::path(
    post,
    path = "/admin/backups/{index}/restore",
    params(("index" = usize, Path, description = "Position in the history, 0 is newest")),
    responses(
        (status = 200, description = "Backup restored", body = RestoreReport),
        (status = 404, description = "No backup at that index")
    ),
    security(("jwt" = [])),
    tag = "backups"
)]
pub async fn restore_backup(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<RestoreReport>, AppError> {
    Ok(Json(state.portal.restore_backup(index).await?))
}

#[utoipa::path(
    get,
    path = "/admin/backups/{index}/export",
    params(("index" = usize, Path, description = "Position in the history, 0 is newest")),
    responses(
        (status = 200, description = "Backup document as a download"),
        (status = 404, description = "No backup at that index")
    ),
    security(("jwt" = [])),
    tag = "backups"
)]
pub async fn export_backup(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Response, AppError> {
    let exported = state.portal.export_backup(index)?;
    let disposition = content_disposition(&exported.file_name, "application/json");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(exported.document))
        .map_err(|e| AppError::Internal(e.to_string()))
}
