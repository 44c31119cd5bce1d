use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::Session;
use crate::models::{AccountOverview, FileRecord};
use crate::services::portal::{Requester, UploadRequest};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Own profile, quota usage and files", body = AccountOverview),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<AccountOverview>, AppError> {
    let account = session_account(&session)?;
    Ok(Json(state.portal.account_overview(account)))
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Files owned by the caller", body = [FileRecord]),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    let account = session_account(&session)?;
    Ok(Json(state.portal.list_files(&account.id)))
}

#[utoipa::path(
    post,
    path = "/files",
    request_body(content = Multipart, description = "Fields `file` and `displayName`"),
    responses(
        (status = 200, description = "File stored", body = FileRecord),
        (status = 400, description = "Rejected by upload rules"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Quota exceeded")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> Result<Json<FileRecord>, AppError> {
    let account = session_account(&session)?;

    let mut display_name: Option<String> = None;
    let mut file: Option<(String, Option<String>, Bytes)> = None;

    let parsed: Result<(), AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let original_name = field.file_name().unwrap_or("unnamed").to_string();
                    let content_type = field.content_type().map(|s| s.to_string());
                    let data = field.bytes().await.map_err(multipart_error)?;
                    file = Some((original_name, content_type, data));
                }
                "displayName" | "display_name" => {
                    display_name = Some(field.text().await.map_err(multipart_error)?);
                }
                _ => {}
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = parsed {
        tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
        return Err(e);
    }

    let (original_name, declared_type, data) =
        file.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let record = state
        .portal
        .upload(
            &account.id,
            UploadRequest {
                // The original name stands in when no display name was sent.
                display_name: display_name.unwrap_or_else(|| original_name.clone()),
                original_name,
                declared_type,
                data,
            },
        )
        .await?;

    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File content"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let requester = match &session {
        Session::Account(account) => Requester::Account(&account.id),
        Session::Admin(_) => Requester::Admin,
    };
    let (record, blob) = state.portal.download(requester, &id).await?;

    let content_type = if blob.content_type.is_empty() {
        record.file_type.clone()
    } else {
        blob.content_type
    };
    let disposition = content_disposition(&record.original_name, &content_type);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, blob.data.len())
        .body(Body::from(blob.data))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let account = session_account(&session)?;
    state
        .portal
        .delete_file(Requester::Account(&account.id), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn session_account(session: &Session) -> Result<&crate::models::Account, AppError> {
    match session {
        Session::Account(account) => Ok(account),
        Session::Admin(_) => Err(AppError::Forbidden(
            "Account session required".to_string(),
        )),
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    let msg = e.to_string();
    if msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(msg)
    }
}

/// `inline` for types browsers render, `attachment` otherwise, with an ASCII
/// fallback name next to the RFC 5987 encoded one.
pub(crate) fn content_disposition(filename: &str, content_type: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    let disposition_type = if content_type.starts_with("image/")
        || content_type.starts_with("text/")
        || content_type == "application/pdf"
    {
        "inline"
    } else {
        "attachment"
    };

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition_type, fallback_filename, encoded_filename
    )
}
