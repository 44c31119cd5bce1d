use crate::AppState;
use crate::api::error::AppError;
use crate::models::Account;
use crate::utils::auth::{Claims, Role, validate_jwt};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// The authenticated caller, placed in request extensions by the middlewares below.
#[derive(Debug, Clone)]
pub enum Session {
    Account(Account),
    Admin(String),
}

/// Accepts account sessions only.
pub async fn account_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match resolve_session(&state, &req)? {
        session @ Session::Account(_) => {
            req.extensions_mut().insert(session);
            Ok(next.run(req).await)
        }
        Session::Admin(_) => Err(AppError::Forbidden(
            "Account session required".to_string(),
        )),
    }
}

/// Accepts administrator sessions only.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match resolve_session(&state, &req)? {
        session @ Session::Admin(_) => {
            req.extensions_mut().insert(session);
            Ok(next.run(req).await)
        }
        Session::Account(_) => Err(AppError::Forbidden(
            "Administrator session required".to_string(),
        )),
    }
}

/// Accepts either role.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = resolve_session(&state, &req)?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Bearer header first, then `?token=` for plain download links. Account
/// sessions are checked against the store on every request, so deleting,
/// deactivating or expiring an account ends its sessions.
fn resolve_session(state: &AppState, req: &Request) -> Result<Session, AppError> {
    let token = bearer_token(req)
        .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;
    let claims: Claims = validate_jwt(&token, &state.portal.config().jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    match claims.role {
        Role::Account => state
            .portal
            .session_account(&claims.sub)
            .map(Session::Account)
            .map_err(|_| AppError::Unauthorized("Session is no longer valid".to_string())),
        Role::Admin if state.portal.is_administrator(&claims.sub) => Ok(Session::Admin(claims.sub)),
        Role::Admin => Err(AppError::Unauthorized(
            "Session is no longer valid".to_string(),
        )),
    }
}

fn bearer_token(req: &Request) -> Option<String> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());
    if header.is_some() {
        return header;
    }

    let query = req.uri().query().unwrap_or_default();
    serde_urlencoded::from_str::<AuthQuery>(query)
        .ok()
        .and_then(|q| q.token)
}
