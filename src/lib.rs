pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::services::portal::PortalService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::auth::login,
        api::handlers::auth::admin_login,
        api::handlers::files::me,
        api::handlers::files::list_files,
        api::handlers::files::upload_file,
        api::handlers::files::download_file,
        api::handlers::files::delete_file,
        api::handlers::admin::list_accounts,
        api::handlers::admin::create_account,
        api::handlers::admin::get_account,
        api::handlers::admin::update_account,
        api::handlers::admin::delete_account,
        api::handlers::admin::list_all_files,
        api::handlers::admin::delete_any_file,
        api::handlers::admin::system_status,
        api::handlers::backups::list_backups,
        api::handlers::backups::create_backup,
        api::handlers::backups::import_backup,
        api::handlers::backups::restore_backup,
        api::handlers::backups::export_backup,
    ),
    components(
        schemas(
            api::handlers::auth::LoginRequest,
            api::handlers::auth::LoginResponse,
            api::handlers::health::HealthResponse,
            api::handlers::admin::AdminAccountView,
            api::handlers::admin::DeleteAccountResponse,
            utils::auth::Role,
            models::Account,
            models::AccountProfile,
            models::AccountOverview,
            models::CreateAccountRequest,
            models::UpdateAccountRequest,
            models::FileRecord,
            models::QuotaUsage,
            models::SystemInfo,
            models::SystemStatus,
            models::BackupSnapshot,
            models::RestoreReport,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Account and administrator login"),
        (name = "files", description = "Own files and quota"),
        (name = "admin", description = "Account and file administration"),
        (name = "backups", description = "Snapshots, restore, export and import"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<PortalService>,
}

pub fn create_app(state: AppState) -> Router {
    use api::handlers::{admin, auth, backups, files, health};
    use api::middleware::auth::{
        account_auth_middleware, admin_auth_middleware, session_auth_middleware,
    };

    let config = state.portal.config();
    // Multipart framing needs headroom above the file size limit.
    let body_limit = config.max_file_size.saturating_add(1024 * 1024);
    let cors = cors_layer(&config.allowed_origins);

    let account_routes = Router::new()
        .route("/me", get(files::me))
        .route("/files", get(files::list_files).post(files::upload_file))
        .layer(from_fn_with_state(state.clone(), account_auth_middleware));

    // Administrators may download any file; deleting here stays account-only.
    let file_routes = Router::new()
        .route(
            "/files/:id",
            get(files::download_file).delete(files::delete_file),
        )
        .layer(from_fn_with_state(state.clone(), session_auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/admin/accounts",
            get(admin::list_accounts).post(admin::create_account),
        )
        .route(
            "/admin/accounts/:id",
            get(admin::get_account)
                .patch(admin::update_account)
                .delete(admin::delete_account),
        )
        .route("/admin/files", get(admin::list_all_files))
        .route("/admin/files/:id", delete(admin::delete_any_file))
        .route("/admin/status", get(admin::system_status))
        .route(
            "/admin/backups",
            get(backups::list_backups).post(backups::create_backup),
        )
        .route("/admin/backups/import", post(backups::import_backup))
        .route(
            "/admin/backups/:index/restore",
            post(backups::restore_backup),
        )
        .route("/admin/backups/:index/export", get(backups::export_backup))
        .layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/login", post(auth::login))
        .route("/admin/login", post(auth::admin_login))
        .merge(account_routes)
        .merge(file_routes)
        .merge(admin_routes)
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// `*` or an empty list allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_DISPOSITION]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
