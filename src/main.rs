use dotenvy::dotenv;
use quota_portal::config::PortalConfig;
use quota_portal::infrastructure::storage;
use quota_portal::services::portal::PortalService;
use quota_portal::services::worker;
use quota_portal::{AppState, create_app};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quota_portal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Quota Portal...");

    let config = PortalConfig::from_env();
    info!(
        "🛡️  Upload limits: Max Size={}MB, Types={}, Default Quota={}MB",
        config.max_file_size / 1024 / 1024,
        config.allowed_file_types.join(","),
        config.default_quota_mb
    );
    if std::env::var("MAX_BACKUPS")
        .is_ok_and(|v| v.trim().parse::<usize>().ok() != Some(config.backup.max_backups))
    {
        warn!(
            "⚠️  MAX_BACKUPS must be a whole number of at least 1; keeping {}",
            config.backup.max_backups
        );
    }
    if config.jwt_secret == PortalConfig::default().jwt_secret {
        warn!("⚠️  JWT_SECRET is not set; sessions are signed with the built-in default");
    }
    if !config
        .admin_credentials
        .iter()
        .any(|a| a.username.is_some() && a.password.is_some())
    {
        warn!("⚠️  No administrator configured (ADMIN_USERNAME_1 / ADMIN_PASSWORD_1)");
    }

    // 2. Storage & services
    let store = storage::setup_store(&config)?;
    let bind_addr = config.bind_addr.clone();
    let interval_hours = config.backup.interval_hours;
    let portal = Arc::new(PortalService::new(config, store));

    // 3. Shutdown channel & backup scheduler
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = worker::schedule_automatic(portal.clone(), interval_hours, shutdown_rx);

    // 4. HTTP API
    let state = AppState {
        portal: portal.clone(),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri().path());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("✅ API Server listening on: http://{}", bind_addr);
    info!("📖 Swagger UI documentation: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    // 5. Stop the scheduler
    info!("🛑 Shutting down backend services...");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }

    info!("👋 Portal exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
