use crate::services::portal::PortalService;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

/// Takes a snapshot every `interval` until the shutdown flag flips.
/// The schedule itself is not persisted; a restart starts a fresh interval.
/// Runs go through the portal so they never overlap a restore.
pub struct BackupScheduler {
    portal: Arc<PortalService>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackupScheduler {
    pub fn new(
        portal: Arc<PortalService>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            portal,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "⏰ Backup scheduler started (every {:?})",
            self.interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Backup scheduler shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.run_once().await;
                }
            }
        }
    }

    async fn run_once(&self) {
        match self.portal.create_backup().await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::debug!("Backups disabled, skipping scheduled run"),
            Err(e) => tracing::error!("Scheduled backup failed: {}", e),
        }
        if let Err(e) = self.portal.prune_backups().await {
            tracing::error!("Backup pruning failed: {}", e);
        }
    }
}

/// Spawns the scheduler when backups are enabled and the interval is non-zero.
pub fn schedule_automatic(
    portal: Arc<PortalService>,
    interval_hours: u64,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if !portal.config().backup.enabled || interval_hours == 0 {
        tracing::info!("Automatic backups disabled");
        return None;
    }
    let interval = Duration::from_secs(interval_hours.saturating_mul(3600));
    Some(tokio::spawn(
        BackupScheduler::new(portal, interval, shutdown).run(),
    ))
}
