use crate::config::BackupConfig;
use crate::error::{PortalError, PortalResult};
use crate::infrastructure::kv::KeyValueStore;
use crate::models::{BackupSnapshot, ExportedBackup, RestoreReport, SystemInfo};
use crate::services::accounts::AccountStore;
use crate::services::collection::JsonCollection;
use crate::services::file_service::FileStore;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const BACKUPS_KEY: &str = "system_backups";
pub const BACKUP_VERSION: &str = "1.0.0";

/// Snapshots of accounts and file identities, kept newest-first and capped at
/// `max_backups`.
pub struct BackupService {
    history: JsonCollection<BackupSnapshot>,
    accounts: Arc<AccountStore>,
    files: Arc<FileStore>,
    config: BackupConfig,
    admin_count: usize,
}

impl BackupService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        accounts: Arc<AccountStore>,
        files: Arc<FileStore>,
        mut config: BackupConfig,
        admin_count: usize,
    ) -> Self {
        if config.max_backups == 0 {
            warn!("max_backups of 0 would keep no history; keeping 1");
            config.max_backups = 1;
        }
        Self {
            history: JsonCollection::new(store, BACKUPS_KEY),
            accounts,
            files,
            config,
            admin_count,
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn snapshot(&self) -> BackupSnapshot {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let accounts = self.accounts.list();
        let files = self.files.list_all();

        BackupSnapshot {
            timestamp: timestamp.clone(),
            version: BACKUP_VERSION.to_string(),
            system_config: SystemInfo {
                last_backup: timestamp,
                admin_count: self.admin_count,
                system_version: BACKUP_VERSION.to_string(),
                account_count: accounts.len(),
                file_count: files.len(),
                includes_user_data: self.config.include_user_data,
                includes_files: self.config.include_files,
            },
            user_data: if self.config.include_user_data {
                accounts
            } else {
                Vec::new()
            },
            file_list: if self.config.include_files {
                files.into_iter().map(|f| f.id).collect()
            } else {
                Vec::new()
            },
        }
    }

    /// Prepends `snapshot`, dropping the oldest entries beyond `max_backups`.
    pub fn save(&self, snapshot: BackupSnapshot) -> PortalResult<()> {
        let max = self.config.max_backups;
        self.history.modify(move |history| {
            history.insert(0, snapshot);
            history.truncate(max);
            Ok::<_, PortalError>(())
        })
    }

    /// `snapshot()` + `save()`, or `Ok(None)` when backups are disabled.
    pub fn create_backup(&self) -> PortalResult<Option<BackupSnapshot>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let snapshot = self.snapshot();
        self.save(snapshot.clone())?;
        info!("✅ Backup created: {}", snapshot.timestamp);
        Ok(Some(snapshot))
    }

    /// Newest first.
    pub fn list(&self) -> Vec<BackupSnapshot> {
        self.history.load()
    }

    pub fn get(&self, index: usize) -> PortalResult<BackupSnapshot> {
        self.list()
            .into_iter()
            .nth(index)
            .ok_or_else(|| PortalError::NotFound(format!("Backup #{index}")))
    }

    /// Drops entries beyond `max_backups`, e.g. after the limit was lowered.
    pub fn prune(&self) -> PortalResult<usize> {
        let max = self.config.max_backups;
        let dropped = self.history.modify(move |history| {
            let before = history.len();
            history.truncate(max);
            Ok::<_, PortalError>(before - history.len())
        })?;
        if dropped > 0 {
            info!("🧹 Pruned {} old backups", dropped);
        }
        Ok(dropped)
    }

    /// Restores account data from snapshot `index`, then removes file records
    /// the restored state cannot own: files whose owner no longer exists, and
    /// (when the snapshot captured file lists) files absent from the snapshot.
    ///
    /// What gets replaced follows the flags recorded in the snapshot, not the
    /// current configuration. A snapshot without them leaves accounts and the
    /// file list untouched.
    ///
    /// Snapshots carry file identities only, so content deleted since the
    /// snapshot cannot come back; such ids are reported in `missing_files`.
    /// Uploads must be held off while this runs.
    pub async fn restore(&self, index: usize) -> PortalResult<RestoreReport> {
        let snapshot = self.get(index)?;

        let captured = &snapshot.system_config;
        let accounts_restored = if captured.includes_user_data {
            let count = snapshot.user_data.len();
            self.accounts.replace_all(snapshot.user_data.clone())?;
            count
        } else {
            0
        };

        let owners: HashSet<String> = self.accounts.list().into_iter().map(|a| a.id).collect();
        let listed: HashSet<&str> = snapshot.file_list.iter().map(String::as_str).collect();
        let prune_unlisted = captured.includes_files;

        let removed = self
            .files
            .retain(|f| {
                owners.contains(&f.user_id) && (!prune_unlisted || listed.contains(f.id.as_str()))
            })
            .await?;
        self.files.sweep_orphan_blobs().await?;

        let mut missing_files = Vec::new();
        for id in &snapshot.file_list {
            if self.files.get(id).is_none() || !self.files.has_content(id).await? {
                missing_files.push(id.clone());
            }
        }
        if !missing_files.is_empty() {
            warn!(
                "Restore of {} could not recover {} files",
                snapshot.timestamp,
                missing_files.len()
            );
        }

        let report = RestoreReport {
            timestamp: snapshot.timestamp,
            accounts_restored,
            files_retained: self.files.list_all().len(),
            files_removed: removed.len(),
            missing_files,
        };
        info!(
            "♻️  Restored backup {}: {} accounts, {} files removed",
            report.timestamp, report.accounts_restored, report.files_removed
        );
        Ok(report)
    }

    pub fn export_one(&self, index: usize) -> PortalResult<ExportedBackup> {
        let snapshot = self.get(index)?;
        let document = serde_json::to_string_pretty(&snapshot).map_err(anyhow::Error::from)?;
        let date = snapshot
            .timestamp
            .split('T')
            .next()
            .unwrap_or(snapshot.timestamp.as_str());
        Ok(ExportedBackup {
            file_name: format!("backup-{date}.json"),
            document,
        })
    }

    /// Parses an exported document and prepends it to the history.
    ///
    /// `timestamp` and `version` must be non-empty strings. Other fields default
    /// to empty when absent but must have the right shape when present.
    pub fn import_one(&self, document: &str) -> PortalResult<BackupSnapshot> {
        let value: Value = serde_json::from_str(document)
            .map_err(|e| PortalError::InvalidFormat(format!("not valid JSON: {e}")))?;

        for field in ["timestamp", "version"] {
            let present = value
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty());
            if !present {
                return Err(PortalError::InvalidFormat(format!(
                    "missing required field '{field}'"
                )));
            }
        }

        let snapshot: BackupSnapshot = serde_json::from_value(value)
            .map_err(|e| PortalError::InvalidFormat(e.to_string()))?;
        self.save(snapshot.clone())?;
        info!("📥 Backup imported: {}", snapshot.timestamp);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kv::MemoryStore;
    use crate::models::NewAccount;
    use crate::services::file_service::NewUpload;
    use crate::services::storage::DataUriBlobStorage;
    use bytes::Bytes;
    use chrono::Duration;

    struct Fixture {
        accounts: Arc<AccountStore>,
        files: Arc<FileStore>,
        backups: BackupService,
    }

    fn fixture(config: BackupConfig) -> Fixture {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let accounts = Arc::new(AccountStore::new(kv.clone()));
        let files = Arc::new(FileStore::new(
            kv.clone(),
            Arc::new(DataUriBlobStorage::new(kv.clone())),
        ));
        let backups = BackupService::new(kv, accounts.clone(), files.clone(), config, 1);
        Fixture {
            accounts,
            files,
            backups,
        }
    }

    fn make_account(f: &Fixture, username: &str) -> String {
        f.accounts
            .create(NewAccount {
                username: username.to_string(),
                password: "p".to_string(),
                max_upload_quota_mb: 10.0,
                expires_at: Utc::now() + Duration::hours(1),
                is_active: true,
            })
            .unwrap()
            .id
    }

    async fn make_file(f: &Fixture, owner: &str) -> String {
        f.files
            .upload(NewUpload {
                data: Bytes::from_static(b"content"),
                display_name: "d".to_string(),
                original_name: "d.txt".to_string(),
                content_type: "text/plain".to_string(),
                owner_id: owner.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    fn labelled(label: &str) -> BackupSnapshot {
        BackupSnapshot {
            timestamp: label.to_string(),
            version: BACKUP_VERSION.to_string(),
            user_data: Vec::new(),
            file_list: Vec::new(),
            system_config: SystemInfo::default(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_captures_accounts_and_file_ids() {
        let f = fixture(BackupConfig::default());
        let owner = make_account(&f, "u1");
        let file = make_file(&f, &owner).await;

        let snap = f.backups.snapshot();
        assert_eq!(snap.version, BACKUP_VERSION);
        assert_eq!(snap.user_data.len(), 1);
        assert_eq!(snap.file_list, vec![file]);
        assert_eq!(snap.system_config.account_count, 1);
        assert_eq!(snap.system_config.file_count, 1);
        assert_eq!(snap.system_config.admin_count, 1);
        assert!(snap.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_snapshot_honours_include_flags() {
        let f = fixture(BackupConfig {
            include_user_data: false,
            include_files: false,
            ..BackupConfig::default()
        });
        make_account(&f, "u1");
        let snap = f.backups.snapshot();
        assert!(snap.user_data.is_empty());
        assert!(snap.file_list.is_empty());
        assert_eq!(snap.system_config.account_count, 1);
    }

    #[test]
    fn test_save_caps_history_newest_first() {
        let f = fixture(BackupConfig::default());
        for i in 0..11 {
            f.backups.save(labelled(&format!("snap-{i}"))).unwrap();
        }
        let history = f.backups.list();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].timestamp, "snap-10");
        assert!(history.iter().all(|s| s.timestamp != "snap-0"));
    }

    #[test]
    fn test_disabled_backups_create_nothing() {
        let f = fixture(BackupConfig {
            enabled: false,
            ..BackupConfig::default()
        });
        assert!(f.backups.create_backup().unwrap().is_none());
        assert!(f.backups.list().is_empty());
    }

    #[test]
    fn test_out_of_range_index_is_not_found() {
        let f = fixture(BackupConfig::default());
        assert!(matches!(f.backups.get(0), Err(PortalError::NotFound(_))));
        assert!(matches!(
            f.backups.export_one(3),
            Err(PortalError::NotFound(_))
        ));
    }

    #[test]
    fn test_export_import_round_trip() {
        let f = fixture(BackupConfig::default());
        make_account(&f, "u1");
        let original = f.backups.create_backup().unwrap().unwrap();

        let exported = f.backups.export_one(0).unwrap();
        assert!(exported.document.contains("\n  \"timestamp\""));
        assert_eq!(
            exported.file_name,
            format!("backup-{}.json", &original.timestamp[..10])
        );

        let imported = f.backups.import_one(&exported.document).unwrap();
        assert_eq!(imported.timestamp, original.timestamp);
        assert_eq!(imported.version, original.version);
        assert_eq!(imported.user_data, original.user_data);
        assert_eq!(imported.file_list, original.file_list);
        assert_eq!(f.backups.list().len(), 2);
    }

    #[test]
    fn test_import_requires_timestamp_and_version() {
        let f = fixture(BackupConfig::default());
        for doc in [
            r#"{"version": "1.0.0"}"#,
            r#"{"timestamp": "2024-01-01T00:00:00.000Z"}"#,
            r#"{"timestamp": "", "version": "1.0.0"}"#,
            "not json",
            r#"{"timestamp": "t", "version": "1", "fileList": "oops"}"#,
        ] {
            assert!(
                matches!(f.backups.import_one(doc), Err(PortalError::InvalidFormat(_))),
                "accepted {doc}"
            );
        }
        assert!(f.backups.list().is_empty());

        let minimal = f
            .backups
            .import_one(r#"{"timestamp": "2024-01-01T00:00:00.000Z", "version": "1.0.0"}"#)
            .unwrap();
        assert!(minimal.user_data.is_empty());
    }

    #[tokio::test]
    async fn test_restore_brings_back_accounts_and_drops_orphans() {
        let f = fixture(BackupConfig::default());
        let keep_owner = make_account(&f, "keep");
        let kept_file = make_file(&f, &keep_owner).await;
        f.backups.create_backup().unwrap();

        // Changes after the snapshot.
        let later_owner = make_account(&f, "later");
        make_file(&f, &later_owner).await;
        let extra = make_file(&f, &keep_owner).await;
        f.accounts.delete(&keep_owner).unwrap();

        let report = f.backups.restore(0).await.unwrap();
        assert_eq!(report.accounts_restored, 1);
        assert_eq!(report.files_removed, 3);
        assert!(report.missing_files.is_empty());

        assert!(f.accounts.get_by_id(&keep_owner).is_some());
        assert!(f.accounts.find_by_username("later").is_none());
        let remaining: Vec<_> = f.files.list_all().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![kept_file]);
        assert!(f.files.get(&extra).is_none());
    }

    #[tokio::test]
    async fn test_restore_reports_unrecoverable_files() {
        let f = fixture(BackupConfig::default());
        let owner = make_account(&f, "u1");
        let file = make_file(&f, &owner).await;
        f.backups.create_backup().unwrap();
        f.files.delete(&file).await.unwrap();

        let report = f.backups.restore(0).await.unwrap();
        assert_eq!(report.missing_files, vec![file]);
    }

    #[tokio::test]
    async fn test_restore_out_of_range() {
        let f = fixture(BackupConfig::default());
        assert!(matches!(
            f.backups.restore(0).await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[test]
    fn test_prune_after_limit_lowered() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let accounts = Arc::new(AccountStore::new(kv.clone()));
        let files = Arc::new(FileStore::new(
            kv.clone(),
            Arc::new(DataUriBlobStorage::new(kv.clone())),
        ));
        let wide = BackupService::new(
            kv.clone(),
            accounts.clone(),
            files.clone(),
            BackupConfig::default(),
            0,
        );
        for i in 0..6 {
            wide.save(labelled(&i.to_string())).unwrap();
        }

        let narrow = BackupService::new(
            kv,
            accounts,
            files,
            BackupConfig {
                max_backups: 4,
                ..BackupConfig::default()
            },
            0,
        );
        assert_eq!(narrow.prune().unwrap(), 2);
        assert_eq!(narrow.list().len(), 4);
        assert_eq!(narrow.list()[0].timestamp, "5");
    }

    #[test]
    fn test_import_into_full_history_drops_oldest() {
        let f = fixture(BackupConfig::default());
        for i in 0..10 {
            f.backups.save(labelled(&format!("snap-{i}"))).unwrap();
        }

        f.backups
            .import_one(r#"{"timestamp": "imported", "version": "1.0.0"}"#)
            .unwrap();

        let history = f.backups.list();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].timestamp, "imported");
        assert_eq!(history[1].timestamp, "snap-9");
        assert!(history.iter().all(|s| s.timestamp != "snap-0"));
    }

    #[test]
    fn test_zero_history_limit_keeps_newest() {
        let f = fixture(BackupConfig {
            max_backups: 0,
            ..BackupConfig::default()
        });
        assert_eq!(f.backups.config().max_backups, 1);

        let created = f.backups.create_backup().unwrap().unwrap();
        assert_eq!(f.backups.get(0).unwrap(), created);

        f.backups
            .import_one(r#"{"timestamp": "imported", "version": "1.0.0"}"#)
            .unwrap();
        let history = f.backups.list();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp, "imported");
    }

    #[tokio::test]
    async fn test_restore_of_minimal_document_changes_nothing() {
        let f = fixture(BackupConfig::default());
        let owner = make_account(&f, "u1");
        let file = make_file(&f, &owner).await;
        f.backups
            .import_one(r#"{"timestamp": "2024-01-01T00:00:00.000Z", "version": "1.0.0"}"#)
            .unwrap();

        let report = f.backups.restore(0).await.unwrap();
        assert_eq!(report.accounts_restored, 0);
        assert_eq!(report.files_removed, 0);
        assert!(f.accounts.get_by_id(&owner).is_some());
        assert!(f.files.get(&file).is_some());
        assert!(f.files.has_content(&file).await.unwrap());
    }

    #[test]
    fn test_snapshot_records_capture_flags() {
        let full = fixture(BackupConfig::default()).backups.snapshot();
        assert!(full.system_config.includes_user_data);
        assert!(full.system_config.includes_files);

        let partial = fixture(BackupConfig {
            include_files: false,
            ..BackupConfig::default()
        })
        .backups
        .snapshot();
        assert!(partial.system_config.includes_user_data);
        assert!(!partial.system_config.includes_files);

        let exported = serde_json::to_value(&full).unwrap();
        assert_eq!(exported["systemConfig"]["includesUserData"], true);
    }
}
