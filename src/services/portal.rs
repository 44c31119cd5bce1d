use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};
use crate::infrastructure::kv::KeyValueStore;
use crate::models::{
    Account, AccountOverview, AccountPatch, AccountProfile, BackupSnapshot, CreateAccountRequest,
    ExportedBackup, FileRecord, NewAccount, RestoreReport, SystemStatus, UpdateAccountRequest,
};
use crate::services::accounts::AccountStore;
use crate::services::auth::Authenticator;
use crate::services::backup::BackupService;
use crate::services::file_service::{FileStore, NewUpload};
use crate::services::quota::QuotaAccountant;
use crate::services::storage::{Blob, BlobStorage, DataUriBlobStorage};
use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::validation::{UploadRules, validate_upload};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use validator::Validate;

/// Who is asking for a file.
#[derive(Debug, Clone, Copy)]
pub enum Requester<'a> {
    Account(&'a str),
    Admin,
}

/// A raw upload as it arrives from a client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub display_name: String,
    pub original_name: String,
    pub declared_type: Option<String>,
    pub data: Bytes,
}

/// Entry point for everything a client can do. Wires the stores together and
/// owns the rules that span them: validation, quota pre-checks, cascade deletes.
///
/// Work on one owner's files runs under that owner's lock. Restore takes the
/// `maintenance` lock exclusively; every other mutation shares it.
pub struct PortalService {
    config: PortalConfig,
    accounts: Arc<AccountStore>,
    files: Arc<FileStore>,
    quota: QuotaAccountant,
    auth: Authenticator,
    backups: Arc<BackupService>,
    rules: UploadRules,
    owner_locks: KeyedMutex,
    maintenance: RwLock<()>,
}

impl PortalService {
    pub fn new(config: PortalConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let blobs = Arc::new(DataUriBlobStorage::new(store.clone()));
        Self::with_blob_storage(config, store, blobs)
    }

    pub fn with_blob_storage(
        config: PortalConfig,
        store: Arc<dyn KeyValueStore>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Self {
        let accounts = Arc::new(AccountStore::new(store.clone()));
        let files = Arc::new(FileStore::new(store.clone(), blobs));
        let auth = Authenticator::new(accounts.clone(), config.admin_credentials.clone());
        let backups = Arc::new(BackupService::new(
            store,
            accounts.clone(),
            files.clone(),
            config.backup.clone(),
            auth.admin_count(),
        ));

        Self {
            quota: QuotaAccountant::new(accounts.clone(), files.clone()),
            rules: UploadRules::from_config(&config),
            owner_locks: KeyedMutex::new(),
            maintenance: RwLock::new(()),
            config,
            accounts,
            files,
            auth,
            backups,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn quota(&self) -> &QuotaAccountant {
        &self.quota
    }

    pub fn backups(&self) -> Arc<BackupService> {
        self.backups.clone()
    }

    // ---- sessions ----

    pub fn login_account(&self, username: &str, password: &str) -> PortalResult<Account> {
        self.auth.login_account(username, password)
    }

    pub fn login_administrator(&self, username: &str, password: &str) -> PortalResult<()> {
        self.auth.login_administrator(username, password)
    }

    pub fn is_administrator(&self, username: &str) -> bool {
        self.auth.is_administrator(username)
    }

    /// The account behind a session, if it may still act.
    pub fn session_account(&self, account_id: &str) -> PortalResult<Account> {
        self.accounts
            .get_by_id(account_id)
            .filter(Account::is_usable)
            .ok_or(PortalError::InvalidCredentials)
    }

    // ---- accounts ----

    pub fn create_account(&self, request: CreateAccountRequest) -> PortalResult<Account> {
        request
            .validate()
            .map_err(|e| PortalError::Validation(e.to_string()))?;

        let quota = request
            .max_upload_quota_mb
            .unwrap_or(self.config.default_quota_mb);
        self.check_quota_limit(quota)?;
        let hours = request
            .expires_in_hours
            .unwrap_or(self.config.default_expiry_hours);
        self.check_expiry_limit(hours)?;

        if self.accounts.find_by_username(&request.username).is_some() {
            return Err(PortalError::DuplicateUsername(request.username));
        }

        self.accounts.create(NewAccount {
            username: request.username,
            password: request.password,
            max_upload_quota_mb: quota,
            expires_at: Utc::now() + Duration::hours(hours),
            is_active: request.is_active.unwrap_or(true),
        })
    }

    pub fn list_accounts(&self) -> Vec<Account> {
        self.accounts.list()
    }

    pub fn get_account(&self, id: &str) -> PortalResult<Account> {
        self.accounts
            .get_by_id(id)
            .ok_or_else(|| PortalError::NotFound(format!("Account {id}")))
    }

    pub fn update_account(&self, id: &str, request: UpdateAccountRequest) -> PortalResult<Account> {
        request
            .validate()
            .map_err(|e| PortalError::Validation(e.to_string()))?;
        if let Some(quota) = request.max_upload_quota_mb {
            self.check_quota_limit(quota)?;
        }
        let expires_at = match request.expires_in_hours {
            Some(hours) => {
                self.check_expiry_limit(hours)?;
                Some(Utc::now() + Duration::hours(hours))
            }
            None => match request.expires_at {
                Some(at) => {
                    self.check_expiry_date(at)?;
                    Some(at)
                }
                None => None,
            },
        };

        let patch = AccountPatch {
            username: request.username,
            password: request.password,
            max_upload_quota_mb: request.max_upload_quota_mb,
            expires_at,
            is_active: request.is_active,
        };
        let updated = self
            .accounts
            .update(id, patch)?
            .ok_or_else(|| PortalError::NotFound(format!("Account {id}")))?;
        info!("✏️  Account updated: {}", updated.username);
        Ok(updated)
    }

    /// Deletes the owner's files, then the account. Returns the removed file ids.
    pub async fn delete_account(&self, id: &str) -> PortalResult<Vec<String>> {
        let _shared = self.maintenance.read().await;
        let removed = {
            let _owner = self.owner_locks.lock(id).await;
            let account = self.get_account(id)?;
            let removed = self.files.delete_by_owner(id).await?;
            self.accounts.delete(id)?;
            info!(
                "🗑️  Account deleted: {} ({} files removed)",
                account.username,
                removed.len()
            );
            removed
        };
        self.owner_locks.forget(id);
        Ok(removed)
    }

    pub fn account_overview(&self, account: &Account) -> AccountOverview {
        AccountOverview {
            account: AccountProfile::from(account),
            usage: self.quota.usage_for(account),
            files: self.files.list_by_owner(&account.id),
        }
    }

    // ---- files ----

    /// Validates the upload, checks the owner's remaining quota against usage
    /// before the upload, and stores it. Nothing is written when a check fails.
    pub async fn upload(&self, owner_id: &str, request: UploadRequest) -> PortalResult<FileRecord> {
        let checked = validate_upload(
            &self.rules,
            &request.display_name,
            &request.original_name,
            request.declared_type.as_deref(),
            &request.data,
        )?;

        let _shared = self.maintenance.read().await;
        let _owner = self.owner_locks.lock(owner_id).await;

        let account = self.session_account(owner_id)?;
        let upload = NewUpload {
            data: request.data,
            display_name: checked.display_name,
            original_name: checked.original_name,
            content_type: checked.content_type,
            owner_id: account.id.clone(),
        };
        self.quota.check_upload(&account, upload.size_mb())?;
        self.files.upload(upload).await
    }

    pub fn list_files(&self, owner_id: &str) -> Vec<FileRecord> {
        self.files.list_by_owner(owner_id)
    }

    pub fn list_all_files(&self) -> Vec<FileRecord> {
        self.files.list_all()
    }

    /// Accounts only see their own files; anything else is `NotFound`.
    pub async fn download(
        &self,
        requester: Requester<'_>,
        file_id: &str,
    ) -> PortalResult<(FileRecord, Blob)> {
        let not_found = || PortalError::NotFound(format!("File {file_id}"));
        let record = self.files.get(file_id).ok_or_else(not_found)?;
        if let Requester::Account(owner) = requester {
            if record.user_id != owner {
                return Err(not_found());
            }
        }
        self.files.download(file_id).await?.ok_or_else(not_found)
    }

    pub async fn delete_file(&self, requester: Requester<'_>, file_id: &str) -> PortalResult<()> {
        let not_found = || PortalError::NotFound(format!("File {file_id}"));
        let record = self.files.get(file_id).ok_or_else(not_found)?;
        if let Requester::Account(owner) = requester {
            if record.user_id != owner {
                return Err(not_found());
            }
        }

        let _shared = self.maintenance.read().await;
        let _owner = self.owner_locks.lock(&record.user_id).await;
        self.files.delete(file_id).await
    }

    // ---- backups ----

    pub fn list_backups(&self) -> Vec<BackupSnapshot> {
        self.backups.list()
    }

    /// `Ok(None)` when backups are disabled.
    pub async fn create_backup(&self) -> PortalResult<Option<BackupSnapshot>> {
        let _shared = self.maintenance.read().await;
        self.backups.create_backup()
    }

    /// Drops snapshots beyond the configured history size.
    pub async fn prune_backups(&self) -> PortalResult<usize> {
        let _shared = self.maintenance.read().await;
        self.backups.prune()
    }

    pub async fn restore_backup(&self, index: usize) -> PortalResult<RestoreReport> {
        let _exclusive = self.maintenance.write().await;
        let report = self.backups.restore(index).await?;
        self.owner_locks.cleanup();
        Ok(report)
    }

    pub fn export_backup(&self, index: usize) -> PortalResult<ExportedBackup> {
        self.backups.export_one(index)
    }

    pub fn import_backup(&self, document: &str) -> PortalResult<BackupSnapshot> {
        self.backups.import_one(document)
    }

    // ---- system ----

    pub fn status(&self) -> SystemStatus {
        let accounts = self.accounts.list();
        let files = self.files.list_all();
        let backups = self.backups.list();
        let now = Utc::now();

        SystemStatus {
            account_count: accounts.len(),
            active_account_count: accounts.iter().filter(|a| a.is_usable_at(now)).count(),
            file_count: files.len(),
            total_storage_mb: files.iter().map(|f| f.file_size_mb).sum(),
            backup_count: backups.len(),
            last_backup: backups.first().map(|b| b.timestamp.clone()),
        }
    }

    fn check_quota_limit(&self, quota_mb: f64) -> PortalResult<()> {
        if !(quota_mb > 0.0 && quota_mb <= self.config.max_quota_mb) {
            return Err(PortalError::Validation(format!(
                "Quota must be between 0 and {} MB",
                self.config.max_quota_mb
            )));
        }
        Ok(())
    }

    fn check_expiry_limit(&self, hours: i64) -> PortalResult<()> {
        if !(1..=self.config.max_expiry_hours).contains(&hours) {
            return Err(PortalError::Validation(format!(
                "Expiry must be between 1 and {} hours",
                self.config.max_expiry_hours
            )));
        }
        Ok(())
    }

    /// An explicit expiry obeys the same window as `expires_in_hours`.
    fn check_expiry_date(&self, at: DateTime<Utc>) -> PortalResult<()> {
        let now = Utc::now();
        if at <= now || at > now + Duration::hours(self.config.max_expiry_hours) {
            return Err(PortalError::Validation(format!(
                "Expiry must be in the future and within {} hours",
                self.config.max_expiry_hours
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kv::MemoryStore;
    use crate::services::file_service::BYTES_PER_MB;

    fn portal() -> PortalService {
        PortalService::new(PortalConfig::development(), Arc::new(MemoryStore::new()))
    }

    fn create(username: &str) -> CreateAccountRequest {
        CreateAccountRequest {
            username: username.to_string(),
            password: "p1".to_string(),
            max_upload_quota_mb: Some(10.0),
            expires_in_hours: Some(24),
            is_active: None,
        }
    }

    fn text(mb: f64) -> UploadRequest {
        UploadRequest {
            display_name: "Notes".to_string(),
            original_name: "notes.txt".to_string(),
            declared_type: Some("text/plain".to_string()),
            data: Bytes::from(vec![b'a'; (mb * BYTES_PER_MB) as usize]),
        }
    }

    #[test]
    fn test_create_applies_defaults_and_limits() {
        let portal = portal();
        let account = portal
            .create_account(CreateAccountRequest {
                max_upload_quota_mb: None,
                expires_in_hours: None,
                ..create("u1")
            })
            .unwrap();
        assert_eq!(account.max_upload_quota_mb, 50.0);
        assert!(account.is_active);
        let hours = (account.expires_at - account.created_at).num_hours();
        assert!((23..=24).contains(&hours));

        let too_big = portal.create_account(CreateAccountRequest {
            max_upload_quota_mb: Some(10_000.0),
            ..create("u2")
        });
        assert!(matches!(too_big, Err(PortalError::Validation(_))));

        let too_long = portal.create_account(CreateAccountRequest {
            expires_in_hours: Some(10_000),
            ..create("u3")
        });
        assert!(matches!(too_long, Err(PortalError::Validation(_))));

        assert!(matches!(
            portal.create_account(create("u1")),
            Err(PortalError::DuplicateUsername(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_rejected_before_any_write() {
        let portal = portal();
        let account = portal.create_account(create("u1")).unwrap();

        portal.upload(&account.id, text(8.0)).await.unwrap();
        let err = portal.upload(&account.id, text(5.0)).await.unwrap_err();
        assert!(matches!(err, PortalError::QuotaExceeded { .. }));
        assert_eq!(portal.list_files(&account.id).len(), 1);
        assert_eq!(portal.quota().used_mb(&account.id), 8.0);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_cannot_overshoot() {
        let portal = Arc::new(portal());
        let account = portal.create_account(create("u1")).unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let portal = portal.clone();
            let id = account.id.clone();
            handles.push(tokio::spawn(async move {
                portal.upload(&id, text(3.0)).await
            }));
        }
        let mut stored = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                stored += 1;
            }
        }
        assert_eq!(stored, 3);
        assert!(portal.quota().used_mb(&account.id) <= 10.0);
    }

    #[tokio::test]
    async fn test_inactive_owner_cannot_upload() {
        let portal = portal();
        let account = portal.create_account(create("u1")).unwrap();
        portal
            .update_account(
                &account.id,
                UpdateAccountRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(
            portal.upload(&account.id, text(1.0)).await,
            Err(PortalError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_accounts_cannot_touch_foreign_files() {
        let portal = portal();
        let a = portal.create_account(create("a")).unwrap();
        let b = portal.create_account(create("b")).unwrap();
        let file = portal.upload(&a.id, text(0.5)).await.unwrap();

        assert!(matches!(
            portal.download(Requester::Account(&b.id), &file.id).await,
            Err(PortalError::NotFound(_))
        ));
        assert!(matches!(
            portal.delete_file(Requester::Account(&b.id), &file.id).await,
            Err(PortalError::NotFound(_))
        ));

        let (_, blob) = portal.download(Requester::Admin, &file.id).await.unwrap();
        assert_eq!(blob.data.len(), (0.5 * BYTES_PER_MB) as usize);
        portal
            .delete_file(Requester::Account(&a.id), &file.id)
            .await
            .unwrap();
        assert!(portal.list_all_files().is_empty());
    }

    #[tokio::test]
    async fn test_update_with_expiry_hours() {
        let portal = portal();
        let account = portal.create_account(create("u1")).unwrap();
        let updated = portal
            .update_account(
                &account.id,
                UpdateAccountRequest {
                    expires_in_hours: Some(48),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.expires_at > account.expires_at);
        assert!(matches!(
            portal.update_account("ghost", UpdateAccountRequest::default()),
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_status_counts() {
        let portal = portal();
        let a = portal.create_account(create("a")).unwrap();
        portal.upload(&a.id, text(1.0)).await.unwrap();
        portal.create_backup().await.unwrap();

        let status = portal.status();
        assert_eq!(status.account_count, 1);
        assert_eq!(status.active_account_count, 1);
        assert_eq!(status.file_count, 1);
        assert_eq!(status.total_storage_mb, 1.0);
        assert_eq!(status.backup_count, 1);
        assert!(status.last_backup.is_some());
    }

    #[test]
    fn test_update_rejects_expiry_outside_window() {
        let portal = portal();
        let account = portal.create_account(create("u1")).unwrap();
        let max = portal.config().max_expiry_hours;

        for at in [
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::hours(max + 1),
        ] {
            assert!(matches!(
                portal.update_account(
                    &account.id,
                    UpdateAccountRequest {
                        expires_at: Some(at),
                        ..Default::default()
                    },
                ),
                Err(PortalError::Validation(_))
            ));
        }
        assert_eq!(
            portal.get_account(&account.id).unwrap().expires_at,
            account.expires_at
        );

        let within = Utc::now() + Duration::hours(2);
        let updated = portal
            .update_account(
                &account.id,
                UpdateAccountRequest {
                    expires_at: Some(within),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.expires_at, within);
    }

    #[tokio::test]
    async fn test_restoring_minimal_import_keeps_accounts_and_files() {
        let portal = portal();
        let account = portal.create_account(create("u1")).unwrap();
        let file = portal.upload(&account.id, text(0.1)).await.unwrap();

        portal
            .import_backup(r#"{"timestamp": "2024-01-01T00:00:00.000Z", "version": "1.0.0"}"#)
            .unwrap();
        let report = portal.restore_backup(0).await.unwrap();

        assert_eq!(report.accounts_restored, 0);
        assert_eq!(report.files_removed, 0);
        assert!(portal.get_account(&account.id).is_ok());
        assert_eq!(portal.list_files(&account.id)[0].id, file.id);
        assert!(portal.files().has_content(&file.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_follows_snapshot_flags_not_config() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let partial = PortalConfig {
            backup: crate::config::BackupConfig {
                include_user_data: false,
                include_files: false,
                ..Default::default()
            },
            ..PortalConfig::development()
        };
        let account = {
            let portal = PortalService::new(partial, store.clone());
            let account = portal.create_account(create("u1")).unwrap();
            portal.upload(&account.id, text(0.1)).await.unwrap();
            portal.create_backup().await.unwrap();
            account
        };

        // Same data, now served with full capture switched on.
        let portal = PortalService::new(PortalConfig::development(), store);
        let report = portal.restore_backup(0).await.unwrap();
        assert_eq!(report.files_removed, 0);
        assert!(portal.get_account(&account.id).is_ok());
        assert_eq!(portal.list_files(&account.id).len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_backup_waits_for_restore() {
        let portal = Arc::new(portal());
        let exclusive = portal.maintenance.write().await;
        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(
            crate::services::worker::BackupScheduler::new(
                portal.clone(),
                std::time::Duration::from_millis(20),
                rx,
            )
            .run(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(portal.list_backups().is_empty());

        drop(exclusive);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(!portal.list_backups().is_empty());
    }
}
