use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A temporary account: credentials, an upload quota and an expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password: String,
    pub max_upload_quota_mb: f64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Active and not yet expired at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }
}

/// Fields supplied by the creator of an account; the store assigns the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub max_upload_quota_mb: f64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_upload_quota_mb: Option<f64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl AccountPatch {
    pub fn apply(self, account: &mut Account) {
        if let Some(username) = self.username {
            account.username = username;
        }
        if let Some(password) = self.password {
            account.password = password;
        }
        if let Some(quota) = self.max_upload_quota_mb {
            account.max_upload_quota_mb = quota;
        }
        if let Some(expires_at) = self.expires_at {
            account.expires_at = expires_at;
        }
        if let Some(is_active) = self.is_active {
            account.is_active = is_active;
        }
    }
}

/// Metadata of one uploaded file. The bytes live in blob storage under `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    /// Stored name, `<id>_<original name>`.
    pub file_name: String,
    pub display_name: String,
    pub file_size_mb: f64,
    pub uploaded_at: DateTime<Utc>,
    /// Owning account id.
    pub user_id: String,
    pub file_url: String,
    pub file_type: String,
    pub original_name: String,
}

/// Small bookkeeping object embedded in every snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    pub last_backup: String,
    pub admin_count: usize,
    pub system_version: String,
    pub account_count: usize,
    pub file_count: usize,
    /// `userData` holds the full account list. Absent in older documents.
    pub includes_user_data: bool,
    /// `fileList` holds every file identity. Absent in older documents.
    pub includes_files: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub timestamp: String,
    pub version: String,
    #[serde(default)]
    pub user_data: Vec<Account>,
    #[serde(default)]
    pub file_list: Vec<String>,
    #[serde(default)]
    pub system_config: SystemInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub used_mb: f64,
    pub total_mb: f64,
    /// Raw remaining space; negative when the quota was lowered below usage.
    pub remaining_mb: f64,
    /// `remaining_mb` floored at zero, for display.
    pub display_remaining_mb: f64,
    pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub timestamp: String,
    pub accounts_restored: usize,
    pub files_retained: usize,
    pub files_removed: usize,
    /// Identities listed in the snapshot whose metadata or bytes no longer exist.
    pub missing_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportedBackup {
    pub file_name: String,
    pub document: String,
}

/// Administrator input for a new account. Missing quota and expiry fall back
/// to the configured defaults.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(range(exclusive_min = 0.0, message = "Quota must be positive"))]
    pub max_upload_quota_mb: Option<f64>,
    #[validate(range(min = 1, message = "Expiry must be at least one hour"))]
    pub expires_in_hours: Option<i64>,
    pub is_active: Option<bool>,
}

/// Administrator edit of an account. `expiresInHours` is counted from now and
/// wins over `expiresAt` when both are given.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "Quota must be positive"))]
    pub max_upload_quota_mb: Option<f64>,
    #[validate(range(min = 1, message = "Expiry must be at least one hour"))]
    pub expires_in_hours: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// An account as its owner sees it: no password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub username: String,
    pub max_upload_quota_mb: f64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            max_upload_quota_mb: account.max_upload_quota_mb,
            expires_at: account.expires_at,
            is_active: account.is_active,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverview {
    pub account: AccountProfile,
    pub usage: QuotaUsage,
    pub files: Vec<FileRecord>,
}

/// Store-wide counters for the health endpoint and the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub account_count: usize,
    pub active_account_count: usize,
    pub file_count: usize,
    pub total_storage_mb: f64,
    pub backup_count: usize,
    pub last_backup: Option<String>,
}
