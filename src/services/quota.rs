use crate::error::{PortalError, PortalResult};
use crate::models::{Account, QuotaUsage};
use crate::services::accounts::AccountStore;
use crate::services::file_service::FileStore;
use std::sync::Arc;

/// Absorbs float noise when summing fractional megabytes.
const EPSILON_MB: f64 = 1e-9;

/// Derives quota figures from the stores on every call; nothing is cached.
pub struct QuotaAccountant {
    accounts: Arc<AccountStore>,
    files: Arc<FileStore>,
}

impl QuotaAccountant {
    pub fn new(accounts: Arc<AccountStore>, files: Arc<FileStore>) -> Self {
        Self { accounts, files }
    }

    pub fn used_mb(&self, owner_id: &str) -> f64 {
        self.files
            .list_by_owner(owner_id)
            .iter()
            .map(|f| f.file_size_mb)
            .sum()
    }

    /// Raw remaining space. Negative when the quota was lowered below usage.
    pub fn remaining_mb(&self, owner_id: &str) -> PortalResult<f64> {
        let account = self.account(owner_id)?;
        Ok(account.max_upload_quota_mb - self.used_mb(owner_id))
    }

    pub fn usage(&self, owner_id: &str) -> PortalResult<QuotaUsage> {
        let account = self.account(owner_id)?;
        Ok(self.usage_for(&account))
    }

    pub fn usage_for(&self, account: &Account) -> QuotaUsage {
        let files = self.files.list_by_owner(&account.id);
        let used_mb: f64 = files.iter().map(|f| f.file_size_mb).sum();
        let remaining_mb = account.max_upload_quota_mb - used_mb;
        QuotaUsage {
            used_mb,
            total_mb: account.max_upload_quota_mb,
            remaining_mb,
            display_remaining_mb: remaining_mb.max(0.0),
            file_count: files.len(),
        }
    }

    /// Rejects a candidate upload that would push usage above the quota,
    /// judged against usage before the upload.
    pub fn check_upload(&self, account: &Account, candidate_mb: f64) -> PortalResult<()> {
        let used_mb = self.used_mb(&account.id);
        if used_mb + candidate_mb > account.max_upload_quota_mb + EPSILON_MB {
            return Err(PortalError::QuotaExceeded {
                requested_mb: candidate_mb,
                remaining_mb: (account.max_upload_quota_mb - used_mb).max(0.0),
            });
        }
        Ok(())
    }

    fn account(&self, owner_id: &str) -> PortalResult<Account> {
        self.accounts
            .get_by_id(owner_id)
            .ok_or_else(|| PortalError::NotFound(format!("Account {owner_id}")))
    }
}
