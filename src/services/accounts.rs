use crate::error::{PortalError, PortalResult};
use crate::infrastructure::kv::KeyValueStore;
use crate::models::{Account, AccountPatch, NewAccount};
use crate::services::collection::JsonCollection;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const ACCOUNTS_KEY: &str = "temporary_accounts";

pub struct AccountStore {
    accounts: JsonCollection<Account>,
}

impl AccountStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            accounts: JsonCollection::new(store, ACCOUNTS_KEY),
        }
    }

    /// Appends a new account. Usernames are unique; a clash is `DuplicateUsername`.
    pub fn create(&self, data: NewAccount) -> PortalResult<Account> {
        let account = self.accounts.modify(|accounts| {
            if accounts.iter().any(|a| a.username == data.username) {
                return Err(PortalError::DuplicateUsername(data.username.clone()));
            }
            let account = Account {
                id: Uuid::new_v4().to_string(),
                username: data.username,
                password: data.password,
                max_upload_quota_mb: data.max_upload_quota_mb,
                expires_at: data.expires_at,
                is_active: data.is_active,
                created_at: Utc::now(),
            };
            accounts.push(account.clone());
            Ok(account)
        })?;

        info!("👤 Account created: {} ({})", account.username, account.id);
        Ok(account)
    }

    /// All accounts in insertion order.
    pub fn list(&self) -> Vec<Account> {
        self.accounts.load()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Account> {
        self.list().into_iter().find(|a| a.id == id)
    }

    pub fn find_by_username(&self, username: &str) -> Option<Account> {
        self.list().into_iter().find(|a| a.username == username)
    }

    /// Shallow-merges `patch` into the account. `Ok(None)` when `id` is unknown.
    pub fn update(&self, id: &str, patch: AccountPatch) -> PortalResult<Option<Account>> {
        self.accounts.modify(|accounts| {
            if let Some(username) = &patch.username {
                if accounts.iter().any(|a| a.id != id && &a.username == username) {
                    return Err(PortalError::DuplicateUsername(username.clone()));
                }
            }
            let Some(account) = accounts.iter_mut().find(|a| a.id == id) else {
                return Ok(None);
            };
            patch.apply(account);
            Ok(Some(account.clone()))
        })
    }

    /// Removes the record only. Owned files must be deleted by the caller first.
    pub fn delete(&self, id: &str) -> PortalResult<()> {
        self.accounts.modify(|accounts| {
            accounts.retain(|a| a.id != id);
            Ok::<_, PortalError>(())
        })
    }

    /// Exact credential match on an active, unexpired account.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Account> {
        let now = Utc::now();
        self.list()
            .into_iter()
            .find(|a| a.username == username && a.password == password)
            .filter(|a| a.is_usable_at(now))
    }

    /// Overwrites the whole account list, used when restoring a snapshot.
    pub fn replace_all(&self, accounts: Vec<Account>) -> PortalResult<()> {
        self.accounts.modify(move |current| {
            *current = accounts;
            Ok::<_, PortalError>(())
        })
    }
}
