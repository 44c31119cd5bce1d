use crate::config::AdminCredential;
use crate::error::{PortalError, PortalResult};
use crate::models::Account;
use crate::services::accounts::AccountStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Two independent, stateless login paths: temporary accounts and administrators.
pub struct Authenticator {
    accounts: Arc<AccountStore>,
    admins: Vec<AdminCredential>,
}

impl Authenticator {
    pub fn new(accounts: Arc<AccountStore>, admins: Vec<AdminCredential>) -> Self {
        Self { accounts, admins }
    }

    /// The caller only learns that login failed, never which check failed.
    pub fn login_account(&self, username: &str, password: &str) -> PortalResult<Account> {
        match self.accounts.authenticate(username, password) {
            Some(account) => {
                info!("🔑 Account login: {}", account.username);
                Ok(account)
            }
            None => {
                warn!("Rejected account login for '{}'", username);
                Err(PortalError::InvalidCredentials)
            }
        }
    }

    /// Administrators never expire. Slots with a missing username or password
    /// match nothing.
    pub fn authenticate_administrator(&self, username: &str, password: &str) -> bool {
        self.admins.iter().any(|admin| {
            admin.username.as_deref() == Some(username)
                && admin.password.as_deref() == Some(password)
        })
    }

    pub fn login_administrator(&self, username: &str, password: &str) -> PortalResult<()> {
        if self.authenticate_administrator(username, password) {
            info!("🛡️  Administrator login: {}", username);
            Ok(())
        } else {
            warn!("Rejected administrator login for '{}'", username);
            Err(PortalError::InvalidCredentials)
        }
    }

    /// Whether `username` still names a usable administrator slot.
    pub fn is_administrator(&self, username: &str) -> bool {
        self.admins
            .iter()
            .any(|admin| admin.username.as_deref() == Some(username) && admin.password.is_some())
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }
}
