use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A server + username pair; `name()` is the partition key used by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user: String,
    pub server: String,
}

impl Account {
    pub fn new(user: &str, server: &str) -> Self {
        Self {
            user: user.to_string(),
            server: server.to_string(),
        }
    }

    pub fn name(&self) -> String {
        format!("{}@{}", self.user, self.server)
    }
}

pub trait AccountProvider: Send + Sync {
    fn current_account(&self) -> Option<Account>;
}

/// Holds the active identity set by the host application.
pub struct StaticAccountProvider {
    current: RwLock<Option<Account>>,
}

impl StaticAccountProvider {
    pub fn new(account: Option<Account>) -> Self {
        Self {
            current: RwLock::new(account),
        }
    }

    pub fn set(&self, account: Option<Account>) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = account;
    }
}

impl AccountProvider for StaticAccountProvider {
    fn current_account(&self) -> Option<Account> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
