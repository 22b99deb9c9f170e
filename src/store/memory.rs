//! In-memory account store loaded from TOML.
//!
//! ```toml
//! [[accounts]]
//! id = 1
//! name = "tester"
//! password = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3"
//! premdays = 30
//!
//! [[accounts.characters]]
//! name = "Knight Tester"
//! world_id = 0
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tracing::{info, instrument};

use super::{Account, AccountStore, Character};
use crate::error::{ProtocolError, Result};

#[derive(Debug, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    #[serde(flatten)]
    account: Account,
    #[serde(default)]
    characters: Vec<Character>,
}

/// Accounts and characters held in hash maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: HashMap<u32, Account>,
    ids_by_name: HashMap<String, u32>,
    characters: HashMap<u32, Vec<Character>>,
    online: HashMap<u8, u32>,
    lookups: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemoryStore::insert`]
    pub fn with_account(mut self, account: Account, characters: Vec<Character>) -> Self {
        self.insert(account, characters);
        self
    }

    /// Add or replace an account and its characters
    pub fn insert(&mut self, account: Account, characters: Vec<Character>) {
        if let Some(previous) = self.accounts.get(&account.id) {
            self.ids_by_name.remove(&previous.name);
        }
        self.ids_by_name.insert(account.name.clone(), account.id);
        self.characters.insert(account.id, characters);
        self.accounts.insert(account.id, account);
    }

    /// Set the online player count reported for a world
    pub fn set_online(&mut self, world_id: u8, players: u32) {
        self.online.insert(world_id, players);
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: AccountsFile = toml::from_str(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse accounts: {e}")))?;

        let mut store = Self::new();
        for entry in file.accounts {
            if store.accounts.contains_key(&entry.account.id) {
                return Err(ProtocolError::ConfigError(format!(
                    "Duplicate account id {} in accounts file",
                    entry.account.id
                )));
            }
            store.insert(entry.account, entry.characters);
        }
        Ok(store)
    }

    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Failed to read accounts file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let store = Self::from_toml(&content)?;
        info!(accounts = store.len(), "Accounts loaded");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Number of store calls served so far
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }
}

impl AccountStore for MemoryStore {
    async fn load_account_by_id(&self, id: u32) -> Result<Option<Account>> {
        self.touch();
        Ok(self.accounts.get(&id).cloned())
    }

    async fn load_account_by_name(&self, name: &str) -> Result<Option<Account>> {
        self.touch();
        Ok(self
            .ids_by_name
            .get(name)
            .and_then(|id| self.accounts.get(id))
            .cloned())
    }

    async fn load_characters_by_account_id(&self, account_id: u32) -> Result<Vec<Character>> {
        self.touch();
        Ok(self
            .characters
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_online_players(&self, world_id: u8) -> Result<u32> {
        Ok(self.online.get(&world_id).copied().unwrap_or(0))
    }
}
