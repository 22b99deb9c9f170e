//! # Account Store
//!
//! Interface to the account and character database. The gateway only reads
//! from it; every call may suspend and may fail, and a failure ends the
//! connection that triggered it.
//!
//! [`MemoryStore`] is a complete implementation backed by a TOML file, used by
//! the bundled binary and by tests.

pub mod memory;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryStore;

/// An account row as the gateway needs it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u32,
    pub name: String,
    /// Stored password hash, in the configured algorithm
    pub password: String,
    #[serde(default)]
    pub premdays: u32,
    /// Base32 two-factor secret, when enabled
    #[serde(default)]
    pub secret: Option<String>,
}

impl Account {
    /// Whether logins must carry a valid two-factor token
    pub fn requires_token(&self) -> bool {
        self.secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("premdays", &self.premdays)
            .field("two_factor", &self.requires_token())
            .finish_non_exhaustive()
    }
}

/// A character listed at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub world_id: u8,
}

/// Read access to accounts and characters.
///
/// Futures must be `Send` so connection tasks can be spawned on the runtime.
pub trait AccountStore: Send + Sync + 'static {
    /// Account by numeric id (clients below 840)
    fn load_account_by_id(&self, id: u32) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// Account by name (clients from 840)
    fn load_account_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// Characters of an account, in display order
    fn load_characters_by_account_id(
        &self,
        account_id: u32,
    ) -> impl Future<Output = Result<Vec<Character>>> + Send;

    /// Players online on a world, for the status document
    fn count_online_players(&self, world_id: u8) -> impl Future<Output = Result<u32>> + Send {
        let _ = world_id;
        async { Ok(0) }
    }
}
