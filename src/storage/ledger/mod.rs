//! Per-identity ownership records and the backends that persist them.
//!
//! Every backend guarantees per-key atomicity for [`LedgerStore::upsert_identity`]
//! and [`LedgerStore::add_owned_item`]; callers need no extra locking.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A ledger record in its persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipRecord {
    pub npub: String,
    /// Absent until the first login for records created by a purchase.
    pub nostr_name: Option<String>,
    /// Owned animals.
    pub characters: Vec<String>,
    pub inventory: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl OwnershipRecord {
    /// Record as created by a first login.
    pub fn registered(npub: &str, name: &str, seed_item: &str, now: DateTime<Utc>) -> Self {
        Self {
            npub: npub.to_string(),
            nostr_name: Some(name.to_string()),
            characters: vec![seed_item.to_string()],
            inventory: Vec::new(),
            created_at: now,
            last_login: Some(now),
        }
    }

    /// Record as created by a first purchase.
    pub fn purchased(npub: &str, item: &str, now: DateTime<Utc>) -> Self {
        Self {
            npub: npub.to_string(),
            nostr_name: None,
            characters: vec![item.to_string()],
            inventory: Vec::new(),
            created_at: now,
            last_login: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpsertOutcome {
    /// True when this call created the record.
    pub created: bool,
    pub user: OwnershipRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AddOutcome {
    /// False when the item was already owned.
    pub added: bool,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Creates the record seeded with `seed_item`, or refreshes name and
    /// last login of an existing one without touching its items.
    async fn upsert_identity(&self, npub: &str, name: &str, seed_item: &str) -> Result<UpsertOutcome>;

    /// Set-insert of `item`, creating the record when absent.
    async fn add_owned_item(&self, npub: &str, item: &str) -> Result<AddOutcome>;

    /// Empty for unknown identities.
    async fn owned_items(&self, npub: &str) -> Result<Vec<String>>;

    async fn get_record(&self, npub: &str) -> Result<Option<OwnershipRecord>>;

    async fn ping(&self) -> Result<()>;
}
