//! Ownership ledger service: input validation plus timeout/retry around a
//! [`LedgerStore`] backend.

use crate::error::{Error, Result};
use crate::infra::with_timeout_retry;
use crate::storage::ledger::{AddOutcome, LedgerStore, OwnershipRecord, UpsertOutcome};
use std::sync::Arc;
use std::time::Duration;

pub const MSG_IDENTITY_REQUIRED: &str = "nostrName and npub are required";
pub const MSG_ITEM_REQUIRED: &str = "Animal name is required";
pub const MSG_NOT_FOUND: &str = "User not found";

pub struct OwnershipLedger {
    store: Arc<dyn LedgerStore>,
    seed_item: String,
    timeout: Duration,
}

fn required<'a>(value: &'a str, message: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(message.to_string()));
    }
    Ok(value)
}

impl OwnershipLedger {
    pub fn new(store: Arc<dyn LedgerStore>, seed_item: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            seed_item: seed_item.into(),
            timeout,
        }
    }

    /// Registers a login: creates the record (seeded with the default item)
    /// or refreshes its name and last login.
    pub async fn upsert_identity(&self, npub: &str, name: &str) -> Result<UpsertOutcome> {
        let npub = required(npub, MSG_IDENTITY_REQUIRED)?;
        let name = required(name, MSG_IDENTITY_REQUIRED)?;
        let outcome = with_timeout_retry("ledger upsert", self.timeout, move || {
            self.store.upsert_identity(npub, name, &self.seed_item)
        })
        .await?;
        if outcome.created {
            tracing::info!(npub, "ledger record created");
        }
        Ok(outcome)
    }

    /// `added == false` means the item was already owned.
    pub async fn add_owned_item(&self, npub: &str, item: &str) -> Result<AddOutcome> {
        let item = required(item, MSG_ITEM_REQUIRED)?;
        let npub = required(npub, MSG_IDENTITY_REQUIRED)?;
        let outcome = with_timeout_retry("ledger add item", self.timeout, move || {
            self.store.add_owned_item(npub, item)
        })
        .await?;
        tracing::debug!(npub, item, added = outcome.added, "owned item add");
        Ok(outcome)
    }

    /// Empty for an identity the ledger has never seen.
    pub async fn owned_items(&self, npub: &str) -> Result<Vec<String>> {
        let npub = npub.trim();
        with_timeout_retry("ledger owned items", self.timeout, move || self.store.owned_items(npub)).await
    }

    pub async fn get_record(&self, npub: &str) -> Result<OwnershipRecord> {
        let npub = npub.trim();
        with_timeout_retry("ledger get record", self.timeout, move || self.store.get_record(npub))
            .await?
            .ok_or_else(|| Error::NotFound(MSG_NOT_FOUND.to_string()))
    }

    pub async fn ping(&self) -> Result<()> {
        with_timeout_retry("ledger ping", self.timeout, move || self.store.ping()).await
    }
}
