use super::{AddOutcome, LedgerStore, OwnershipRecord, UpsertOutcome};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local ledger. Each mutation holds the write lock for its whole
/// read-modify-write.
#[derive(Default)]
pub struct MemoryLedgerStore {
    records: RwLock<HashMap<String, OwnershipRecord>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn upsert_identity(&self, npub: &str, name: &str, seed_item: &str) -> Result<UpsertOutcome> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        match records.get_mut(npub) {
            Some(record) => {
                record.nostr_name = Some(name.to_string());
                record.last_login = Some(now);
                Ok(UpsertOutcome {
                    created: false,
                    user: record.clone(),
                })
            }
            None => {
                let record = OwnershipRecord::registered(npub, name, seed_item, now);
                records.insert(npub.to_string(), record.clone());
                Ok(UpsertOutcome {
                    created: true,
                    user: record,
                })
            }
        }
    }

    async fn add_owned_item(&self, npub: &str, item: &str) -> Result<AddOutcome> {
        let mut records = self.records.write().await;
        let added = match records.get_mut(npub) {
            Some(record) if record.characters.iter().any(|c| c == item) => false,
            Some(record) => {
                record.characters.push(item.to_string());
                true
            }
            None => {
                records.insert(npub.to_string(), OwnershipRecord::purchased(npub, item, Utc::now()));
                true
            }
        };
        Ok(AddOutcome { added })
    }

    async fn owned_items(&self, npub: &str) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .get(npub)
            .map(|r| r.characters.clone())
            .unwrap_or_default())
    }

    async fn get_record(&self, npub: &str) -> Result<Option<OwnershipRecord>> {
        Ok(self.records.read().await.get(npub).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
