use crate::identity::PublicKey;
use crate::relay::event::RelayEvent;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Subscription filter. Empty sets mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub kinds: BTreeSet<u32>,
    pub authors: BTreeSet<PublicKey>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn author(mut self, author: PublicKey) -> Self {
        self.authors.insert(author);
        self
    }

    /// Wire form; empty sets are omitted.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if !self.kinds.is_empty() {
            map.insert(
                "kinds".into(),
                Value::Array(self.kinds.iter().map(|k| Value::from(*k)).collect()),
            );
        }
        if !self.authors.is_empty() {
            map.insert(
                "authors".into(),
                Value::Array(self.authors.iter().map(|a| Value::String(a.to_hex())).collect()),
            );
        }
        Value::Object(map)
    }

    pub fn matches(&self, event: &RelayEvent) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && (self.authors.is_empty() || self.authors.contains(&event.author))
    }
}

/// Whether a subscription closes after backfill or keeps streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Finite: ends once every relay has sent end-of-stored-events.
    CloseOnEose,
    /// Infinite: keeps delivering new events until cancelled.
    KeepOpen,
}
