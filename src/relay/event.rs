//! Relay event model.

use crate::identity::PublicKey;
use serde::{Deserialize, Serialize};

/// Profile metadata (`{"name": .., "picture": ..}` as JSON content).
pub const KIND_METADATA: u32 = 0;
/// Short text note.
pub const KIND_TEXT_NOTE: u32 = 1;

/// An event as received from a relay. Immutable once received.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "7e7e9c42...",
///   "kind": 1,
///   "created_at": 1700000000,
///   "tags": [["t", "news"]],
///   "content": "hello",
///   "sig": "deadbeef"
/// }
/// ```
///
/// Tags and signature are carried verbatim; signatures are not verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayEvent {
    pub id: String,
    #[serde(rename = "pubkey")]
    pub author: PublicKey,
    pub kind: u32,
    pub created_at: u64,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}
