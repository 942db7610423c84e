//! NIP-01 frames exchanged with relays (the subset this client speaks).

use crate::relay::event::RelayEvent;
use crate::relay::filter::Filter;
use serde_json::Value;

/// Client → relay.
#[derive(Debug)]
pub enum ClientMessage<'a> {
    Req { subscription_id: &'a str, filter: &'a Filter },
    Close { subscription_id: &'a str },
}

impl ClientMessage<'_> {
    pub fn to_json(&self) -> String {
        match self {
            ClientMessage::Req {
                subscription_id,
                filter,
            } => serde_json::json!(["REQ", subscription_id, filter.to_json()]).to_string(),
            ClientMessage::Close { subscription_id } => {
                serde_json::json!(["CLOSE", subscription_id]).to_string()
            }
        }
    }
}

/// Relay → client.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        event: RelayEvent,
    },
    EndOfStoredEvents {
        subscription_id: String,
    },
    Closed {
        subscription_id: String,
        reason: String,
    },
    Notice(String),
}

impl RelayMessage {
    /// Returns `None` for frames that are unknown or malformed.
    pub fn parse(text: &str) -> Option<Self> {
        let val: Value = serde_json::from_str(text).ok()?;
        let arr = val.as_array()?;
        let str_at = |i: usize| arr.get(i).and_then(|v| v.as_str()).map(str::to_string);
        match arr.first().and_then(|v| v.as_str())? {
            "EVENT" if arr.len() >= 3 => {
                let event = serde_json::from_value::<RelayEvent>(arr[2].clone()).ok()?;
                Some(RelayMessage::Event {
                    subscription_id: str_at(1)?,
                    event,
                })
            }
            "EOSE" => Some(RelayMessage::EndOfStoredEvents {
                subscription_id: str_at(1)?,
            }),
            "CLOSED" => Some(RelayMessage::Closed {
                subscription_id: str_at(1)?,
                reason: str_at(2).unwrap_or_default(),
            }),
            "NOTICE" => Some(RelayMessage::Notice(str_at(1).unwrap_or_default())),
            _ => None,
        }
    }
}
