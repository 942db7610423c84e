//! Relay gateway: pooled websocket connections, filtered subscriptions and
//! per-subscription event dedup.

mod connection;
pub mod event;
pub mod filter;
pub mod message;
pub mod pool;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use event::{RelayEvent, KIND_METADATA, KIND_TEXT_NOTE};
pub use filter::{Filter, Liveness};
pub use pool::RelayPool;
pub use subscription::{Subscription, SubscriptionHandle};
