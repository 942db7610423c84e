//! Caller-side view of a subscription: merges every relay's deliveries,
//! drops duplicate event ids and tracks backfill completion.

use crate::relay::connection::{Command, Delivery};
use crate::relay::event::RelayEvent;
use crate::relay::filter::{Filter, Liveness};
use futures_util::Stream;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Cloneable handle that cancels a subscription from anywhere.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    id: String,
    cancelled: AtomicBool,
    relays: Vec<mpsc::UnboundedSender<Command>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: String, relays: Vec<mpsc::UnboundedSender<Command>>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                cancelled: AtomicBool::new(false),
                relays,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sends CLOSE to every relay carrying this subscription. Safe to call
    /// repeatedly; only the first call does anything.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        for relay in &self.inner.relays {
            let _ = relay.send(Command::Close {
                subscription_id: self.inner.id.clone(),
            });
        }
        tracing::debug!(subscription = %self.inner.id, "subscription cancelled");
    }
}

pub struct Subscription {
    filter: Filter,
    liveness: Liveness,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
    seen: HashSet<String>,
    /// Relays that have not yet finished backfill.
    backfilling: HashSet<Arc<str>>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub(crate) fn new(
        filter: Filter,
        liveness: Liveness,
        deliveries: mpsc::UnboundedReceiver<Delivery>,
        relays: impl IntoIterator<Item = Arc<str>>,
        handle: SubscriptionHandle,
    ) -> Self {
        Self {
            filter,
            liveness,
            deliveries,
            seen: HashSet::new(),
            backfilling: relays.into_iter().collect(),
            handle,
        }
    }

    pub fn id(&self) -> &str {
        self.handle.id()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// True once every relay has reported end-of-stored-events (or gone away).
    pub fn backfill_complete(&self) -> bool {
        self.backfilling.is_empty()
    }

    /// Next unseen event, or `None` when the subscription is over: cancelled,
    /// every relay gone, or (for [`Liveness::CloseOnEose`]) backfill complete.
    pub async fn next(&mut self) -> Option<RelayEvent> {
        loop {
            if self.handle.is_cancelled() {
                self.deliveries.close();
                return None;
            }
            if self.liveness == Liveness::CloseOnEose && self.backfilling.is_empty() {
                self.handle.cancel();
                return None;
            }

            let delivery = self.deliveries.recv().await?;
            if self.handle.is_cancelled() {
                continue;
            }
            match delivery {
                Delivery::Event { relay, event } => {
                    if !self.filter.matches(&event) {
                        tracing::debug!(relay = %relay, id = %event.id, "dropping event outside filter");
                        continue;
                    }
                    if self.seen.insert(event.id.clone()) {
                        return Some(event);
                    }
                }
                Delivery::EndOfStoredEvents { relay } => {
                    self.backfilling.remove(&relay);
                    if self.backfilling.is_empty() {
                        tracing::debug!(subscription = %self.id(), "backfill complete");
                    }
                }
                Delivery::Ended { relay } => {
                    self.backfilling.remove(&relay);
                }
            }
        }
    }

    pub fn cancel(&mut self) {
        self.handle.cancel();
        self.deliveries.close();
    }

    pub fn into_stream(self) -> impl Stream<Item = RelayEvent> + Send {
        futures_util::stream::unfold(self, |mut sub| async move {
            let event = sub.next().await?;
            Some((event, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
