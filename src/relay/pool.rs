use crate::error::{Error, Result};
use crate::relay::connection::{Command, RelayConnection};
use crate::relay::filter::{Filter, Liveness};
use crate::relay::subscription::{Subscription, SubscriptionHandle};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// Shared set of relay connections. Cheap to clone; clones share connections.
#[derive(Clone)]
pub struct RelayPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connections: Mutex<HashMap<String, RelayConnection>>,
    connect_timeout: Duration,
}

impl RelayPool {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connections: Mutex::new(HashMap::new()),
                connect_timeout,
            }),
        }
    }

    fn connections(&self) -> MutexGuard<'_, HashMap<String, RelayConnection>> {
        self.inner
            .connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ensures a live connection to every endpoint, dialling them concurrently.
    ///
    /// Live connections are reused. Returns how many of `endpoints` are
    /// connected afterwards, or [`Error::RelayUnreachable`] when none are.
    pub async fn connect(&self, endpoints: &[String]) -> Result<usize> {
        let to_dial: Vec<String> = {
            let conns = self.connections();
            endpoints
                .iter()
                .filter(|url| !conns.get(url.as_str()).is_some_and(|c| c.is_alive()))
                .cloned()
                .collect()
        };

        let timeout = self.inner.connect_timeout;
        let dialled = futures_util::future::join_all(
            to_dial.iter().map(|url| RelayConnection::open(url, timeout)),
        )
        .await;

        let mut conns = self.connections();
        for (url, result) in to_dial.into_iter().zip(dialled) {
            match result {
                Ok(conn) => {
                    conns.insert(url, conn);
                }
                Err(e) => tracing::warn!(relay = %url, error = %e, "relay unreachable"),
            }
        }

        let live = endpoints
            .iter()
            .filter(|url| conns.get(url.as_str()).is_some_and(|c| c.is_alive()))
            .count();
        if live == 0 {
            tracing::error!(endpoints = endpoints.len(), "no relay could be reached");
            return Err(Error::RelayUnreachable);
        }
        tracing::debug!(live, requested = endpoints.len(), "relays connected");
        Ok(live)
    }

    /// Opens `filter` on every live connection.
    pub fn subscribe(&self, filter: Filter, liveness: Liveness) -> Result<Subscription> {
        let id = subscription_id();
        let (sink, deliveries) = mpsc::unbounded_channel();
        let mut relays = Vec::new();
        let mut senders = Vec::new();

        for conn in self.connections().values().filter(|c| c.is_alive()) {
            let sent = conn.send(Command::Subscribe {
                subscription_id: id.clone(),
                filter: filter.clone(),
                sink: sink.clone(),
            });
            if sent {
                relays.push(Arc::<str>::from(conn.url()));
                senders.push(conn.commands());
            }
        }
        if relays.is_empty() {
            return Err(Error::RelayUnreachable);
        }

        tracing::debug!(subscription = %id, relays = relays.len(), ?liveness, "subscription opened");
        let handle = SubscriptionHandle::new(id, senders);
        Ok(Subscription::new(filter, liveness, deliveries, relays, handle))
    }

    pub fn cancel(&self, handle: &SubscriptionHandle) {
        handle.cancel();
    }

    pub fn connected_relays(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .connections()
            .iter()
            .filter(|(_, c)| c.is_alive())
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// Closes every connection. Open subscriptions end.
    pub fn shutdown(&self) {
        for (_, conn) in self.connections().drain() {
            conn.send(Command::Shutdown);
        }
    }
}

fn subscription_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PublicKey;
    use crate::relay::testing::{dead_url, event, FakeRelay};

    const T: Duration = Duration::from_secs(2);

    fn alice() -> PublicKey {
        PublicKey::from_bytes([7; 32])
    }

    async fn collect(mut sub: Subscription) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(ev) = tokio::time::timeout(T, sub.next()).await.unwrap() {
            ids.push(ev.id);
        }
        ids
    }

    #[test]
    fn subscription_ids_are_sixteen_hex_chars() {
        let id = subscription_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, subscription_id());
    }

    #[tokio::test]
    async fn event_seen_on_two_relays_is_delivered_once() {
        let shared = event("e1", alice(), 1, 10, "hi");
        let r1 = FakeRelay::start(vec![shared.clone()]).await;
        let r2 = FakeRelay::start(vec![shared, event("e2", alice(), 1, 11, "yo")]).await;

        let pool = RelayPool::new(T);
        assert_eq!(pool.connect(&[r1.url.clone(), r2.url.clone()]).await.unwrap(), 2);

        let sub = pool
            .subscribe(Filter::new().kind(1), Liveness::CloseOnEose)
            .unwrap();
        let mut ids = collect(sub).await;
        ids.sort();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn one_failing_endpoint_is_absorbed() {
        let good = FakeRelay::start(vec![event("e1", alice(), 1, 10, "")]).await;
        let pool = RelayPool::new(T);
        let live = pool.connect(&[dead_url().await, good.url.clone()]).await.unwrap();
        assert_eq!(live, 1);
        assert_eq!(pool.connected_relays(), vec![good.url.clone()]);

        let sub = pool.subscribe(Filter::new(), Liveness::CloseOnEose).unwrap();
        assert_eq!(collect(sub).await, vec!["e1"]);
    }

    #[tokio::test]
    async fn all_endpoints_failing_is_relay_unreachable() {
        let pool = RelayPool::new(Duration::from_millis(500));
        let err = pool
            .connect(&[dead_url().await, "http://not-a-relay".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, Error::RelayUnreachable);
        assert!(matches!(
            pool.subscribe(Filter::new(), Liveness::KeepOpen),
            Err(Error::RelayUnreachable)
        ));
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let relay = FakeRelay::start(vec![]).await;
        let pool = RelayPool::new(T);
        pool.connect(&[relay.url.clone()]).await.unwrap();
        pool.connect(&[relay.url.clone()]).await.unwrap();
        assert_eq!(pool.connected_relays().len(), 1);
    }

    #[tokio::test]
    async fn live_subscription_keeps_streaming_after_backfill() {
        let relay = FakeRelay::start(vec![event("old", alice(), 1, 1, "")]).await;
        let pool = RelayPool::new(T);
        pool.connect(&[relay.url.clone()]).await.unwrap();

        let mut sub = pool
            .subscribe(Filter::new().kind(1).author(alice()), Liveness::KeepOpen)
            .unwrap();
        let first = tokio::time::timeout(T, sub.next()).await.unwrap().unwrap();
        assert_eq!(first.id, "old");

        relay.wait_for_requests(1).await;
        relay.push(event("new", alice(), 1, 2, ""));
        relay.push(event("new", alice(), 1, 2, ""));
        relay.push(event("other-kind", alice(), 0, 3, ""));
        relay.push(event("newer", alice(), 1, 4, ""));

        let second = tokio::time::timeout(T, sub.next()).await.unwrap().unwrap();
        let third = tokio::time::timeout(T, sub.next()).await.unwrap().unwrap();
        assert_eq!((second.id.as_str(), third.id.as_str()), ("new", "newer"));
    }

    #[tokio::test]
    async fn cancelling_one_subscription_leaves_the_connection_up() {
        let relay = FakeRelay::start(vec![]).await;
        let pool = RelayPool::new(T);
        pool.connect(&[relay.url.clone()]).await.unwrap();

        let mut a = pool.subscribe(Filter::new().kind(1), Liveness::KeepOpen).unwrap();
        let mut b = pool.subscribe(Filter::new().kind(1), Liveness::KeepOpen).unwrap();
        relay.wait_for_requests(2).await;

        pool.cancel(&a.handle());
        pool.cancel(&a.handle());
        assert!(a.next().await.is_none());

        relay.push(event("still-here", alice(), 1, 5, ""));
        let got = tokio::time::timeout(T, b.next()).await.unwrap().unwrap();
        assert_eq!(got.id, "still-here");
        assert_eq!(pool.connected_relays(), vec![relay.url.clone()]);
        relay.wait_for_closes(1).await;
        assert_eq!(relay.closes(), 1);
    }

    #[tokio::test]
    async fn relay_closing_a_subscription_counts_as_done() {
        let good = FakeRelay::start(vec![event("e1", alice(), 1, 10, "")]).await;
        let refusing = FakeRelay::refusing("blocked: not allowed").await;
        let pool = RelayPool::new(T);
        pool.connect(&[good.url.clone(), refusing.url.clone()]).await.unwrap();

        let sub = pool.subscribe(Filter::new().kind(1), Liveness::CloseOnEose).unwrap();
        assert_eq!(collect(sub).await, vec!["e1"]);
        refusing.wait_for_requests(1).await;

        // Only the relay that kept the subscription open is sent a CLOSE.
        good.wait_for_closes(1).await;
        assert_eq!(refusing.closes(), 0);
        assert_eq!(pool.connected_relays().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_ends_live_subscriptions() {
        let relay = FakeRelay::start(vec![]).await;
        let pool = RelayPool::new(T);
        pool.connect(&[relay.url.clone()]).await.unwrap();
        let mut sub = pool.subscribe(Filter::new(), Liveness::KeepOpen).unwrap();

        pool.shutdown();
        assert!(tokio::time::timeout(T, sub.next()).await.unwrap().is_none());
        assert!(pool.connected_relays().is_empty());
    }
}
