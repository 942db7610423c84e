//! Login orchestration and the session state it owns.
//!
//! A session moves through `logged out -> logged in -> logged out`. State is
//! committed only after the ledger accepted the login, and every change is
//! announced on a broadcast channel that UI code subscribes to via
//! [`SessionCoordinator::events`].
//!
//! The state lock is never held across the login chain. Each login takes a
//! generation number; any later `logout()` or `login()` bumps it, and a login
//! whose generation is stale at commit time gives up.

use crate::app::ownership_gateway::OwnershipGateway;
use crate::domain::profile::ProfileResolver;
use crate::error::{Error, Result};
use crate::identity::{Identity, SignerGateway};
use crate::infra::Timeouts;
use crate::relay::{Filter, Liveness, RelayEvent, RelayPool, SubscriptionHandle, KIND_TEXT_NOTE};
use crate::storage::ledger::AddOutcome;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn(Identity),
    LoggedOut,
    /// A new note by the logged-in user arrived from the relays.
    LatestEvent(RelayEvent),
    OwnershipChanged { item: String },
}

#[derive(Default)]
struct SessionState {
    generation: u64,
    identity: Option<Identity>,
    subscriptions: Vec<SubscriptionHandle>,
    forwarders: Vec<JoinHandle<()>>,
}

pub struct SessionCoordinator {
    signer: SignerGateway,
    profiles: ProfileResolver,
    ownership: Arc<dyn OwnershipGateway>,
    pool: RelayPool,
    endpoints: Vec<String>,
    timeouts: Timeouts,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionCoordinator {
    pub fn new(
        signer: SignerGateway,
        ownership: Arc<dyn OwnershipGateway>,
        pool: RelayPool,
        endpoints: Vec<String>,
        timeouts: Timeouts,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            signer,
            profiles: ProfileResolver::new(pool.clone(), endpoints.clone()),
            ownership,
            pool,
            endpoints,
            timeouts,
            state: Mutex::new(SessionState::default()),
            events,
        }
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn current(&self) -> Option<Identity> {
        self.state.lock().await.identity.clone()
    }

    /// Runs the full login chain. An existing session is logged out first.
    ///
    /// Relay and profile problems degrade to an empty profile; a ledger
    /// failure aborts and leaves the session logged out. A `logout()` that
    /// lands while the chain is running makes it fail with
    /// [`Error::LoginCancelled`].
    pub async fn login(&self) -> Result<Identity> {
        let generation = {
            let mut state = self.state.lock().await;
            self.clear(&mut state);
            state.generation
        };

        let key = self.signer.login().await?;
        let npub = crate::identity::encode(&key);
        tracing::info!(%npub, "login started");

        if let Err(e) = self.pool.connect(&self.endpoints).await {
            tracing::warn!(%npub, error = %e, "continuing login without relays");
        }
        let profile = self.profiles.resolve(&key, self.timeouts.profile).await;
        if profile.is_empty() {
            tracing::debug!(%npub, "no profile metadata found");
        }
        let identity = Identity::new(key, profile);

        self.ownership
            .register(&identity.npub, identity.ledger_name())
            .await
            .map_err(|e| {
                tracing::error!(%npub, error = %e, "ledger registration failed");
                e
            })?;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::info!(%npub, "login cancelled before commit");
            return Err(Error::LoginCancelled);
        }
        state.identity = Some(identity.clone());
        let _ = self.events.send(SessionEvent::LoggedIn(identity.clone()));

        let notes = Filter::new().kind(KIND_TEXT_NOTE).author(key);
        match self.pool.subscribe(notes, Liveness::KeepOpen) {
            Ok(mut sub) => {
                state.subscriptions.push(sub.handle());
                let events = self.events.clone();
                state.forwarders.push(tokio::spawn(async move {
                    while let Some(event) = sub.next().await {
                        let _ = events.send(SessionEvent::LatestEvent(event));
                    }
                }));
            }
            Err(e) => tracing::warn!(%npub, error = %e, "live note subscription unavailable"),
        }

        tracing::info!(%npub, name = identity.ledger_name(), "logged in");
        Ok(identity)
    }

    /// Closes the session's subscriptions and forgets the identity. The
    /// ledger record is left alone. A login still in flight is cancelled.
    /// Calling it while logged out is otherwise a no-op.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        self.clear(&mut state);
    }

    fn clear(&self, state: &mut SessionState) {
        state.generation += 1;
        for handle in state.subscriptions.drain(..) {
            self.pool.cancel(&handle);
        }
        for task in state.forwarders.drain(..) {
            task.abort();
        }
        if let Some(identity) = state.identity.take() {
            tracing::info!(npub = %identity.npub, "logged out");
            let _ = self.events.send(SessionEvent::LoggedOut);
        }
    }

    async fn session_npub(&self) -> Result<String> {
        self.state
            .lock()
            .await
            .identity
            .as_ref()
            .map(|i| i.npub.clone())
            .ok_or_else(|| Error::NotFound("no active session".to_string()))
    }

    pub async fn owned_items(&self) -> Result<Vec<String>> {
        let npub = self.session_npub().await?;
        self.ownership.owned_items(&npub).await
    }

    pub async fn purchase(&self, item: &str) -> Result<AddOutcome> {
        let npub = self.session_npub().await?;
        let outcome = self.ownership.purchase(&npub, item).await?;
        if outcome.added {
            let _ = self.events.send(SessionEvent::OwnershipChanged {
                item: item.trim().to_string(),
            });
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ledger_service::OwnershipLedger;
    use crate::app::ownership_gateway::LocalOwnershipGateway;
    use crate::identity::{PublicKey, PublicKeySigner, SignerFailure, StaticKeySigner};
    use crate::relay::testing::{dead_url, event, FakeRelay};
    use crate::storage::ledger::{MemoryLedgerStore, OwnershipRecord};
    use async_trait::async_trait;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(3);

    fn key() -> PublicKey {
        PublicKey::from_bytes([0x42; 32])
    }

    fn timeouts() -> Timeouts {
        Timeouts {
            signer: Duration::from_secs(1),
            relay_connect: Duration::from_millis(500),
            profile: Duration::from_millis(500),
            ledger: Duration::from_secs(1),
        }
    }

    fn ledger() -> Arc<OwnershipLedger> {
        Arc::new(OwnershipLedger::new(
            Arc::new(MemoryLedgerStore::new()),
            "Dog",
            Duration::from_secs(1),
        ))
    }

    fn coordinator(
        signer: Option<Arc<dyn PublicKeySigner>>,
        ownership: Arc<dyn OwnershipGateway>,
        endpoints: Vec<String>,
    ) -> SessionCoordinator {
        let t = timeouts();
        SessionCoordinator::new(
            SignerGateway::new(signer, t.signer),
            ownership,
            RelayPool::new(t.relay_connect),
            endpoints,
            t,
        )
    }

    fn signer() -> Option<Arc<dyn PublicKeySigner>> {
        Some(Arc::new(StaticKeySigner::new(key())))
    }

    #[tokio::test]
    async fn login_completes_when_profile_lookup_times_out() {
        let relay = FakeRelay::silent().await;
        let ledger = ledger();
        let session = coordinator(
            signer(),
            Arc::new(LocalOwnershipGateway::new(ledger.clone())),
            vec![relay.url.clone()],
        );

        let identity = session.login().await.unwrap();
        assert_eq!(identity.public_key, key());
        assert!(identity.profile.is_empty());
        assert_eq!(session.current().await, Some(identity.clone()));

        let record = ledger.get_record(&identity.npub).await.unwrap();
        assert_eq!(record.nostr_name.as_deref(), Some("Anonymous"));
        assert_eq!(record.characters, vec!["Dog"]);
    }

    #[tokio::test]
    async fn profile_name_is_registered_in_the_ledger() {
        let relay = FakeRelay::start(vec![event("m", key(), 0, 1, r#"{"name":"wildcat"}"#)]).await;
        let ledger = ledger();
        let session = coordinator(
            signer(),
            Arc::new(LocalOwnershipGateway::new(ledger.clone())),
            vec![relay.url.clone()],
        );
        let identity = session.login().await.unwrap();
        assert_eq!(identity.profile.display_name.as_deref(), Some("wildcat"));
        let record = ledger.get_record(&identity.npub).await.unwrap();
        assert_eq!(record.nostr_name.as_deref(), Some("wildcat"));
    }

    #[tokio::test]
    async fn login_survives_unreachable_relays() {
        let session = coordinator(
            signer(),
            Arc::new(LocalOwnershipGateway::new(ledger())),
            vec![dead_url().await],
        );
        let identity = session.login().await.unwrap();
        assert!(identity.profile.is_empty());
    }

    #[tokio::test]
    async fn missing_signer_fails_without_touching_state() {
        let session = coordinator(None, Arc::new(LocalOwnershipGateway::new(ledger())), vec![]);
        assert_eq!(session.login().await.unwrap_err(), Error::SignerUnavailable);
        assert_eq!(session.current().await, None);
    }

    struct BrokenLedger;

    #[async_trait]
    impl OwnershipGateway for BrokenLedger {
        async fn register(&self, _: &str, _: &str) -> Result<OwnershipRecord> {
            Err(Error::Persistence("disk full".into()))
        }
        async fn owned_items(&self, _: &str) -> Result<Vec<String>> {
            Err(Error::Persistence("disk full".into()))
        }
        async fn purchase(&self, _: &str, _: &str) -> Result<AddOutcome> {
            Err(Error::Persistence("disk full".into()))
        }
    }

    #[tokio::test]
    async fn ledger_failure_aborts_login() {
        let session = coordinator(signer(), Arc::new(BrokenLedger), vec![dead_url().await]);
        let mut events = session.events();
        assert_eq!(
            session.login().await.unwrap_err(),
            Error::Persistence("disk full".into())
        );
        assert_eq!(session.current().await, None);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn live_notes_are_forwarded_until_logout() {
        let relay = FakeRelay::start(vec![]).await;
        let session = coordinator(
            signer(),
            Arc::new(LocalOwnershipGateway::new(ledger())),
            vec![relay.url.clone()],
        );
        let mut events = session.events();
        session.login().await.unwrap();
        assert!(matches!(
            tokio::time::timeout(WAIT, events.recv()).await.unwrap(),
            Ok(SessionEvent::LoggedIn(_))
        ));

        // Profile lookup and live notes.
        relay.wait_for_requests(2).await;
        relay.push(event("note-1", key(), 1, 10, "gm"));
        match tokio::time::timeout(WAIT, events.recv()).await.unwrap() {
            Ok(SessionEvent::LatestEvent(ev)) => assert_eq!(ev.content, "gm"),
            other => panic!("expected note, got {:?}", other),
        }

        session.logout().await;
        session.logout().await;
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
        assert_eq!(session.current().await, None);

        relay.wait_for_closes(2).await;
        relay.push(event("note-2", key(), 1, 11, "gn"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(relay.closes(), 2);
    }

    struct SlowSigner;

    #[async_trait]
    impl PublicKeySigner for SlowSigner {
        async fn get_public_key(&self) -> std::result::Result<PublicKey, SignerFailure> {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Ok(key())
        }
    }

    fn slow_session(ledger: Arc<OwnershipLedger>) -> Arc<SessionCoordinator> {
        Arc::new(coordinator(
            Some(Arc::new(SlowSigner)),
            Arc::new(LocalOwnershipGateway::new(ledger)),
            vec![],
        ))
    }

    #[tokio::test]
    async fn pending_login_does_not_block_callers() {
        let session = slow_session(ledger());
        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.login().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let quick = Duration::from_millis(100);
        assert_eq!(tokio::time::timeout(quick, session.current()).await.unwrap(), None);
        assert!(matches!(
            tokio::time::timeout(quick, session.owned_items()).await.unwrap(),
            Err(Error::NotFound(_))
        ));

        let identity = pending.await.unwrap().unwrap();
        assert_eq!(session.current().await, Some(identity));
    }

    #[tokio::test]
    async fn logout_during_login_cancels_it() {
        let ledger = ledger();
        let session = slow_session(ledger.clone());
        let mut events = session.events();
        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.login().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_millis(100), session.logout())
            .await
            .unwrap();
        assert_eq!(pending.await.unwrap().unwrap_err(), Error::LoginCancelled);
        assert_eq!(session.current().await, None);
        assert!(events.try_recv().is_err());
        // The ledger already saw the login; only the session was dropped.
        assert!(ledger.get_record(&crate::identity::encode(&key())).await.is_ok());
    }

    #[tokio::test]
    async fn ownership_calls_need_a_session() {
        let ledger = ledger();
        let session = coordinator(
            signer(),
            Arc::new(LocalOwnershipGateway::new(ledger.clone())),
            vec![dead_url().await],
        );
        assert!(matches!(session.owned_items().await, Err(Error::NotFound(_))));
        assert!(matches!(session.purchase("Cat").await, Err(Error::NotFound(_))));

        session.login().await.unwrap();
        let mut events = session.events();
        assert!(session.purchase("Cat").await.unwrap().added);
        assert!(!session.purchase("Cat").await.unwrap().added);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::OwnershipChanged { item: "Cat".into() }
        );
        assert!(events.try_recv().is_err());
        assert_eq!(session.owned_items().await.unwrap(), vec!["Dog", "Cat"]);
    }

    #[tokio::test]
    async fn second_login_replaces_the_session() {
        let session = coordinator(
            signer(),
            Arc::new(LocalOwnershipGateway::new(ledger())),
            vec![dead_url().await],
        );
        session.login().await.unwrap();
        let mut events = session.events();
        session.login().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::LoggedIn(_)));
    }
}
