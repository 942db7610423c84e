//! In-process relay used by tests: answers REQ with its stored events and an
//! EOSE, then forwards anything pushed live to the open subscriptions.
//! A refusing relay answers every REQ with CLOSED instead.

use crate::relay::event::RelayEvent;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message as TMsg};

const WAIT: Duration = Duration::from_secs(3);

#[derive(Clone)]
enum Reply {
    Stored,
    Silent,
    Closed(String),
}

pub(crate) struct FakeRelay {
    pub url: String,
    live: broadcast::Sender<RelayEvent>,
    requests: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FakeRelay {
    pub async fn start(stored: Vec<RelayEvent>) -> Self {
        Self::spawn(stored, Reply::Stored).await
    }

    /// Accepts subscriptions but never sends anything back.
    pub async fn silent() -> Self {
        Self::spawn(Vec::new(), Reply::Silent).await
    }

    /// Answers every REQ with `["CLOSED", id, reason]`.
    pub async fn refusing(reason: &str) -> Self {
        Self::spawn(Vec::new(), Reply::Closed(reason.to_string())).await
    }

    async fn spawn(stored: Vec<RelayEvent>, reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (live, _) = broadcast::channel(64);
        let requests = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));

        let live_tx = live.clone();
        let (req, cls) = (requests.clone(), closes.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let ctx = Conn {
                    stored: stored.clone(),
                    reply: reply.clone(),
                    live: live_tx.subscribe(),
                    requests: req.clone(),
                    closes: cls.clone(),
                };
                tokio::spawn(async move {
                    if let Ok(ws) = accept_async(stream).await {
                        ctx.serve(ws).await;
                    }
                });
            }
        });

        Self {
            url,
            live,
            requests,
            closes,
        }
    }

    pub fn push(&self, event: RelayEvent) {
        let _ = self.live.send(event);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Waits until `n` REQ frames have been handled. Anything pushed after
    /// this returns reaches those subscriptions.
    pub async fn wait_for_requests(&self, n: usize) {
        wait_until(|| self.requests() >= n).await;
    }

    pub async fn wait_for_closes(&self, n: usize) {
        wait_until(|| self.closes() >= n).await;
    }
}

async fn wait_until(done: impl Fn() -> bool) {
    let polled = tokio::time::timeout(WAIT, async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "fake relay never saw the expected frames");
}

/// URL of a port nobody listens on.
pub(crate) async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

pub(crate) fn event(id: &str, author: crate::identity::PublicKey, kind: u32, created_at: u64, content: &str) -> RelayEvent {
    RelayEvent {
        id: id.into(),
        author,
        kind,
        created_at,
        tags: vec![],
        content: content.into(),
        sig: String::new(),
    }
}

struct Conn {
    stored: Vec<RelayEvent>,
    reply: Reply,
    live: broadcast::Receiver<RelayEvent>,
    requests: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl Conn {
    async fn serve(mut self, mut ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) {
        let mut subs: Vec<(String, Vec<u64>)> = Vec::new();
        loop {
            tokio::select! {
                frame = ws.next() => {
                    let Some(Ok(TMsg::Text(txt))) = frame else { break };
                    let Ok(Value::Array(arr)) = serde_json::from_str::<Value>(&txt) else { continue };
                    match arr.first().and_then(Value::as_str) {
                        Some("REQ") => {
                            let id = arr[1].as_str().unwrap_or_default().to_string();
                            let kinds: Vec<u64> = arr[2]["kinds"]
                                .as_array()
                                .map(|ks| ks.iter().filter_map(Value::as_u64).collect())
                                .unwrap_or_default();
                            match &self.reply {
                                Reply::Silent => {}
                                Reply::Closed(reason) => {
                                    let frame = serde_json::json!(["CLOSED", id, reason]).to_string();
                                    let _ = ws.send(TMsg::Text(frame)).await;
                                }
                                Reply::Stored => {
                                    for ev in self.stored.iter().filter(|e| wants(&kinds, e)) {
                                        let frame = serde_json::json!(["EVENT", id, ev]).to_string();
                                        if ws.send(TMsg::Text(frame)).await.is_err() {
                                            return;
                                        }
                                    }
                                    let _ = ws.send(TMsg::Text(serde_json::json!(["EOSE", id]).to_string())).await;
                                    subs.push((id, kinds));
                                }
                            }
                            // Counted last so a waiter knows the subscription is registered.
                            self.requests.fetch_add(1, Ordering::SeqCst);
                        }
                        Some("CLOSE") => {
                            self.closes.fetch_add(1, Ordering::SeqCst);
                            let id = arr[1].as_str().unwrap_or_default();
                            subs.retain(|(s, _)| s != id);
                        }
                        _ => {}
                    }
                }
                pushed = self.live.recv() => {
                    let ev = match pushed {
                        Ok(ev) => ev,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    for (id, kinds) in &subs {
                        if wants(kinds, &ev) {
                            let frame = serde_json::json!(["EVENT", id, ev]).to_string();
                            let _ = ws.send(TMsg::Text(frame)).await;
                        }
                    }
                }
            }
        }
    }
}

fn wants(kinds: &[u64], event: &RelayEvent) -> bool {
    kinds.is_empty() || kinds.contains(&(event.kind as u64))
}
