//! One persistent websocket per relay endpoint, multiplexing every subscription
//! of the process over it.

use crate::relay::event::RelayEvent;
use crate::relay::filter::Filter;
use crate::relay::message::{ClientMessage, RelayMessage};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a connection hands to a subscription.
#[derive(Debug)]
pub(crate) enum Delivery {
    Event { relay: Arc<str>, event: RelayEvent },
    EndOfStoredEvents { relay: Arc<str> },
    /// The relay will deliver nothing more for this subscription
    /// (CLOSED frame, dropped connection, or shutdown).
    Ended { relay: Arc<str> },
}

#[derive(Debug)]
pub(crate) enum Command {
    Subscribe {
        subscription_id: String,
        filter: Filter,
        sink: mpsc::UnboundedSender<Delivery>,
    },
    Close {
        subscription_id: String,
    },
    Shutdown,
}

pub(crate) struct RelayConnection {
    url: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
}

impl RelayConnection {
    /// Dials `url` (one retry on failure or timeout) and spawns the connection task.
    pub(crate) async fn open(url: &str, timeout: Duration) -> Result<Self, String> {
        let parsed = url::Url::parse(url).map_err(|e| format!("invalid relay url: {}", e))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(format!("unsupported scheme '{}'", parsed.scheme()));
        }

        let mut last_err = String::new();
        for attempt in 1..=2 {
            match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
                Ok(Ok((socket, _response))) => {
                    let url: Arc<str> = Arc::from(url);
                    let (tx, rx) = mpsc::unbounded_channel();
                    tokio::spawn(run(url.clone(), socket, rx));
                    tracing::info!(relay = %url, "relay connected");
                    return Ok(Self { url, commands: tx });
                }
                Ok(Err(e)) => last_err = e.to_string(),
                Err(_) => last_err = format!("connect timed out after {:?}", timeout),
            }
            if attempt == 1 {
                tracing::debug!(relay = url, error = %last_err, "retrying relay connect");
            }
        }
        Err(last_err)
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    pub(crate) fn commands(&self) -> mpsc::UnboundedSender<Command> {
        self.commands.clone()
    }

    pub(crate) fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

async fn run(url: Arc<str>, socket: RelaySocket, mut commands: mpsc::UnboundedReceiver<Command>) {
    let (mut outbound, mut inbound) = socket.split();
    let mut subs: HashMap<String, mpsc::UnboundedSender<Delivery>> = HashMap::new();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Subscribe { subscription_id, filter, sink }) => {
                    let frame = ClientMessage::Req { subscription_id: &subscription_id, filter: &filter }.to_json();
                    if let Err(e) = outbound.send(Message::Text(frame)).await {
                        tracing::warn!(relay = %url, error = %e, "failed to send REQ");
                        let _ = sink.send(Delivery::Ended { relay: url.clone() });
                        break;
                    }
                    subs.insert(subscription_id, sink);
                }
                Some(Command::Close { subscription_id }) => {
                    if subs.remove(&subscription_id).is_some() {
                        let frame = ClientMessage::Close { subscription_id: &subscription_id }.to_json();
                        if let Err(e) = outbound.send(Message::Text(frame)).await {
                            tracing::debug!(relay = %url, error = %e, "failed to send CLOSE");
                        }
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = outbound.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(txt))) => dispatch(&url, &txt, &mut subs),
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(relay = %url, "relay closed the connection");
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(relay = %url, error = %e, "relay connection error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    commands.close();
    // Subscriptions queued behind the exit still need to learn this relay is gone.
    while let Ok(cmd) = commands.try_recv() {
        if let Command::Subscribe { sink, .. } = cmd {
            let _ = sink.send(Delivery::Ended { relay: url.clone() });
        }
    }
    for (_, sink) in subs.drain() {
        let _ = sink.send(Delivery::Ended { relay: url.clone() });
    }
}

fn dispatch(url: &Arc<str>, text: &str, subs: &mut HashMap<String, mpsc::UnboundedSender<Delivery>>) {
    let Some(msg) = RelayMessage::parse(text) else {
        tracing::debug!(relay = %url, "ignoring unrecognised frame");
        return;
    };
    match msg {
        RelayMessage::Event {
            subscription_id,
            event,
        } => {
            let delivery = Delivery::Event {
                relay: url.clone(),
                event,
            };
            if let Some(sink) = subs.get(&subscription_id) {
                if sink.send(delivery).is_err() {
                    subs.remove(&subscription_id);
                }
            }
        }
        RelayMessage::EndOfStoredEvents { subscription_id } => {
            if let Some(sink) = subs.get(&subscription_id) {
                let _ = sink.send(Delivery::EndOfStoredEvents { relay: url.clone() });
            }
        }
        RelayMessage::Closed {
            subscription_id,
            reason,
        } => {
            tracing::debug!(relay = %url, subscription = %subscription_id, %reason, "relay closed subscription");
            if let Some(sink) = subs.remove(&subscription_id) {
                let _ = sink.send(Delivery::Ended { relay: url.clone() });
            }
        }
        RelayMessage::Notice(notice) => {
            tracing::info!(relay = %url, %notice, "relay notice");
        }
    }
}
