//! Snapshot Broadcaster: per-symbol WebSocket sessions and the fixed-cadence push loop.
//!
//! Each connection is handled by `ws.on_upgrade`, with a `tokio::select!` over inbound client
//! frames and outbound pushes; a `"refresh"` text frame from the client triggers an immediate
//! resend to that one session.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::snapshot_store::SnapshotStore;

type SessionId = Uuid;

/// Process-wide symbol → session-set registry. Initialised
/// lazily per symbol on first subscription; the per-symbol set is dropped once empty.
#[derive(Default)]
pub struct SubscriberRegistry {
    sessions: DashMap<String, Arc<DashSet<SessionId>>>,
    senders: DashMap<SessionId, mpsc::UnboundedSender<Message>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, symbol: &str, id: SessionId, sender: mpsc::UnboundedSender<Message>) {
        self.senders.insert(id, sender);
        self.sessions
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(DashSet::new()))
            .insert(id);
    }

    fn deregister(&self, symbol: &str, id: SessionId) {
        self.senders.remove(&id);
        if let Some(set) = self.sessions.get(symbol) {
            set.remove(&id);
            if set.is_empty() {
                drop(set);
                self.sessions.remove(symbol);
            }
        }
    }

    /// Symbols with at least one active subscriber, for the broadcast scheduler to iterate.
    pub fn symbols_with_subscribers(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|e| !e.value().is_empty())
            .map(|e| e.key().clone())
            .collect()
    }

    /// Push `payload` to every session subscribed to `symbol`. A failed send is logged and
    /// skipped; it never blocks delivery to the remaining subscribers.
    pub fn push_to_symbol(&self, symbol: &str, payload: String) {
        let Some(set) = self.sessions.get(symbol) else {
            return;
        };
        for id in set.iter() {
            self.push_to_session(*id, payload.clone());
        }
    }

    fn push_to_session(&self, id: SessionId, payload: String) {
        if let Some(sender) = self.senders.get(&id) {
            if sender.send(Message::Text(payload)).is_err() {
                warn!(session = %id, "failed to enqueue snapshot push, dropping");
            }
        }
    }
}

#[derive(Clone)]
pub struct BroadcastState {
    pub registry: Arc<SubscriberRegistry>,
    pub snapshots: Arc<SnapshotStore>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(symbol): Path<String>,
    State(state): State<BroadcastState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, symbol, state))
}

async fn handle_socket(socket: WebSocket, symbol: String, state: BroadcastState) {
    let (mut ws_sink, mut ws_source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let session_id = Uuid::new_v4();

    state.registry.register(&symbol, session_id, tx);
    send_current_snapshot(&state, &symbol, session_id).await;

    use futures_util::{SinkExt, StreamExt};

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if ws_sink.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = ws_source.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) if text.trim() == "refresh" => {
                        send_current_snapshot(&state, &symbol, session_id).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "client websocket read error");
                        break;
                    }
                }
            }
        }
    }

    state.registry.deregister(&symbol, session_id);
}

async fn send_current_snapshot(state: &BroadcastState, symbol: &str, session_id: SessionId) {
    let payload = match state.snapshots.find_latest_async(symbol).await {
        Some(snapshot) => serde_json::to_string(&snapshot)
            .unwrap_or_else(|_| error_payload(symbol)),
        None => {
            debug!(symbol, "no snapshot available yet");
            error_payload(symbol)
        }
    };
    state.registry.push_to_session(session_id, payload);
}

fn error_payload(symbol: &str) -> String {
    serde_json::json!({ "error": format!("No data available for {symbol}") }).to_string()
}

/// Periodic broadcast scheduler (default cadence 1s): for every symbol with
/// subscribers, read the latest snapshot non-blockingly and push it out.
pub async fn run_broadcast_scheduler(
    state: BroadcastState,
    interval: std::time::Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for symbol in state.registry.symbols_with_subscribers() {
                    match state.snapshots.find_latest_async(&symbol).await {
                        Some(snapshot) => {
                            if let Ok(payload) = serde_json::to_string(&snapshot) {
                                state.registry.push_to_symbol(&symbol, payload);
                            }
                        }
                        None => debug!(symbol, "broadcast tick skipped: no snapshot yet"),
                    }
                }
            }
            _ = shutdown.recv() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_drops_empty_symbol_sets() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        registry.register("BTC", id, tx);
        assert_eq!(registry.symbols_with_subscribers(), vec!["BTC".to_string()]);

        registry.deregister("BTC", id);
        assert!(registry.symbols_with_subscribers().is_empty());
    }

    #[test]
    fn push_to_unknown_symbol_is_a_noop() {
        let registry = SubscriberRegistry::new();
        registry.push_to_symbol("ETH", "{}".to_string());
    }
}
