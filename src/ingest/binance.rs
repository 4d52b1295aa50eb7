//! Ingest Feed: the exchange WebSocket connection loop.
//!
//! Connects directly via `tokio_tungstenite::connect_async` and decodes frames with the raw
//! wire codec in `decode.rs`, wrapped in the reconnect/backoff/heartbeat state machine in
//! `session.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::decode::{decode_frame, is_subscribe_ack, subscribe_frame};
use super::session::{HeartbeatAction, SessionConfig, SessionManager, SessionState, TransitionReason};
use crate::bus::TickBus;
use crate::error::IngestError;

/// Channel the ingest loop publishes every decoded tick to.
pub const MARKET_STREAM_CHANNEL: &str = "market-stream";

#[derive(Debug, Default)]
pub struct IngestMetrics {
    pub ticks_published: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub reconnects: AtomicU64,
}

/// Run the ingest loop until `shutdown` fires. Never returns early on a single connection
/// failure: it reconnects with backoff per the session state machine until told to stop.
pub async fn run(
    stream_url: String,
    symbols: Vec<String>,
    bus: &TickBus,
    metrics: &IngestMetrics,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let session = SessionManager::new(SessionConfig::from_env());

    loop {
        if matches!(shutdown.try_recv(), Ok(())) {
            session.transition(SessionState::Shutdown, TransitionReason::ShutdownRequested);
            info!("ingest loop shutting down");
            return;
        }

        session.transition(SessionState::Connecting, TransitionReason::Started);

        tokio::select! {
            result = connect_and_stream(&stream_url, &symbols, &session, bus, metrics) => {
                match result {
                    Ok(()) => {
                        session.transition(SessionState::Reconnecting, TransitionReason::ServerClose);
                    }
                    Err(reason) => {
                        session.transition(SessionState::Reconnecting, reason);
                    }
                }
                metrics.reconnects.fetch_add(1, Ordering::Relaxed);
                let backoff = session.next_backoff();
                warn!(backoff_ms = backoff.as_millis() as u64, attempt = session.backoff_attempt(), "reconnecting after backoff");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.recv() => {
                        session.transition(SessionState::Shutdown, TransitionReason::ShutdownRequested);
                        return;
                    }
                }
            }
            _ = shutdown.recv() => {
                session.transition(SessionState::Shutdown, TransitionReason::ShutdownRequested);
                return;
            }
        }
    }
}

async fn connect_and_stream(
    stream_url: &str,
    symbols: &[String],
    session: &SessionManager,
    bus: &TickBus,
    metrics: &IngestMetrics,
) -> Result<(), TransitionReason> {
    let endpoint = format!("{}?streams={}", stream_url, combined_stream_path(symbols));

    let connect = tokio::time::timeout(
        session.connect_timeout(),
        tokio_tungstenite::connect_async(&endpoint),
    )
    .await
    .map_err(|_| TransitionReason::ConnectTimeout)?;

    let (mut ws, _) = connect.map_err(|source| {
        let err = IngestError::Connect {
            endpoint: endpoint.clone(),
            source,
        };
        error!(error = %err, "connect failed");
        TransitionReason::NetworkError
    })?;

    session.transition(SessionState::Subscribing, TransitionReason::ConnectSuccess);

    let frame = subscribe_frame(symbols);
    tokio::time::timeout(session.subscribe_timeout(), ws.send(Message::Text(frame)))
        .await
        .map_err(|_| TransitionReason::SubscribeTimeout)?
        .map_err(|_| TransitionReason::NetworkError)?;

    session.transition(SessionState::Streaming, TransitionReason::SubscribeSuccess);

    let mut heartbeat_interval = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            frame = ws.next() => {
                let frame = frame.ok_or(TransitionReason::ServerClose)?;
                match frame {
                    Ok(Message::Text(text)) => handle_text_frame(&text, session, bus, metrics),
                    Ok(Message::Ping(payload)) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    }
                    Ok(Message::Pong(_)) => session.record_pong_received(),
                    Ok(Message::Close(_)) => return Err(TransitionReason::ServerClose),
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "websocket read error");
                        return Err(TransitionReason::NetworkError);
                    }
                }
            }
            _ = heartbeat_interval.tick() => {
                match session.check_heartbeat() {
                    HeartbeatAction::SendPing => {
                        session.record_ping_sent();
                        if ws.send(Message::Ping(Vec::new())).await.is_err() {
                            return Err(TransitionReason::NetworkError);
                        }
                    }
                    HeartbeatAction::PongTimeout => return Err(TransitionReason::PongTimeout),
                    HeartbeatAction::DataStale => return Err(TransitionReason::DataStale),
                    HeartbeatAction::Ok => {}
                }
            }
        }
    }
}

fn handle_text_frame(text: &str, session: &SessionManager, bus: &TickBus, metrics: &IngestMetrics) {
    if is_subscribe_ack(text) {
        return;
    }

    match decode_frame(text) {
        Ok(tick) => {
            session.record_data_received();
            let symbol = tick.symbol.clone();
            if bus.publish(MARKET_STREAM_CHANNEL, tick) == 0 {
                let err = IngestError::Publish {
                    channel: MARKET_STREAM_CHANNEL.to_string(),
                    reason: format!("no subscribers for tick on {symbol}"),
                };
                debug!(error = %err, "publish reached no subscribers");
            }
            metrics.ticks_published.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            debug!(error = %e, "dropping malformed frame");
            metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn combined_stream_path(symbols: &[String]) -> String {
    symbols
        .iter()
        .map(|s| format!("{s}@ticker"))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_stream_path_joins_symbols() {
        let path = combined_stream_path(&["btc".to_string(), "eth".to_string()]);
        assert_eq!(path, "btc@ticker/eth@ticker");
    }
}
