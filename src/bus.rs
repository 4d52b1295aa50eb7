//! Tick Bus: multi-subscriber, at-least-once delivery of ticks by channel name.
//!
//! Built on `tokio::sync::broadcast` per channel: each `subscribe` call hands back an
//! independent receiver, and a publish reaches every receiver that hasn't lagged off the
//! ring buffer. Ordering is preserved per channel because a single `broadcast::Sender` only
//! ever has one producer in this system (the ingest loop for that channel).

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::models::Tick;

/// Capacity of each channel's ring buffer. Generous relative to `W_max` so a lagging
/// subscriber only drops ticks under sustained backpressure, never on a single burst.
const CHANNEL_CAPACITY: usize = 4096;

pub struct TickBus {
    channels: DashMap<String, broadcast::Sender<Tick>>,
}

impl TickBus {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<Tick> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish a tick on `channel`, returning the number of subscribers it reached. Zero
    /// reached is not itself an error at this layer: the bus has no persistence obligation
    /// and a restarting subscriber may miss in-flight ticks. Callers that care
    /// about a "nobody got this" condition (the ingest feed logs it) can inspect the count.
    pub fn publish(&self, channel: &str, tick: Tick) -> usize {
        let sender = self.sender_for(channel);
        sender.send(tick).unwrap_or(0)
    }

    /// Subscribe to `channel`, returning an independent at-least-once receiver.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Tick> {
        self.sender_for(channel).subscribe()
    }

    /// Drop the channel entirely once it has no remaining subscribers. Channels are
    /// recreated lazily on the next `publish`/`subscribe`, so this is safe to call eagerly.
    pub fn unsubscribe(&self, channel: &str) {
        if let Some(entry) = self.channels.get(channel) {
            if entry.receiver_count() == 0 {
                drop(entry);
                self.channels.remove(channel);
            }
        }
    }
}

impl Default for TickBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn tick(symbol: &str) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            price: Decimal::from(100),
            volume: 1,
            timestamp: Utc::now(),
            exchange: "binance".to_string(),
            open: None,
            high: None,
            low: None,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_ticks_in_order() {
        let bus = TickBus::new();
        let mut rx = bus.subscribe("market-stream");

        bus.publish("market-stream", tick("BTC"));
        bus.publish("market-stream", tick("ETH"));

        assert_eq!(rx.recv().await.unwrap().symbol, "BTC");
        assert_eq!(rx.recv().await.unwrap().symbol, "ETH");
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_tick() {
        let bus = TickBus::new();
        let mut a = bus.subscribe("market-stream");
        let mut b = bus.subscribe("market-stream");

        bus.publish("market-stream", tick("BTC"));

        assert_eq!(a.recv().await.unwrap().symbol, "BTC");
        assert_eq!(b.recv().await.unwrap().symbol, "BTC");
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = TickBus::new();
        bus.publish("market-stream", tick("BTC"));
    }
}
