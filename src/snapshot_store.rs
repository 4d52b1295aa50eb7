//! Snapshot Store: the latest-snapshot-per-symbol mapping.
//!
//! Backed by `DashMap<String, ArcSwap<MarketSnapshot>>` so `find_latest_async` never blocks:
//! the broadcast loop's critical path only ever does a lock-free load, matching the
//! non-blocking contract the broadcast loop's critical path relies on.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::error::SnapshotStoreError;
use crate::models::snapshot::MarketSnapshot;

const KEY_PREFIX: &str = "latest_snapshot";

fn key(symbol: &str) -> String {
    format!("{KEY_PREFIX}:{symbol}")
}

pub struct SnapshotStore {
    snapshots: DashMap<String, Arc<ArcSwap<MarketSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
        }
    }

    /// Serialize and store the latest snapshot for `snapshot.symbol`, replacing any prior
    /// value. Round-trips through JSON even though the in-memory value is kept live, so a
    /// serialization failure surfaces the same way a real KV-store adapter's would.
    pub fn save(&self, snapshot: MarketSnapshot) -> Result<(), SnapshotStoreError> {
        serde_json::to_vec(&snapshot).map_err(|source| SnapshotStoreError::Serialize {
            symbol: snapshot.symbol.clone(),
            source,
        })?;

        let key = key(&snapshot.symbol);
        match self.snapshots.get(&key) {
            Some(existing) => existing.store(Arc::new(snapshot)),
            None => {
                self.snapshots
                    .insert(key, Arc::new(ArcSwap::from_pointee(snapshot)));
            }
        }
        Ok(())
    }

    /// Blocking read of the latest snapshot. Do not call this from the broadcast loop's
    /// critical path; use [`Self::find_latest_async`] there instead.
    pub fn find_latest(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.snapshots
            .get(&key(symbol))
            .map(|entry| (**entry.load()).clone())
    }

    /// Non-blocking variant for the broadcast loop: an `ArcSwap` load never takes a lock.
    pub async fn find_latest_async(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.find_latest(symbol)
    }

    /// Operator-only removal. Never called from the analytics or broadcast paths; a
    /// snapshot is otherwise only ever replaced, not deleted.
    pub fn delete(&self, symbol: &str) {
        self.snapshots.remove(&key(symbol));
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::abc::AbcResult;
    use chrono::Utc;

    fn snapshot(symbol: &str) -> MarketSnapshot {
        MarketSnapshot::from_abc(symbol.to_string(), Utc::now(), 100.0, 50, 7, 10_000, AbcResult::default())
    }

    #[test]
    fn save_then_find_latest_round_trips() {
        let store = SnapshotStore::new();
        let snap = snapshot("BTC");
        store.save(snap.clone()).unwrap();
        assert_eq!(store.find_latest("BTC"), Some(snap));
    }

    #[test]
    fn missing_symbol_returns_none() {
        let store = SnapshotStore::new();
        assert_eq!(store.find_latest("ETH"), None);
    }

    #[tokio::test]
    async fn find_latest_async_matches_sync() {
        let store = SnapshotStore::new();
        let snap = snapshot("SOL");
        store.save(snap.clone()).unwrap();
        assert_eq!(store.find_latest_async("SOL").await, Some(snap));
    }

    #[test]
    fn delete_removes_snapshot() {
        let store = SnapshotStore::new();
        store.save(snapshot("XRP")).unwrap();
        store.delete("XRP");
        assert_eq!(store.find_latest("XRP"), None);
    }

    #[test]
    fn save_overwrites_prior_value() {
        let store = SnapshotStore::new();
        store.save(snapshot("BTC")).unwrap();
        let second = MarketSnapshot::from_abc(
            "BTC".to_string(),
            Utc::now(),
            200.0,
            60,
            7,
            10_000,
            AbcResult::default(),
        );
        store.save(second.clone()).unwrap();
        assert_eq!(store.find_latest("BTC"), Some(second));
    }
}
