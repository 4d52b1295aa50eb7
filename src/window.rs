//! Per-symbol bounded sliding window over ticks.
//!
//! Each symbol gets its own `VecDeque`-backed FIFO capped at `W_max`; once full, an append
//! evicts the oldest entry before pushing the newest. Reads take a point-in-time snapshot so
//! the analyzer never observes a window mutating mid-computation.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::models::Tick;

struct Window {
    ticks: RwLock<VecDeque<Tick>>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            ticks: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn append(&self, tick: Tick) {
        let mut ticks = self.ticks.write();
        if ticks.len() == self.capacity {
            ticks.pop_front();
        }
        ticks.push_back(tick);
    }

    fn snapshot(&self) -> Vec<Tick> {
        self.ticks.read().iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.ticks.read().len()
    }
}

/// Concurrent map of per-symbol bounded windows, sized `W_max` (`WINDOW_MAX` in config).
pub struct WindowStore {
    windows: DashMap<String, Arc<Window>>,
    capacity: usize,
}

impl WindowStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
        }
    }

    fn window_for(&self, symbol: &str) -> Arc<Window> {
        self.windows
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Window::new(self.capacity)))
            .clone()
    }

    /// Append a tick to its symbol's window, evicting the oldest entry if the window is full.
    pub fn append(&self, tick: Tick) {
        self.window_for(&tick.symbol).append(tick);
    }

    /// Oldest-first snapshot of a symbol's window. Empty if the symbol has never been seen.
    pub fn snapshot(&self, symbol: &str) -> Vec<Tick> {
        match self.windows.get(symbol) {
            Some(window) => window.snapshot(),
            None => Vec::new(),
        }
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.windows.get(symbol).map(|w| w.len()).unwrap_or(0)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.windows.iter().map(|e| e.key().clone()).collect()
    }
}
