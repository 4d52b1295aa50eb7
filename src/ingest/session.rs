//! Binance WebSocket Session Management
//!
//! Fault-tolerant reconnect and session management:
//! - State machine with well-defined transitions
//! - Exponential backoff with jitter (thundering herd prevention)
//! - Heartbeat monitoring (ping/pong + data staleness)
//!
//! Design principles:
//! - Minimize downtime through fast failover
//! - Never thundering-herd on mass reconnects
//! - Low-latency logging (hot path has zero logging)

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use tracing::info;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Production-tuned session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    // Backoff parameters
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,

    // Connection timeouts
    pub connect_timeout_ms: u64,
    pub subscribe_timeout_ms: u64,

    // Heartbeat parameters
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub stale_data_timeout_ms: u64,
    pub consecutive_stale_threshold: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // Backoff: 100ms base, 2x multiplier, 30s cap, ±30% jitter
            backoff_base_ms: 100,
            backoff_max_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.3,

            // Timeouts
            connect_timeout_ms: 10_000,
            subscribe_timeout_ms: 5_000,

            // Heartbeat
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
            stale_data_timeout_ms: 5_000,
            consecutive_stale_threshold: 3,
        }
    }
}

impl SessionConfig {
    /// Load from environment with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("BINANCE_BACKOFF_BASE_MS") {
            config.backoff_base_ms = v.parse().unwrap_or(config.backoff_base_ms);
        }
        if let Ok(v) = std::env::var("BINANCE_BACKOFF_MAX_MS") {
            config.backoff_max_ms = v.parse().unwrap_or(config.backoff_max_ms);
        }
        if let Ok(v) = std::env::var("BINANCE_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = v.parse().unwrap_or(config.connect_timeout_ms);
        }
        if let Ok(v) = std::env::var("BINANCE_PING_INTERVAL_MS") {
            config.ping_interval_ms = v.parse().unwrap_or(config.ping_interval_ms);
        }
        if let Ok(v) = std::env::var("BINANCE_STALE_DATA_TIMEOUT_MS") {
            config.stale_data_timeout_ms = v.parse().unwrap_or(config.stale_data_timeout_ms);
        }

        config
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Connection state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state before any connection attempt
    Init,
    /// TCP + TLS + WebSocket upgrade in progress
    Connecting,
    /// WebSocket connected, waiting for subscription ACK
    Subscribing,
    /// Actively receiving market data
    Streaming,
    /// Connection lost, waiting for backoff timer
    Reconnecting,
    /// Graceful shutdown requested
    Shutdown,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Subscribing => write!(f, "SUBSCRIBING"),
            Self::Streaming => write!(f, "STREAMING"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
            Self::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Reason for state transition (for logging/metrics)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Started,
    ConnectSuccess,
    SubscribeSuccess,
    ConnectTimeout,
    SubscribeTimeout,
    PongTimeout,
    DataStale,
    ServerClose,
    NetworkError,
    ShutdownRequested,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::ConnectSuccess => write!(f, "connect_ok"),
            Self::SubscribeSuccess => write!(f, "subscribe_ok"),
            Self::ConnectTimeout => write!(f, "connect_timeout"),
            Self::SubscribeTimeout => write!(f, "subscribe_timeout"),
            Self::PongTimeout => write!(f, "pong_timeout"),
            Self::DataStale => write!(f, "data_stale"),
            Self::ServerClose => write!(f, "server_close"),
            Self::NetworkError => write!(f, "network_error"),
            Self::ShutdownRequested => write!(f, "shutdown"),
        }
    }
}

// =============================================================================
// EXPONENTIAL BACKOFF WITH JITTER
// =============================================================================

/// Backoff calculator with jitter for thundering herd prevention
#[derive(Debug)]
pub struct BackoffCalculator {
    config: SessionConfig,
    attempt: u32,
    rng_state: u64,
}

impl BackoffCalculator {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            attempt: 0,
            rng_state: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(12345),
        }
    }

    /// Fast PRNG for jitter (xorshift64)
    #[inline]
    fn next_random(&mut self) -> f64 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        (self.rng_state as f64) / (u64::MAX as f64)
    }

    /// Compute next backoff duration with jitter
    pub fn next_backoff(&mut self) -> Duration {
        let base = (self.config.backoff_base_ms as f64)
            * self.config.backoff_multiplier.powi(self.attempt as i32);
        let capped = base.min(self.config.backoff_max_ms as f64);

        // Jitter: ±jitter_factor (e.g., ±30%)
        let jitter_range = capped * self.config.jitter_factor;
        let jitter = (self.next_random() * 2.0 - 1.0) * jitter_range;
        let final_ms = (capped + jitter).max(self.config.backoff_base_ms as f64);

        self.attempt += 1;

        Duration::from_millis(final_ms as u64)
    }

    /// Reset on successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Current attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

// =============================================================================
// HEARTBEAT MONITOR
// =============================================================================

/// Result of heartbeat check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Everything OK, continue streaming
    Ok,
    /// Time to send a ping
    SendPing,
    /// Pong not received in time
    PongTimeout,
    /// No market data received recently
    DataStale,
}

/// Heartbeat monitoring for connection health
#[derive(Debug)]
pub struct HeartbeatMonitor {
    config: SessionConfig,
    last_ping_sent: Option<Instant>,
    awaiting_pong: bool,
    last_data_received: Instant,
    consecutive_stale_checks: u32,
}

impl HeartbeatMonitor {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            last_ping_sent: None,
            awaiting_pong: false,
            last_data_received: Instant::now(),
            consecutive_stale_checks: 0,
        }
    }

    /// Reset state for new connection
    pub fn reset(&mut self) {
        self.last_ping_sent = None;
        self.awaiting_pong = false;
        self.last_data_received = Instant::now();
        self.consecutive_stale_checks = 0;
    }

    /// Record that we received market data
    #[inline]
    pub fn record_data_received(&mut self) {
        self.last_data_received = Instant::now();
        self.consecutive_stale_checks = 0;
    }

    /// Record that we sent a ping
    pub fn record_ping_sent(&mut self) {
        self.last_ping_sent = Some(Instant::now());
        self.awaiting_pong = true;
    }

    /// Record that we received a pong
    pub fn record_pong_received(&mut self) {
        self.awaiting_pong = false;
    }

    /// Check heartbeat status and return required action
    pub fn check(&mut self) -> HeartbeatAction {
        let now = Instant::now();

        // Check pong timeout
        if self.awaiting_pong {
            if let Some(ping_time) = self.last_ping_sent {
                if now.duration_since(ping_time)
                    > Duration::from_millis(self.config.pong_timeout_ms)
                {
                    return HeartbeatAction::PongTimeout;
                }
            }
        }

        // Check data staleness
        let data_age = now.duration_since(self.last_data_received);
        if data_age > Duration::from_millis(self.config.stale_data_timeout_ms) {
            self.consecutive_stale_checks += 1;
            if self.consecutive_stale_checks >= self.config.consecutive_stale_threshold {
                return HeartbeatAction::DataStale;
            }
        }

        // Check if we need to send ping
        let should_ping = match self.last_ping_sent {
            None => true,
            Some(ping_time) => {
                now.duration_since(ping_time)
                    > Duration::from_millis(self.config.ping_interval_ms)
            }
        };

        if should_ping && !self.awaiting_pong {
            return HeartbeatAction::SendPing;
        }

        HeartbeatAction::Ok
    }

    /// Time until next required heartbeat check
    pub fn time_until_next_check(&self) -> Duration {
        let now = Instant::now();

        // If awaiting pong, check frequently
        if self.awaiting_pong {
            if let Some(ping_time) = self.last_ping_sent {
                let elapsed = now.duration_since(ping_time);
                let timeout = Duration::from_millis(self.config.pong_timeout_ms);
                if elapsed < timeout {
                    return timeout - elapsed;
                }
            }
            return Duration::from_millis(100);
        }

        // Otherwise, check based on ping interval and stale timeout
        let stale_check = Duration::from_millis(self.config.stale_data_timeout_ms / 2);
        let ping_check = match self.last_ping_sent {
            None => Duration::ZERO,
            Some(ping_time) => {
                let elapsed = now.duration_since(ping_time);
                let interval = Duration::from_millis(self.config.ping_interval_ms);
                if elapsed < interval {
                    interval - elapsed
                } else {
                    Duration::ZERO
                }
            }
        };

        stale_check.min(ping_check).max(Duration::from_millis(100))
    }
}

// =============================================================================
// SESSION METRICS
// =============================================================================

/// Session metrics for monitoring
#[derive(Debug, Default)]
pub struct SessionMetrics {
    pub connections_attempted: AtomicU64,
    pub connections_succeeded: AtomicU64,
    pub connections_failed: AtomicU64,
    pub reconnections: AtomicU64,
    pub pong_timeouts: AtomicU64,
    pub data_stale_events: AtomicU64,
    pub total_downtime_ms: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_connect_attempt(&self) {
        self.connections_attempted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connect_success(&self) {
        self.connections_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connect_failure(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconnection(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pong_timeout(&self) {
        self.pong_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_data_stale(&self) {
        self.data_stale_events.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_downtime(&self, duration: Duration) {
        self.total_downtime_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "connects={}/{} reconnects={} pong_timeouts={} stale={} downtime_ms={}",
            self.connections_succeeded.load(Ordering::Relaxed),
            self.connections_attempted.load(Ordering::Relaxed),
            self.reconnections.load(Ordering::Relaxed),
            self.pong_timeouts.load(Ordering::Relaxed),
            self.data_stale_events.load(Ordering::Relaxed),
            self.total_downtime_ms.load(Ordering::Relaxed),
        )
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Complete session manager coordinating all components
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    state: RwLock<SessionState>,
    backoff: RwLock<BackoffCalculator>,
    heartbeat: RwLock<HeartbeatMonitor>,
    metrics: SessionMetrics,
    disconnect_time: RwLock<Option<Instant>>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        let backoff = BackoffCalculator::new(config.clone());
        let heartbeat = HeartbeatMonitor::new(config.clone());

        Self {
            config,
            state: RwLock::new(SessionState::Init),
            backoff: RwLock::new(backoff),
            heartbeat: RwLock::new(heartbeat),
            metrics: SessionMetrics::new(),
            disconnect_time: RwLock::new(None),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Transition to new state with reason
    pub fn transition(&self, new_state: SessionState, reason: TransitionReason) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };

        // State-specific actions
        match (old_state, new_state) {
            (_, SessionState::Connecting) => {
                self.metrics.record_connect_attempt();
                if old_state == SessionState::Reconnecting {
                    // Track downtime
                    if let Some(disc_time) = *self.disconnect_time.read() {
                        self.metrics.add_downtime(disc_time.elapsed());
                    }
                }
            }
            (_, SessionState::Streaming) => {
                self.metrics.record_connect_success();
                self.backoff.write().reset();
                self.heartbeat.write().reset();
            }
            (_, SessionState::Reconnecting) => {
                self.metrics.record_reconnection();
                *self.disconnect_time.write() = Some(Instant::now());

                // Update metrics by reason
                match reason {
                    TransitionReason::PongTimeout => self.metrics.record_pong_timeout(),
                    TransitionReason::DataStale => self.metrics.record_data_stale(),
                    _ => self.metrics.record_connect_failure(),
                }
            }
            _ => {}
        }

        // Log transition (cold path, OK to allocate)
        info!(
            from = %old_state,
            to = %new_state,
            reason = %reason,
            "session_transition"
        );
    }

    /// Get next backoff duration
    pub fn next_backoff(&self) -> Duration {
        self.backoff.write().next_backoff()
    }

    /// Current backoff attempt number
    pub fn backoff_attempt(&self) -> u32 {
        self.backoff.read().attempt()
    }

    /// Record that market data was received (hot path)
    #[inline]
    pub fn record_data_received(&self) {
        self.heartbeat.write().record_data_received();
    }

    /// Record ping sent
    pub fn record_ping_sent(&self) {
        self.heartbeat.write().record_ping_sent();
    }

    /// Record pong received
    pub fn record_pong_received(&self) {
        self.heartbeat.write().record_pong_received();
    }

    /// Check heartbeat status
    pub fn check_heartbeat(&self) -> HeartbeatAction {
        self.heartbeat.write().check()
    }

    /// Time until next heartbeat check
    pub fn heartbeat_check_interval(&self) -> Duration {
        self.heartbeat.read().time_until_next_check()
    }

    /// Connection timeout duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.config.connect_timeout_ms)
    }

    /// Subscribe timeout duration
    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.config.subscribe_timeout_ms)
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Get config reference
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculator() {
        let config = SessionConfig::default();
        let mut backoff = BackoffCalculator::new(config);

        // First backoff should be around 100ms (with jitter)
        let d1 = backoff.next_backoff();
        assert!(d1.as_millis() >= 70 && d1.as_millis() <= 130);

        // Second should be around 200ms
        let d2 = backoff.next_backoff();
        assert!(d2.as_millis() >= 140 && d2.as_millis() <= 260);

        // After reset, should be back to ~100ms
        backoff.reset();
        let d3 = backoff.next_backoff();
        assert!(d3.as_millis() >= 70 && d3.as_millis() <= 130);
    }

    #[test]
    fn test_backoff_cap() {
        let config = SessionConfig::default();
        let mut backoff = BackoffCalculator::new(config);

        // Run many iterations
        for _ in 0..20 {
            let d = backoff.next_backoff();
            // Should never exceed max + jitter
            assert!(d.as_millis() <= 39_000); // 30000 * 1.3
        }
    }

    #[test]
    fn test_heartbeat_monitor() {
        let mut config = SessionConfig::default();
        config.ping_interval_ms = 100;
        config.stale_data_timeout_ms = 50;
        config.consecutive_stale_threshold = 2;

        let mut monitor = HeartbeatMonitor::new(config);

        // Initially should want to send ping
        assert_eq!(monitor.check(), HeartbeatAction::SendPing);

        monitor.record_ping_sent();

        // Now should be OK (waiting for pong)
        monitor.record_data_received();
        assert_eq!(monitor.check(), HeartbeatAction::Ok);

        monitor.record_pong_received();
    }

    #[test]
    fn test_session_manager_transitions() {
        let config = SessionConfig::default();
        let manager = SessionManager::new(config);

        assert_eq!(manager.state(), SessionState::Init);

        manager.transition(SessionState::Connecting, TransitionReason::Started);
        assert_eq!(manager.state(), SessionState::Connecting);

        manager.transition(SessionState::Subscribing, TransitionReason::ConnectSuccess);
        assert_eq!(manager.state(), SessionState::Subscribing);

        manager.transition(SessionState::Streaming, TransitionReason::SubscribeSuccess);
        assert_eq!(manager.state(), SessionState::Streaming);

        // Check metrics
        assert_eq!(
            manager.metrics.connections_attempted.load(Ordering::Relaxed),
            1
        );
        assert_eq!(
            manager.metrics.connections_succeeded.load(Ordering::Relaxed),
            1
        );
    }
}
