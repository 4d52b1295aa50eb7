//! Streaming market-data analytics service.
//!
//! Exposes the component modules so binaries and tests can wire them together: ingest feed,
//! tick bus, window store, ABC analyzer, snapshot store, and broadcaster.

pub mod analytics;
pub mod broadcast;
pub mod bus;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod rounding;
pub mod scheduler;
pub mod snapshot_store;
pub mod window;
