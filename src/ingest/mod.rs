//! Ingest Feed: exchange connectivity, wire decoding, and reconnect/heartbeat management.

pub mod binance;
pub mod decode;
pub mod session;

pub use binance::{IngestMetrics, MARKET_STREAM_CHANNEL};
