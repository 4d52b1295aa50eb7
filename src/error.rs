//! Error taxonomy for the ingest and snapshot-store seams.
//!
//! Per the component contracts: transport/decode failures are recovered locally by the
//! caller (logged, retried or dropped); these types exist so callers can branch on *kind*
//! without downcasting an `anyhow::Error`. The ABC analyzer itself never returns `Result` —
//! it is a total function that degrades to the documented defaults.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to connect to exchange endpoint {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("unrecognized event kind: {0}")]
    UnknownEventKind(String),

    #[error("failed to publish tick to bus channel {channel}: {reason}")]
    Publish { channel: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    #[error("failed to serialize snapshot for {symbol}: {source}")]
    Serialize {
        symbol: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to deserialize snapshot for {symbol}: {source}")]
    Deserialize {
        symbol: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("backend error: {0}")]
    Backend(String),

    /// Operator error: misuse of a blocking call where the non-blocking
    /// variant is required (e.g. from the broadcast loop's critical path). This is a
    /// programmer error, not a runtime condition, and is never expected to surface in
    /// production — it exists so a debug build can assert the contract.
    #[error("blocking snapshot-store access attempted from a non-blocking context")]
    Blocking,
}
