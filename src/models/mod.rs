//! Core data model: the immutable `Tick` ingested from the exchange, and the ABC/snapshot
//! wire types that flow out of the analytics pipeline.

pub mod abc;
pub mod snapshot;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single normalized market observation. Immutable: constructed once by the ingest
/// decoder, never mutated, and dropped when evicted from its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: Decimal,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
}

impl Tick {
    /// Price as `f64` for internal computation. Externally exposed numbers retain decimal
    /// precision; analytics work in IEEE 754 doubles.
    pub fn price_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.price.to_f64().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_f64_converts() {
        let tick = Tick {
            symbol: "BTC".into(),
            price: dec!(100.5),
            volume: 10,
            timestamp: Utc::now(),
            exchange: "binance".into(),
            open: None,
            high: None,
            low: None,
        };
        assert!((tick.price_f64() - 100.5).abs() < 1e-9);
    }
}
