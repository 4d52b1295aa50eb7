//! Exchange wire codec: combined-stream envelope, per-event decoders, and the outbound
//! subscription frame.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::error::IngestError;
use crate::models::Tick;

const QUOTE_SUFFIXES: [&str; 2] = ["USDT", "BUSD"];

/// Strip a trailing quote-currency suffix from an exchange symbol (`BTCUSDT` → `BTC`).
pub fn clean(symbol: &str) -> String {
    let upper = symbol.to_ascii_uppercase();
    for suffix in QUOTE_SUFFIXES {
        if let Some(stripped) = upper.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    upper
}

fn epoch_ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

fn decimal_field(value: &Value, field: &str) -> Result<Decimal, IngestError> {
    let raw = value
        .get(field)
        .ok_or_else(|| IngestError::Decode(format!("missing field `{field}`")))?;
    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => return Err(IngestError::Decode(format!("field `{field}` is not numeric: {other}"))),
    };
    Decimal::from_str(&text).map_err(|e| IngestError::Decode(format!("bad decimal in `{field}`: {e}")))
}

fn optional_decimal_field(value: &Value, field: &str) -> Option<Decimal> {
    decimal_field(value, field).ok()
}

fn u64_field(value: &Value, field: &str) -> Result<u64, IngestError> {
    let raw = decimal_field(value, field)?;
    Ok(raw.trunc().abs().to_string().parse().unwrap_or(0))
}

fn i64_field(value: &Value, field: &str) -> Result<i64, IngestError> {
    value
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| IngestError::Decode(format!("missing integer field `{field}`")))
}

fn decode_24hr_ticker(event: &Value) -> Result<Tick, IngestError> {
    let symbol = event
        .get("s")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::Decode("24hrTicker missing `s`".to_string()))?;

    Ok(Tick {
        symbol: clean(symbol),
        price: decimal_field(event, "c")?,
        volume: u64_field(event, "v")?,
        timestamp: epoch_ms_to_datetime(i64_field(event, "E")?),
        exchange: "binance".to_string(),
        open: optional_decimal_field(event, "o"),
        high: optional_decimal_field(event, "h"),
        low: optional_decimal_field(event, "l"),
    })
}

fn decode_trade(event: &Value) -> Result<Tick, IngestError> {
    let symbol = event
        .get("s")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::Decode("trade missing `s`".to_string()))?;

    Ok(Tick {
        symbol: clean(symbol),
        price: decimal_field(event, "p")?,
        volume: u64_field(event, "q")?,
        timestamp: epoch_ms_to_datetime(i64_field(event, "T")?),
        exchange: "binance".to_string(),
        open: None,
        high: None,
        low: None,
    })
}

fn decode_kline(event: &Value) -> Result<Tick, IngestError> {
    let symbol = event
        .get("s")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::Decode("kline missing `s`".to_string()))?;
    let k = event
        .get("k")
        .ok_or_else(|| IngestError::Decode("kline missing `k`".to_string()))?;

    Ok(Tick {
        symbol: clean(symbol),
        price: decimal_field(k, "c")?,
        volume: u64_field(k, "v")?,
        timestamp: epoch_ms_to_datetime(i64_field(k, "T")?),
        exchange: "binance".to_string(),
        open: optional_decimal_field(k, "o"),
        high: optional_decimal_field(k, "h"),
        low: optional_decimal_field(k, "l"),
    })
}

/// Parse one inbound frame (combined-stream envelope or a bare event) into a [`Tick`].
/// Returns `Err(IngestError::UnknownEventKind)` for an event kind this decoder doesn't
/// support; the caller drops the frame and keeps the stream open.
pub fn decode_frame(raw: &str) -> Result<Tick, IngestError> {
    let parsed: Value = serde_json::from_str(raw).map_err(|e| IngestError::Decode(e.to_string()))?;

    let event = match parsed.get("data") {
        Some(data) => data,
        None => &parsed,
    };

    let kind = event
        .get("e")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::Decode("frame has no event discriminator `e`".to_string()))?;

    match kind {
        "24hrTicker" => decode_24hr_ticker(event),
        "trade" => decode_trade(event),
        "kline" => decode_kline(event),
        other => Err(IngestError::UnknownEventKind(other.to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct SubscribeAck {
    result: Option<Value>,
    id: u64,
}

/// Build the outbound `SUBSCRIBE` frame for a set of lowercase exchange symbols, requesting
/// the `@ticker` stream for each.
pub fn subscribe_frame(symbols: &[String]) -> String {
    let params: Vec<String> = symbols.iter().map(|s| format!("{s}@ticker")).collect();
    serde_json::json!({
        "method": "SUBSCRIBE",
        "params": params,
        "id": 1,
    })
    .to_string()
}

/// `true` for frames that are subscription acknowledgements rather than market data, so the
/// caller can distinguish them from a decode failure.
pub fn is_subscribe_ack(raw: &str) -> bool {
    serde_json::from_str::<SubscribeAck>(raw).is_ok()
}
