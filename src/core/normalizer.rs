// @file: chart_gateway/src/core/normalizer.rs
// @description: Converts heterogeneous Kiwoom chart payloads into sorted canonical candles.
// @author: LAS.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use serde_json::{Map, Value};
use crate::core::models::Candle;


//
// ALIAS TABLE
//

/// Keys that may hold the item array, in priority order.
const ITEM_ARRAY_KEYS: &[&str] = &["output1", "candles"];

struct FieldAliases {
    name: &'static str,
    candidates: &'static [&'static str],
}

const TIME: FieldAliases = FieldAliases { name: "time", candidates: &["stck_bsop_date", "time", "timestamp"] };
const OPEN: FieldAliases = FieldAliases { name: "open", candidates: &["stck_oprc", "open"] };
const HIGH: FieldAliases = FieldAliases { name: "high", candidates: &["stck_hgpr", "high"] };
const LOW: FieldAliases = FieldAliases { name: "low", candidates: &["stck_lwpr", "low"] };
const CLOSE: FieldAliases = FieldAliases { name: "close", candidates: &["stck_prpr", "close"] };

// Naive forms are interpreted as UTC
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];


//
// PUBLIC INTERFACE
//

/// Extracts candles from an upstream payload.
///
/// Items that fail conversion are dropped without aborting the batch. The
/// result is stably sorted by `time`; duplicate times are kept.
pub fn extract_candles(payload: &Value) -> Vec<Candle> {
    let items: &[Value] = ITEM_ARRAY_KEYS
        .iter()
        .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut candles: Vec<Candle> = Vec::with_capacity(items.len());
    let mut rejected: usize = 0;

    for item in items {
        match normalize_candle(item) {
            Some(candle) => candles.push(candle),
            None => rejected += 1,
        }
    }

    if rejected > 0 {
        debug!("Dropped {} of {} upstream chart items", rejected, items.len());
    }

    // sort_by is stable
    candles.sort_by(|a, b| a.time.total_cmp(&b.time));
    candles
}

/// Converts one raw upstream item; `None` if any field is missing or invalid.
pub fn normalize_candle(item: &Value) -> Option<Candle> {
    let fields = item.as_object()?;

    let timestamp_ms = lookup(fields, &TIME)
        .and_then(raw_text)
        .and_then(|raw| parse_timestamp_ms(&raw))?;

    Some(Candle {
        time: timestamp_ms as f64 / 1000.0,
        open: price(fields, &OPEN)?,
        high: price(fields, &HIGH)?,
        low: price(fields, &LOW)?,
        close: price(fields, &CLOSE)?,
    })
}

/// Parses an upstream timestamp into epoch milliseconds.
///
/// `YYYYMMDD` is UTC midnight, `YYYYMMDDHHmm` is a UTC minute, anything else
/// goes through the generic date-time formats.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let normalized = raw.trim();
    if normalized.is_empty() {
        return None;
    }

    let all_digits = normalized.bytes().all(|b| b.is_ascii_digit());

    match normalized.len() {
        8 if all_digits => NaiveDate::parse_from_str(normalized, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis()),
        12 if all_digits => NaiveDateTime::parse_from_str(normalized, "%Y%m%d%H%M")
            .ok()
            .map(|dt| dt.and_utc().timestamp_millis()),
        _ => parse_generic_datetime_ms(normalized),
    }
}


//
// INTERNAL HELPERS
//

// First candidate that is present, non-null and not a blank string wins
fn lookup<'a>(fields: &'a Map<String, Value>, aliases: &FieldAliases) -> Option<&'a Value> {
    aliases.candidates.iter().find_map(|key| {
        fields.get(*key).filter(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
    })
}

fn raw_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn price(fields: &Map<String, Value>, aliases: &FieldAliases) -> Option<f64> {
    let parsed = lookup(fields, aliases).and_then(parse_finite);
    if parsed.is_none() {
        debug!("Rejecting chart item: field '{}' missing or not numeric", aliases.name);
    }
    parsed
}

fn parse_finite(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    number.is_finite().then_some(number)
}

fn parse_generic_datetime_ms(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.timestamp_millis());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
