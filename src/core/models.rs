// @file: chart_gateway/src/core/models.rs
// @description: Chart query, candle and rate-limit data structures shared across the gateway.
// @author: LAS.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::core::error::{GatewayError, GatewayResult};


//
// INTERVALS & RANGES
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ChartInterval {
    #[default]
    #[serde(rename = "1m")] OneMinute,
    #[serde(rename = "3m")] ThreeMinutes,
    #[serde(rename = "5m")] FiveMinutes,
    #[serde(rename = "15m")] FifteenMinutes,
    #[serde(rename = "30m")] ThirtyMinutes,
    #[serde(rename = "1h")] OneHour,
    #[serde(rename = "4h")] FourHours,
    #[serde(rename = "1d")] OneDay,
    #[serde(rename = "1w")] OneWeek,
}

impl ChartInterval {
    pub const ALL: [ChartInterval; 9] = [
        Self::OneMinute,
        Self::ThreeMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::OneDay,
        Self::OneWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
            Self::OneWeek => "1w",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|iv| iv.as_str() == raw)
    }

    // Unknown or missing values collapse to the shortest granularity
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChartRange {
    #[serde(rename = "1d")] OneDay,
    #[serde(rename = "5d")] FiveDays,
    #[serde(rename = "1m")] OneMonth,
    #[serde(rename = "3m")] ThreeMonths,
    #[serde(rename = "6m")] SixMonths,
    #[serde(rename = "1y")] OneYear,
}

impl ChartRange {
    pub const ALL: [ChartRange; 6] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|r| r.as_str() == raw)
    }
}

impl fmt::Display for ChartInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//
// QUERY
//

#[derive(Debug, Clone, PartialEq)]
pub struct ChartQuery {
    pub symbol: String,
    pub interval: ChartInterval,
    pub range: Option<ChartRange>,
}

impl ChartQuery {
    /// Builds a query from raw caller input.
    ///
    /// The symbol is trimmed and must not be empty. An unrecognised interval
    /// falls back to `1m` and an unrecognised range is dropped.
    pub fn from_raw(symbol: &str, interval: Option<&str>, range: Option<&str>) -> GatewayResult<Self> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(GatewayError::InvalidQuery("symbol must not be empty".to_string()));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            interval: ChartInterval::parse_or_default(interval),
            range: range.and_then(ChartRange::parse),
        })
    }
}


//
// CANDLES
//

/// One OHLC bar. `time` is seconds since the Unix epoch and may be fractional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub time: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartMetadata {
    pub count: usize,
    pub symbol: String,
    pub interval: ChartInterval,
    pub range: Option<ChartRange>,
}

/// Successful (HTTP 200) chart body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPayload {
    pub candles: Vec<Candle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChartMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}


//
// RATE LIMITING
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub admitted: bool,
    pub limit: Option<u32>,
    pub remaining: Option<i64>,
    /// Epoch milliseconds at which the current window closes.
    pub reset_at: Option<i64>,
}

impl RateLimitDecision {
    pub fn admit_unconditionally() -> Self {
        Self { admitted: true, limit: None, remaining: None, reset_at: None }
    }
}
