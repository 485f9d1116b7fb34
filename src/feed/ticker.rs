use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::exchange::decimal::{de_f64, de_opt_f64};

/// One `ticker` channel message.
#[derive(Debug, Clone, Deserialize)]
pub struct Ticker {
    pub product_id: String,
    #[serde(deserialize_with = "de_f64")]
    pub price: f64,
    pub time: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub best_bid: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub best_ask: Option<f64>,
}

impl Ticker {
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        parse_time(&self.time)
    }
}

/// Feed timestamps look like `2021-11-25T22:52:29.119195Z`.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad feed timestamp {:?}", s))?
        .with_timezone(&Utc))
}

#[derive(Debug, Clone)]
pub enum FeedMessage {
    Ticker(Ticker),
    /// Subscriptions, heartbeats and anything else, by `type`.
    Other(String),
    Error(String),
}

pub fn parse_message(text: &str) -> Result<FeedMessage> {
    let value: Value = serde_json::from_str(text).context("feed message is not JSON")?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    match kind.as_str() {
        "ticker" => Ok(FeedMessage::Ticker(serde_json::from_value(value).context("bad ticker message")?)),
        "error" => {
            let msg = value.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            let reason = value.get("reason").and_then(Value::as_str).unwrap_or_default();
            Ok(FeedMessage::Error(format!("{} {}", msg, reason).trim().to_string()))
        }
        _ => Ok(FeedMessage::Other(kind)),
    }
}

pub fn subscribe_message(products: &[String]) -> String {
    json!({
        "type": "subscribe",
        "product_ids": products,
        "channels": ["ticker"],
    })
    .to_string()
}

/// Prices against seconds since the first tick of the session.
#[derive(Debug, Clone, Default)]
pub struct TickerSeries {
    start: Option<DateTime<Utc>>,
    times: Vec<f64>,
    prices: Vec<f64>,
}

impl TickerSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tick and return its `(t, price)` point.
    pub fn push(&mut self, ticker: &Ticker) -> Result<(f64, f64)> {
        let ts = ticker.timestamp()?;
        let start = *self.start.get_or_insert(ts);
        let t = (ts - start).num_microseconds().unwrap_or(0) as f64 / 1e6;
        self.times.push(t);
        self.prices.push(ticker.price);
        Ok((t, ticker.price))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.prices.iter().copied())
    }

    pub fn min_price(&self) -> Option<f64> {
        self.prices.iter().copied().min_by(|a, b| a.total_cmp(b))
    }

    pub fn max_price(&self) -> Option<f64> {
        self.prices.iter().copied().max_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(price: &str, time: &str) -> Ticker {
        let raw = format!(
            r#"{{"type":"ticker","sequence":1,"product_id":"ETH-USD","price":"{}","best_bid":"1.0","best_ask":"2.0","time":"{}"}}"#,
            price, time
        );
        match parse_message(&raw).unwrap() {
            FeedMessage::Ticker(t) => t,
            other => panic!("expected ticker, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ticker() {
        let t = tick("4305.12", "2021-11-25T22:52:29.119195Z");
        assert_eq!(t.product_id, "ETH-USD");
        assert_eq!(t.price, 4305.12);
        assert_eq!(t.best_ask, Some(2.0));
    }

    #[test]
    fn test_parse_other_and_error() {
        assert!(matches!(
            parse_message(r#"{"type":"subscriptions","channels":[]}"#).unwrap(),
            FeedMessage::Other(k) if k == "subscriptions"
        ));
        assert!(matches!(
            parse_message(r#"{"type":"error","message":"Failed to subscribe","reason":"BAD-PAIR is not a valid product"}"#).unwrap(),
            FeedMessage::Error(m) if m == "Failed to subscribe BAD-PAIR is not a valid product"
        ));
        assert!(parse_message("not json").is_err());
    }

    #[test]
    fn test_subscribe_message() {
        let msg: Value = serde_json::from_str(&subscribe_message(&["ETH-USD".to_string()])).unwrap();
        assert_eq!(msg["type"], "subscribe");
        assert_eq!(msg["product_ids"][0], "ETH-USD");
        assert_eq!(msg["channels"][0], "ticker");
    }

    #[test]
    fn test_series_times_relative_to_first_tick() {
        let mut series = TickerSeries::new();
        assert_eq!(series.push(&tick("100.0", "2021-11-25T22:52:29.000000Z")).unwrap(), (0.0, 100.0));
        assert_eq!(series.push(&tick("101.5", "2021-11-25T22:52:30.500000Z")).unwrap(), (1.5, 101.5));
        assert_eq!(series.push(&tick("99.0", "2021-11-25T22:52:31.000000Z")).unwrap(), (2.0, 99.0));
        assert_eq!(series.len(), 3);
        assert_eq!(series.min_price(), Some(99.0));
        assert_eq!(series.max_price(), Some(101.5));
        assert_eq!(series.points().last(), Some((2.0, 99.0)));
    }
}
