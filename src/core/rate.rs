//! Rate records and the response shapes built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::currency::{CurrencyCode, RatePair};
use super::error::RateError;

/// Where a served rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Upstream,
    Cache,
    Stale,
    Registry,
}

/// An upstream-backed rate as served to callers.
///
/// The same record is written to the expiring cache and, on a fresh fetch,
/// to the durable last-known-good store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub rate: f64,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    /// Unix timestamp (seconds) of the upstream fetch.
    #[serde(rename = "updated")]
    pub updated_at: i64,
    #[serde(rename = "ttl")]
    pub ttl_seconds: u64,
    pub source: RateSource,
    #[serde(rename = "stale")]
    pub is_stale: bool,
    #[serde(rename = "age", default, skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
}

impl RateRecord {
    pub fn fresh(pair: &RatePair, rate: f64, now: DateTime<Utc>, ttl_seconds: u64) -> Self {
        Self {
            rate,
            from: pair.from.clone(),
            to: pair.to.clone(),
            updated_at: now.timestamp(),
            ttl_seconds,
            source: RateSource::Upstream,
            is_stale: false,
            age_seconds: None,
        }
    }

    /// Seconds since the fetch, clamped at zero for clock skew.
    pub fn age_at(&self, now: DateTime<Utc>) -> u64 {
        now.timestamp().saturating_sub(self.updated_at).max(0) as u64
    }

    pub fn served_from_cache(mut self, now: DateTime<Utc>) -> Self {
        self.age_seconds = Some(self.age_at(now));
        self.source = RateSource::Cache;
        self.is_stale = false;
        self
    }

    pub fn served_stale(mut self, now: DateTime<Utc>) -> Self {
        self.age_seconds = Some(self.age_at(now));
        self.source = RateSource::Stale;
        self.is_stale = true;
        self
    }
}

/// Registry-derived cross rate, as returned by the cross-rate mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRateQuote {
    pub mode: String,
    pub rate: f64,
    pub from: String,
    pub to: String,
    pub updated: DateTime<Utc>,
    pub source: RateSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrossRateQuote {
    pub const MODE: &'static str = "cross";

    /// A zero-rate quote carrying the error tag instead of a value.
    pub fn failed(from: &str, to: &str, error: &RateError) -> Self {
        Self {
            mode: Self::MODE.to_string(),
            rate: 0.0,
            from: from.trim().to_ascii_uppercase(),
            to: to.trim().to_ascii_uppercase(),
            updated: Utc::now(),
            source: RateSource::Registry,
            error: Some(error.tag().to_string()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.rate > 0.0
    }
}

/// Result of converting an amount between two currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub converted: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn usd_ves() -> RatePair {
        RatePair::new(
            CurrencyCode::parse("USD").unwrap(),
            CurrencyCode::parse("VES").unwrap(),
        )
    }

    #[test]
    fn test_record_wire_format() {
        let now = Utc::now();
        let record = RateRecord::fresh(&usd_ves(), 36.5, now, 300);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["rate"], 36.5);
        assert_eq!(json["from"], "USD");
        assert_eq!(json["to"], "VES");
        assert_eq!(json["updated"], now.timestamp());
        assert_eq!(json["ttl"], 300);
        assert_eq!(json["source"], "upstream");
        assert_eq!(json["stale"], false);
        assert!(json.get("age").is_none());
    }

    #[test]
    fn test_stale_record_reports_age() {
        let now = Utc::now();
        let record = RateRecord::fresh(&usd_ves(), 36.5, now - Duration::hours(2), 300);
        let stale = record.served_stale(now);

        assert_eq!(stale.source, RateSource::Stale);
        assert!(stale.is_stale);
        assert_eq!(stale.age_seconds, Some(7200));
    }

    #[test]
    fn test_age_never_negative() {
        let now = Utc::now();
        let record = RateRecord::fresh(&usd_ves(), 1.0, now + Duration::seconds(30), 300);
        assert_eq!(record.age_at(now), 0);
    }

    #[test]
    fn test_failed_quote_carries_tag() {
        let quote = CrossRateQuote::failed(" usd", "eur ", &RateError::RegistryUnavailable);
        assert_eq!(quote.rate, 0.0);
        assert_eq!(quote.from, "USD");
        assert_eq!(quote.to, "EUR");
        assert_eq!(quote.error.as_deref(), Some("registry_unavailable"));
        assert!(!quote.is_valid());

        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["mode"], "cross");
        assert_eq!(json["error"], "registry_unavailable");
    }
}
