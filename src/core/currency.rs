//! Currency codes, pairs and the upstream rate abstraction

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::error::{FetchError, RateError};

/// An uppercase, alphabetic currency code of 2 to 5 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses a code case-insensitively, normalizing it to uppercase.
    pub fn parse(raw: &str) -> Result<Self, RateError> {
        let code = raw.trim();
        if (2..=5).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(RateError::InvalidCurrencyCode(raw.to_string()))
        }
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn ves() -> Self {
        Self("VES".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The legacy redenomination counterpart of this code, if it has one.
    pub fn alias(&self) -> Option<CurrencyCode> {
        match self.0.as_str() {
            "VES" => Some(Self("VEF".to_string())),
            "VEF" => Some(Self("VES".to_string())),
            _ => None,
        }
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// An ordered `(from, to)` currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RatePair {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

impl RatePair {
    pub fn new(from: CurrencyCode, to: CurrencyCode) -> Self {
        Self { from, to }
    }

    /// Key under which records for this pair are stored.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }
}

impl Display for RatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// A source of live rates for a currency pair.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Returns a validated, strictly positive rate for `pair`.
    async fn get_rate(&self, pair: &RatePair) -> Result<f64, FetchError>;
}
