//! Currency registry capability and the queries built on top of it

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::currency::CurrencyCode;
use super::error::RateError;

/// A statically configured currency and its rate against the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyEntry {
    pub code: CurrencyCode,
    /// Units of this currency per one unit of the base currency.
    pub rate: f64,
    pub symbol: String,
    pub position: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

/// Read-only access to the currency definitions of the surrounding system.
#[async_trait]
pub trait RegistryProvider: Send + Sync {
    async fn currencies(&self) -> BTreeMap<CurrencyCode, CurrencyEntry>;

    async fn lookup(&self, code: &CurrencyCode) -> Option<CurrencyEntry> {
        self.currencies().await.remove(code)
    }

    /// The currency whose unit rate is 1 by definition.
    fn base(&self) -> CurrencyCode;
}

/// Registry queries that tell "not loaded" apart from "not found".
#[derive(Clone, Default)]
pub struct CurrencyDirectory {
    provider: Option<Arc<dyn RegistryProvider>>,
}

impl CurrencyDirectory {
    pub fn new(provider: Option<Arc<dyn RegistryProvider>>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> Result<&Arc<dyn RegistryProvider>, RateError> {
        self.provider.as_ref().ok_or(RateError::RegistryUnavailable)
    }

    pub fn status(&self) -> Result<(), RateError> {
        self.provider().map(|_| ())
    }

    pub async fn list_all(&self) -> Result<BTreeMap<CurrencyCode, CurrencyEntry>, RateError> {
        Ok(self.provider()?.currencies().await)
    }

    pub async fn get(&self, code: &str) -> Result<CurrencyEntry, RateError> {
        let provider = self.provider()?;
        let normalized = code.trim().to_ascii_uppercase();
        let code = CurrencyCode::parse(&normalized).map_err(|_| RateError::NotFound(normalized))?;
        provider
            .lookup(&code)
            .await
            .ok_or_else(|| RateError::NotFound(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::registry::StaticRegistry;

    fn directory() -> CurrencyDirectory {
        let registry = StaticRegistry::from_rates("USD", &[("USD", 1.0), ("EUR", 0.85)]).unwrap();
        CurrencyDirectory::new(Some(Arc::new(registry)))
    }

    #[tokio::test]
    async fn test_get_is_case_insensitive() {
        let entry = directory().get("eur").await.unwrap();
        assert_eq!(entry.code.as_str(), "EUR");
        assert_eq!(entry.rate, 0.85);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        assert_eq!(
            directory().get("xyz").await,
            Err(RateError::NotFound("XYZ".to_string()))
        );
        assert_eq!(
            directory().get("not-a-code").await,
            Err(RateError::NotFound("NOT-A-CODE".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_registry_is_distinct_from_not_found() {
        let empty = CurrencyDirectory::default();
        assert_eq!(empty.status(), Err(RateError::RegistryUnavailable));
        assert_eq!(empty.get("USD").await, Err(RateError::RegistryUnavailable));
        assert_eq!(empty.list_all().await, Err(RateError::RegistryUnavailable));
    }

    #[tokio::test]
    async fn test_list_all() {
        let all = directory().list_all().await.unwrap();
        let codes: Vec<_> = all.keys().map(CurrencyCode::as_str).collect();
        assert_eq!(codes, vec!["EUR", "USD"]);
    }
}
