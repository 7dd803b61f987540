//! Registry-backed cross rates and amount conversion

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::cache::{KeyValueCollection, get_json, put_json};
use super::currency::CurrencyCode;
use super::error::RateError;
use super::rate::{Conversion, CrossRateQuote, RateSource};
use super::registry::{CurrencyDirectory, RegistryProvider};

pub struct PairConverter {
    directory: CurrencyDirectory,
    cache: Arc<dyn KeyValueCollection>,
    ttl: Duration,
}

impl PairConverter {
    pub fn new(
        directory: CurrencyDirectory,
        cache: Arc<dyn KeyValueCollection>,
        ttl: Duration,
    ) -> Self {
        Self {
            directory,
            cache,
            ttl,
        }
    }

    /// Cross rate `unit(to) / unit(from)` from registry unit rates.
    ///
    /// Quotes are cached per resolved pair for the converter TTL whether or
    /// not they are valid, so repeated bad lookups stay cheap under load.
    #[instrument(name = "CrossRate", skip(self))]
    pub async fn cross_rate(&self, from: &str, to: &str) -> Result<CrossRateQuote, RateError> {
        let registry = self.directory.provider()?;
        let from = resolve_code(registry.as_ref(), from).await;
        let to = resolve_code(registry.as_ref(), to).await;
        let key = format!("{from}_{to}");

        if let Some(mut quote) = get_json::<CrossRateQuote>(self.cache.as_ref(), &key).await {
            quote.source = RateSource::Cache;
            return Ok(quote);
        }

        let from_rate = unit_rate(registry.as_ref(), &from).await;
        let to_rate = unit_rate(registry.as_ref(), &to).await;
        let rate = to_rate / from_rate;

        let mut quote = CrossRateQuote {
            mode: CrossRateQuote::MODE.to_string(),
            rate,
            from,
            to,
            updated: Utc::now(),
            source: RateSource::Registry,
            error: None,
        };
        if from_rate <= 0.0 || to_rate <= 0.0 || !rate.is_finite() {
            warn!(
                from = %quote.from,
                to = %quote.to,
                from_rate,
                to_rate,
                "Cannot compute cross rate"
            );
            quote.rate = 0.0;
            quote.error = Some(RateError::InvalidCurrencyRate.tag().to_string());
        }

        put_json(self.cache.as_ref(), &key, &quote, Some(self.ttl)).await;
        debug!(key, rate = quote.rate, "Computed cross rate");
        Ok(quote)
    }

    /// Converts `amount` at the cross rate. An invalid cross rate converts to 0.
    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, RateError> {
        if !amount.is_finite() {
            return Err(RateError::InvalidAmount);
        }
        let quote = self.cross_rate(from, to).await?;
        Ok(Conversion {
            amount,
            converted: amount * quote.rate,
            from: quote.from,
            to: quote.to,
        })
    }
}

/// Uppercases `raw` and swaps in its alias when only the alias is registered.
async fn resolve_code(registry: &dyn RegistryProvider, raw: &str) -> String {
    let requested = raw.trim().to_ascii_uppercase();
    let Ok(code) = CurrencyCode::parse(&requested) else {
        return requested;
    };
    if registry.lookup(&code).await.is_some() {
        return requested;
    }
    match code.alias() {
        Some(alias) if registry.lookup(&alias).await.is_some() => {
            debug!(requested = %code, resolved = %alias, "Resolved currency alias");
            alias.to_string()
        }
        _ => requested,
    }
}

/// 1.0 for the base currency, the registry rate otherwise, 0.0 when unknown.
async fn unit_rate(registry: &dyn RegistryProvider, code: &str) -> f64 {
    let Ok(code) = CurrencyCode::parse(code) else {
        return 0.0;
    };
    if code == registry.base() {
        return 1.0;
    }
    registry
        .lookup(&code)
        .await
        .map_or(0.0, |entry| entry.rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::CurrencyEntry;
    use crate::providers::registry::StaticRegistry;
    use crate::store::memory::MemoryCollection;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn converter_with(registry: StaticRegistry) -> PairConverter {
        PairConverter::new(
            CurrencyDirectory::new(Some(Arc::new(registry))),
            Arc::new(MemoryCollection::new()),
            Duration::from_secs(60),
        )
    }

    fn usd_eur() -> PairConverter {
        converter_with(StaticRegistry::from_rates("USD", &[("USD", 1.0), ("EUR", 0.85)]).unwrap())
    }

    #[tokio::test]
    async fn test_convert_usd_to_eur() {
        let conversion = usd_eur().convert(100.0, "usd", "eur").await.unwrap();
        assert!((conversion.converted - 85.0).abs() < 1e-9);
        assert_eq!(conversion.from, "USD");
        assert_eq!(conversion.to, "EUR");
        assert_eq!(conversion.amount, 100.0);
    }

    #[tokio::test]
    async fn test_cross_rate_eur_to_usd() {
        let quote = usd_eur().cross_rate("EUR", "USD").await.unwrap();
        assert!((quote.rate - 1.0 / 0.85).abs() < 1e-9);
        assert!((quote.rate - 1.176).abs() < 1e-3);
        assert_eq!(quote.mode, "cross");
        assert_eq!(quote.source, RateSource::Registry);
        assert!(quote.error.is_none());
    }

    #[tokio::test]
    async fn test_cross_rate_is_symmetric() {
        let converter = converter_with(
            StaticRegistry::from_rates(
                "USD",
                &[("USD", 1.0), ("EUR", 0.85), ("GBP", 0.79), ("VES", 36.5)],
            )
            .unwrap(),
        );
        let codes = ["USD", "EUR", "GBP", "VES"];
        for a in codes {
            for b in codes {
                let ab = converter.cross_rate(a, b).await.unwrap().rate;
                let ba = converter.cross_rate(b, a).await.unwrap().rate;
                assert!((ab * ba - 1.0).abs() < 1e-9, "{a}/{b}: {ab} * {ba}");
            }
        }
    }

    #[tokio::test]
    async fn test_base_currency_unit_rate_is_one() {
        // A misconfigured base rate must not leak into cross rates.
        let converter =
            converter_with(StaticRegistry::from_rates("USD", &[("USD", 2.0), ("EUR", 0.85)]).unwrap());
        let quote = converter.cross_rate("USD", "EUR").await.unwrap();
        assert!((quote.rate - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_alias_is_resolved_and_reported() {
        let converter =
            converter_with(StaticRegistry::from_rates("USD", &[("USD", 1.0), ("VEF", 36.5)]).unwrap());

        let quote = converter.cross_rate("USD", "VES").await.unwrap();
        assert_eq!(quote.to, "VEF");
        assert!((quote.rate - 36.5).abs() < 1e-9);

        let conversion = converter.convert(2.0, "ves", "usd").await.unwrap();
        assert_eq!(conversion.from, "VEF");
        assert!((conversion.converted - 2.0 / 36.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_alias_not_used_when_requested_code_exists() {
        let converter = converter_with(
            StaticRegistry::from_rates("USD", &[("USD", 1.0), ("VES", 40.0), ("VEF", 36.5)])
                .unwrap(),
        );
        let quote = converter.cross_rate("USD", "VES").await.unwrap();
        assert_eq!(quote.to, "VES");
        assert!((quote.rate - 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unknown_or_zero_rate_is_invalid() {
        let converter =
            converter_with(StaticRegistry::from_rates("USD", &[("USD", 1.0), ("ARS", 0.0)]).unwrap());

        let zero = converter.cross_rate("USD", "ARS").await.unwrap();
        assert_eq!(zero.rate, 0.0);
        assert_eq!(zero.error.as_deref(), Some("invalid_currency_rate"));
        assert!(!zero.is_valid());

        let unknown = converter.cross_rate("XYZ", "USD").await.unwrap();
        assert_eq!(unknown.rate, 0.0);
        assert_eq!(unknown.error.as_deref(), Some("invalid_currency_rate"));

        let garbage = converter.cross_rate("u$d", "USD").await.unwrap();
        assert_eq!(garbage.from, "U$D");
        assert_eq!(garbage.error.as_deref(), Some("invalid_currency_rate"));

        let conversion = converter.convert(10.0, "XYZ", "USD").await.unwrap();
        assert_eq!(conversion.converted, 0.0);
    }

    #[tokio::test]
    async fn test_missing_registry_is_unavailable() {
        let converter = PairConverter::new(
            CurrencyDirectory::default(),
            Arc::new(MemoryCollection::new()),
            Duration::from_secs(60),
        );
        assert_eq!(
            converter.cross_rate("USD", "EUR").await,
            Err(RateError::RegistryUnavailable)
        );
        assert_eq!(
            converter.convert(1.0, "USD", "EUR").await,
            Err(RateError::RegistryUnavailable)
        );
    }

    #[tokio::test]
    async fn test_non_finite_amount_is_rejected() {
        assert_eq!(
            usd_eur().convert(f64::NAN, "USD", "EUR").await,
            Err(RateError::InvalidAmount)
        );
    }

    struct CountingRegistry {
        inner: StaticRegistry,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl RegistryProvider for CountingRegistry {
        async fn currencies(&self) -> BTreeMap<CurrencyCode, CurrencyEntry> {
            self.inner.currencies().await
        }

        async fn lookup(&self, code: &CurrencyCode) -> Option<CurrencyEntry> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(code).await
        }

        fn base(&self) -> CurrencyCode {
            self.inner.base()
        }
    }

    #[tokio::test]
    async fn test_failed_quotes_are_cached_too() {
        let registry = Arc::new(CountingRegistry {
            inner: StaticRegistry::from_rates("USD", &[("USD", 1.0)]).unwrap(),
            lookups: AtomicUsize::new(0),
        });
        let converter = PairConverter::new(
            CurrencyDirectory::new(Some(registry.clone())),
            Arc::new(MemoryCollection::new()),
            Duration::from_secs(60),
        );

        let first = converter.cross_rate("USD", "XYZ").await.unwrap();
        assert_eq!(first.source, RateSource::Registry);
        let after_first = registry.lookups.load(Ordering::SeqCst);

        let second = converter.cross_rate("USD", "XYZ").await.unwrap();
        assert_eq!(second.source, RateSource::Cache);
        assert_eq!(second.error.as_deref(), Some("invalid_currency_rate"));
        assert_eq!(second.updated, first.updated);

        // A cache hit only resolves codes, it never recomputes unit rates.
        let per_hit = registry.lookups.load(Ordering::SeqCst) - after_first;
        assert!(per_hit < after_first);
    }
}
