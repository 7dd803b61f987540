//! Upstream-backed rate resolution with TTL caching and stale fallback.
//!
//! For a pair the resolver serves, in order of preference:
//!
//! 1. an unexpired record from the expiring cache (no network I/O),
//! 2. a fresh upstream rate, which is then written to the cache and to the
//!    durable last-known-good store,
//! 3. the last-known-good record, if the fetch failed and the record is no
//!    older than the staleness ceiling.
//!
//! Anything else is [`RateError::Unavailable`]. The failure path never writes.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::cache::{KeyValueCollection, get_json, put_json};
use super::currency::{CurrencyCode, CurrencyRateProvider, RatePair};
use super::error::RateError;
use super::rate::RateRecord;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a fresh upstream rate is served from cache.
    pub ttl: Duration,
    /// Oldest last-known-good record still usable as a fallback.
    pub stale_ceiling: Duration,
    pub default_from: CurrencyCode,
    pub default_to: CurrencyCode,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            stale_ceiling: Duration::from_secs(24 * 60 * 60),
            default_from: CurrencyCode::usd(),
            default_to: CurrencyCode::ves(),
        }
    }
}

type FlightLock = Arc<tokio::sync::Mutex<()>>;
type FlightMap = Mutex<HashMap<RatePair, FlightLock>>;

/// Membership in a pair's in-flight group. Leaving, including by
/// cancellation, drops the map entry once no other member remains.
struct Flight<'a> {
    in_flight: &'a FlightMap,
    pair: RatePair,
    lock: Option<FlightLock>,
}

impl<'a> Flight<'a> {
    fn join(in_flight: &'a FlightMap, pair: &RatePair) -> Self {
        let lock = Arc::clone(
            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(pair.clone())
                .or_default(),
        );
        Self {
            in_flight,
            pair: pair.clone(),
            lock: Some(lock),
        }
    }

    async fn acquire(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this handle remain: nobody else is waiting.
        let idle = Arc::strong_count(&lock) == 2;
        drop(lock);
        if idle {
            in_flight.remove(&self.pair);
        }
    }
}

pub struct RateResolver {
    provider: Arc<dyn CurrencyRateProvider>,
    cache: Arc<dyn KeyValueCollection>,
    last_good: Arc<dyn KeyValueCollection>,
    config: ResolverConfig,
    in_flight: FlightMap,
}

impl RateResolver {
    pub fn new(
        provider: Arc<dyn CurrencyRateProvider>,
        cache: Arc<dyn KeyValueCollection>,
        last_good: Arc<dyn KeyValueCollection>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            last_good,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Builds the pair for a request, applying defaults to absent or blank codes.
    pub fn pair_for(&self, from: Option<&str>, to: Option<&str>) -> Result<RatePair, RateError> {
        let code = |raw: Option<&str>, default: &CurrencyCode| match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => CurrencyCode::parse(raw),
            _ => Ok(default.clone()),
        };
        Ok(RatePair::new(
            code(from, &self.config.default_from)?,
            code(to, &self.config.default_to)?,
        ))
    }

    #[instrument(name = "RateResolve", skip(self))]
    pub async fn resolve(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<RateRecord, RateError> {
        let pair = self.pair_for(from, to)?;
        let key = pair.storage_key();

        if let Some(record) = self.cached(&key).await {
            return Ok(record);
        }

        // Concurrent misses for one pair share a single upstream call, and
        // writes for a pair are serialized behind the same lock.
        let flight = Flight::join(&self.in_flight, &pair);
        let _held = flight.acquire().await;
        match self.cached(&key).await {
            Some(record) => Ok(record),
            None => self.refresh(&pair, &key).await,
        }
    }

    async fn cached(&self, key: &str) -> Option<RateRecord> {
        let record: RateRecord = get_json(self.cache.as_ref(), key).await?;
        debug!(key, "Serving rate from cache");
        Some(record.served_from_cache(Utc::now()))
    }

    async fn refresh(&self, pair: &RatePair, key: &str) -> Result<RateRecord, RateError> {
        match self.provider.get_rate(pair).await {
            Ok(rate) => {
                let record =
                    RateRecord::fresh(pair, rate, Utc::now(), self.config.ttl.as_secs());
                put_json(self.cache.as_ref(), key, &record, Some(self.config.ttl)).await;
                put_json(self.last_good.as_ref(), key, &record, None).await;
                info!(%pair, rate, "Fetched fresh upstream rate");
                Ok(record)
            }
            Err(e) => {
                warn!(%pair, kind = e.kind(), error = %e, "Upstream fetch failed");
                self.stale_fallback(pair, key).await
            }
        }
    }

    async fn stale_fallback(&self, pair: &RatePair, key: &str) -> Result<RateRecord, RateError> {
        let Some(record) = get_json::<RateRecord>(self.last_good.as_ref(), key).await else {
            warn!(%pair, "No last-known-good rate to fall back to");
            return Err(RateError::Unavailable);
        };

        let now = Utc::now();
        let age = record.age_at(now);
        if age > self.config.stale_ceiling.as_secs() {
            warn!(%pair, age, "Last-known-good rate is too old to serve");
            return Err(RateError::Unavailable);
        }

        warn!(%pair, age, "Serving stale last-known-good rate");
        Ok(record.served_stale(now))
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
