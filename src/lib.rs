pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod providers;
pub mod store;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::AppConfig;
use crate::core::{
    CurrencyDirectory, KeyValueCollection, PairConverter, RateResolver, RegistryProvider, Store,
};
use crate::providers::{StaticRegistry, UpstreamRateProvider};
use crate::store::KeyValueStore;
use crate::store::memory::MemoryCollection;

const RATES_COLLECTION: &str = "rates";
const LAST_GOOD_COLLECTION: &str = "last_good_rates";
const CROSS_RATES_COLLECTION: &str = "cross_rates";

/// Wires the registry, the caches and the upstream client into shared state.
pub fn build_state(config: &AppConfig) -> Result<Arc<AppState>> {
    let data_path = config.default_data_path()?;
    let store = KeyValueStore::open(&data_path.join("cache"));
    if !store.can_persist() {
        warn!(
            path = %data_path.display(),
            "Durable store unavailable, last-known-good rates will not survive restarts"
        );
    }

    let rates = memory_collection(&store, RATES_COLLECTION);
    let cross_rates = memory_collection(&store, CROSS_RATES_COLLECTION);
    let last_good = store
        .get_collection(LAST_GOOD_COLLECTION, true, true)
        .unwrap_or_else(|| {
            warn!("Falling back to an in-memory last-known-good store");
            memory_collection(&store, LAST_GOOD_COLLECTION)
        });

    let registry: Option<Arc<dyn RegistryProvider>> = match &config.registry {
        Some(registry) => Some(Arc::new(StaticRegistry::from_config(registry)?)),
        None => {
            warn!("No currency registry configured");
            None
        }
    };
    let directory = CurrencyDirectory::new(registry);

    let upstream = Arc::new(UpstreamRateProvider::from_config(&config.upstream));
    if config.upstream.base_url.is_none() {
        warn!("No upstream rate URL configured, live rates will be unavailable");
    }

    let resolver = RateResolver::new(upstream, rates, last_good, config.rates.resolver_config());
    let converter = PairConverter::new(directory.clone(), cross_rates, config.rates.cross_ttl());

    info!(data_path = %data_path.display(), "Service state ready");
    Ok(Arc::new(AppState {
        directory,
        resolver,
        converter,
    }))
}

fn memory_collection(store: &KeyValueStore, name: &str) -> Arc<dyn KeyValueCollection> {
    store
        .get_collection(name, false, true)
        .unwrap_or_else(|| Arc::new(MemoryCollection::new()))
}
