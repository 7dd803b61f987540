//! HTTP surface: registry lookups, live rates and conversion.

pub mod currencies;
pub mod error;
pub mod rates;

use std::sync::Arc;

use axum::Router;

use crate::core::{CurrencyDirectory, PairConverter, RateResolver};

/// Prefix under which every route is also mounted.
pub const API_PREFIX: &str = "/fox-rate/v1";

pub struct AppState {
    pub directory: CurrencyDirectory,
    pub resolver: RateResolver,
    pub converter: PairConverter,
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(currencies::router())
        .merge(rates::router())
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes())
        .nest(API_PREFIX, routes())
        .with_state(state)
}
