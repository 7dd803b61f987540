use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

use super::AppState;
use super::error::ApiResult;
use crate::core::{CurrencyCode, CurrencyEntry};

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    message: &'static str,
}

/// All registry currencies keyed by code.
async fn list_currencies(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BTreeMap<CurrencyCode, CurrencyEntry>>> {
    Ok(Json(state.directory.list_all().await?))
}

async fn get_currency(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<CurrencyEntry>> {
    Ok(Json(state.directory.get(&code).await?))
}

async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusBody>> {
    state.directory.status()?;
    Ok(Json(StatusBody {
        status: "OK",
        message: "registry is loaded",
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/currencies", get(list_currencies))
        .route("/currency/{code}", get(get_currency))
        .route("/status", get(status))
}
