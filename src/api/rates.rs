use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{
        HeaderValue,
        header::{CACHE_CONTROL, PRAGMA},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use super::AppState;
use super::error::ApiResult;
use crate::core::{Conversion, CrossRateQuote};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RateMode {
    #[default]
    Upstream,
    Cross,
}

#[derive(Debug, Deserialize)]
struct RateQuery {
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    mode: RateMode,
}

#[derive(Debug, Deserialize)]
struct ConvertQuery {
    amount: f64,
    from: String,
    to: String,
}

/// Upstream-backed rate by default; registry cross rate with `mode=cross`.
async fn get_rate(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RateQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    match query.mode {
        RateMode::Upstream => {
            let record = state
                .resolver
                .resolve(query.from.as_deref(), query.to.as_deref())
                .await?;
            Ok(Json(record).into_response())
        }
        RateMode::Cross => {
            let defaults = state.resolver.config();
            let from = non_blank(query.from).unwrap_or_else(|| defaults.default_from.to_string());
            let to = non_blank(query.to).unwrap_or_else(|| defaults.default_to.to_string());
            Ok(Json(cross_quote(&state, &from, &to).await).into_response())
        }
    }
}

/// Cross mode never fails at the HTTP level: errors travel in the body.
async fn cross_quote(state: &AppState, from: &str, to: &str) -> CrossRateQuote {
    match state.converter.cross_rate(from, to).await {
        Ok(quote) => quote,
        Err(err) => CrossRateQuote::failed(from, to, &err),
    }
}

async fn convert(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
) -> ApiResult<Json<Conversion>> {
    let Query(query) = query?;
    let conversion = state
        .converter
        .convert(query.amount, &query.from, &query.to)
        .await?;
    Ok(Json(conversion))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The payload carries its own staleness, so HTTP caches must stay out.
async fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/rate",
            get(get_rate).layer(middleware::map_response(no_store)),
        )
        .route("/convert", get(convert))
}
