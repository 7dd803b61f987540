use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::url_policy::UrlPolicy;
use crate::config::UpstreamConfig;
use crate::core::{CurrencyRateProvider, FetchError, RatePair};

const USER_AGENT: &str = concat!("foxrate/", env!("CARGO_PKG_VERSION"));

/// Fetches a single pair rate from the configured HTTP rate source.
///
/// The endpoint is called as `GET {base_url}?from=USD&to=VES` and must answer
/// 200 with either `{"rate": 36.5}` or `{"data": {"rate": 36.5}}`. There are
/// no retries here; the resolver falls back to the last-known-good rate.
pub struct UpstreamRateProvider {
    base_url: Option<String>,
    timeout: Duration,
    policy: UrlPolicy,
}

impl UpstreamRateProvider {
    pub fn new(base_url: Option<&str>, timeout: Duration, policy: UrlPolicy) -> Self {
        UpstreamRateProvider {
            base_url: base_url.map(str::to_string),
            timeout,
            policy,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        let policy = if config.allow_private_hosts {
            UrlPolicy::permissive()
        } else {
            UrlPolicy::strict()
        };
        Self::new(config.base_url.as_deref(), config.timeout(), policy)
    }

    fn request_url(&self, pair: &RatePair) -> Result<Url, FetchError> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(FetchError::NoUpstreamUrl)?;

        let mut url = Url::parse(base_url)
            .map_err(|e| FetchError::UnsafeUrl(format!("invalid URL {base_url}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("from", pair.from.as_str())
            .append_pair("to", pair.to.as_str());
        Ok(url)
    }

    async fn fetch(&self, pair: &RatePair) -> Result<f64, FetchError> {
        let url = self.request_url(pair)?;
        let pinned = self.policy.check(&url).await?;

        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .redirect(Policy::none());
        if let Some((host, addr)) = pinned {
            builder = builder.resolve(&host, addr);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {e}")))?;

        debug!("Requesting rate from {}", url);
        let response = client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read body: {e}")))?;
        parse_rate(&text)
    }
}

#[async_trait]
impl CurrencyRateProvider for UpstreamRateProvider {
    /// The timeout bounds the whole fetch, host vetting included.
    #[instrument(name = "UpstreamRateFetch", skip(self, pair), fields(pair = %pair))]
    async fn get_rate(&self, pair: &RatePair) -> Result<f64, FetchError> {
        within(self.timeout, self.fetch(pair)).await
    }
}

async fn within<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    tokio::time::timeout(timeout, fut).await.unwrap_or_else(|_| {
        Err(FetchError::Network(format!(
            "timed out after {} ms",
            timeout.as_millis()
        )))
    })
}

/// Extracts a strictly positive rate from an upstream JSON body.
pub fn parse_rate(body: &str) -> Result<f64, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody);
    }

    let json: Value = serde_json::from_str(body).map_err(|e| FetchError::BadJson(e.to_string()))?;

    let field = json
        .get("rate")
        .filter(|v| !v.is_null())
        .or_else(|| {
            json.get("data")
                .and_then(|data| data.get("rate"))
                .filter(|v| !v.is_null())
        })
        .ok_or(FetchError::MissingRateField)?;

    let rate = match field {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match rate {
        Some(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        _ => Err(FetchError::NonPositiveRate(field.to_string())),
    }
}
