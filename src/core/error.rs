//! Error types shared by the rate core.

use thiserror::Error;

/// Why a single upstream fetch did not produce a usable rate.
///
/// Every variant ends up as the same "unavailable" decision in the resolver;
/// the kinds only exist so operators can tell failures apart in the logs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("No upstream URL configured")]
    NoUpstreamUrl,

    #[error("Refusing unsafe upstream URL: {0}")]
    UnsafeUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned HTTP {0}")]
    BadStatus(u16),

    #[error("Upstream returned an empty body")]
    EmptyBody,

    #[error("Upstream returned invalid JSON: {0}")]
    BadJson(String),

    #[error("Upstream response has neither `rate` nor `data.rate`")]
    MissingRateField,

    #[error("Upstream rate is not a positive number: {0}")]
    NonPositiveRate(String),
}

impl FetchError {
    /// Stable tag for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NoUpstreamUrl => "no_upstream_url",
            FetchError::UnsafeUrl(_) => "unsafe_url",
            FetchError::Network(_) => "network_error",
            FetchError::BadStatus(_) => "bad_status",
            FetchError::EmptyBody => "empty_body",
            FetchError::BadJson(_) => "bad_json",
            FetchError::MissingRateField => "missing_rate_field",
            FetchError::NonPositiveRate(_) => "non_positive_rate",
        }
    }
}

/// Errors surfaced by the resolver, converter and registry queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    /// The currency registry collaborator was not supplied.
    #[error("Currency registry is not loaded")]
    RegistryUnavailable,

    #[error("Currency \"{0}\" not found")]
    NotFound(String),

    /// Fresh fetch failed and no usable last-known-good rate exists.
    #[error("Upstream rate source is unavailable")]
    Unavailable,

    #[error("Currency rate is not positive")]
    InvalidCurrencyRate,

    #[error("Invalid currency code: \"{0}\"")]
    InvalidCurrencyCode(String),

    #[error("Amount must be a finite number")]
    InvalidAmount,
}

impl RateError {
    /// Error tag used in response bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            RateError::RegistryUnavailable => "registry_unavailable",
            RateError::NotFound(_) => "currency_not_found",
            RateError::Unavailable => "upstream_unavailable",
            RateError::InvalidCurrencyRate => "invalid_currency_rate",
            RateError::InvalidCurrencyCode(_) => "invalid_currency_code",
            RateError::InvalidAmount => "invalid_amount",
        }
    }
}
