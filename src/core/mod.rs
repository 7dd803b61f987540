//! Core business logic: rate resolution, cross rates and the registry

pub mod cache;
pub mod converter;
pub mod currency;
pub mod error;
pub mod log;
pub mod rate;
pub mod registry;
pub mod resolver;

// Re-export main types for cleaner imports
pub use cache::{KeyValueCollection, Store};
pub use converter::PairConverter;
pub use currency::{CurrencyCode, CurrencyRateProvider, RatePair};
pub use error::{FetchError, RateError};
pub use rate::{Conversion, CrossRateQuote, RateRecord, RateSource};
pub use registry::{CurrencyDirectory, CurrencyEntry, RegistryProvider};
pub use resolver::{RateResolver, ResolverConfig};
