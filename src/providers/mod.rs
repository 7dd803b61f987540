pub mod registry;
pub mod upstream;
pub mod url_policy;

pub use registry::StaticRegistry;
pub use upstream::UpstreamRateProvider;
pub use url_policy::UrlPolicy;
