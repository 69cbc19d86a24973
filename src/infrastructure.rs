//! Infrastructure layer: network, cache, store, and external integrations

pub mod cache;
pub mod config;
pub mod enrichment;
pub mod fetcher;
pub mod logging;
pub mod platform_detector;
pub mod rate_limiter;
pub mod store;

// Re-export commonly used items
pub use cache::{CacheNamespace, ScraperCache};
pub use config::AppConfig;
pub use enrichment::EnrichmentClient;
pub use fetcher::{FetchError, FetchOptions, FetchedPage, Fetcher};
pub use logging::{init_logging, init_logging_with_config};
pub use platform_detector::{PlatformDetector, classify};
pub use rate_limiter::{HostLimiters, HostRateLimiter};
pub use store::{MemoryStore, Record, RecordKind, RecordStore, SqliteStore, StoreError};
