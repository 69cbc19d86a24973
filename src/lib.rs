//! Roastscout - Coffee Roaster Catalog Crawling & Sync Engine
//!
//! Ingests third-party coffee roaster websites, identifies the commerce
//! platform behind them, extracts typed product and merchant attributes
//! with per-field confidence scores, reconciles package-size pricing, and
//! merges the results into a persistent store without clobbering manually
//! curated data.

// Module declarations
pub mod application;
pub mod domain;
pub mod extraction;
pub mod infrastructure;
pub mod utils;

// Re-export the main entry points
pub use application::{BatchReport, RoasterSeed, ScrapePipeline, parse_batch_input};
pub use infrastructure::{AppConfig, init_logging};
