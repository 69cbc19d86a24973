//! Application layer: the sync engine and the batch pipeline

pub mod dto;
pub mod pipeline;
pub mod sync;

// Re-export commonly used items
pub use dto::{BatchFailure, BatchReport, RawProduct, RoasterSeed, SiteReport, parse_batch_input};
pub use pipeline::{NoProducts, ProductSource, ScrapePipeline, build_candidate};
pub use sync::{SYSTEM_FIELDS, SyncEngine, SyncError, SyncOutcome};
