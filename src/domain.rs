//! Domain module - Core business entities and value objects
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod confidence;
pub mod entities;
pub mod platform;
pub mod stability;
pub mod value_objects;
pub mod weight;

// Re-export commonly used items for convenience
pub use confidence::{ConfidenceMap, LOW_CONFIDENCE};
pub use entities::{Coffee, ExternalLink, Roaster};
pub use platform::{PLATFORM_CONFIDENCE_THRESHOLD, Platform, Site};
pub use stability::{
    EntityKind, FieldStability, coffee_field_stability, roaster_field_stability,
    should_update_field,
};
pub use value_objects::{BeanType, ProcessMethod, RoastLevel};
pub use weight::{PriceTable, WeightClass, price_per_gram};
