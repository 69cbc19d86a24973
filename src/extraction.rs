//! Extraction engines: pure, confidence-scored computation
//!
//! Attribute extraction and price reconciliation never touch the network
//! or the store; they take text/tags/hints in and produce values with
//! confidence scores out.

pub mod attributes;
pub mod price;

pub use attributes::extract_all;
pub use price::{
    PackInfo, PriceFlag, Reconciled, VariantPrice, derive_standard_250g, parse_weight, reconcile,
};
