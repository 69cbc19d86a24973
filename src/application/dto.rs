//! Data transfer types at the pipeline boundary
//!
//! `RawProduct` is the loosely-typed record the (external) platform
//! scrapers hand over; every field may be missing and the engines treat
//! absence as unknown. Batch input arrives as a single name/url pair or a
//! CSV-like list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::platform::Platform;
use crate::extraction::price::VariantPrice;

/// Raw candidate record from platform-specific extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProduct {
    pub name: String,
    pub description: Option<String>,
    pub product_type: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    /// Ordered product tags.
    pub tags: Vec<String>,
    /// Known-attribute-name to raw value, from platform metadata.
    pub structured_hints: HashMap<String, Value>,
    pub variant_prices: Vec<VariantPrice>,
}

impl RawProduct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One crawl target: a roaster name and site URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoasterSeed {
    pub name: String,
    pub url: String,
}

impl RoasterSeed {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Parse batch input: either a single `name,url` pair or a CSV-like list
/// with one pair per line. A leading `name,url` header and empty or
/// commented lines are skipped; lines without a comma are ignored.
pub fn parse_batch_input(input: &str) -> Vec<RoasterSeed> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| !line.eq_ignore_ascii_case("name,url"))
        .filter_map(|line| {
            let (name, url) = line.split_once(',')?;
            let name = name.trim().trim_matches('"');
            let url = url.trim().trim_matches('"');
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(RoasterSeed::new(name, url))
        })
        .collect()
}

/// Per-item failure in a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub name: String,
    pub url: String,
    pub error: String,
}

/// Outcome of processing one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteReport {
    pub name: String,
    pub url: String,
    pub platform: Platform,
    pub platform_confidence: u8,
    pub roaster_id: String,
    pub products_synced: usize,
    pub products_skipped: usize,
}

/// Batch outcome: successes and failures side by side. Partial success is
/// the normal case, not an exception.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<SiteReport>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pair_parses() {
        let seeds = parse_batch_input("Blue Tokai,https://bluetokaicoffee.com");
        assert_eq!(
            seeds,
            vec![RoasterSeed::new("Blue Tokai", "https://bluetokaicoffee.com")]
        );
    }

    #[test]
    fn csv_list_with_header_and_comments() {
        let input = "name,url\n# staging\nBlue Tokai,https://bluetokaicoffee.com\n\n\"Corridor Seven\",https://corridorseven.coffee\nmalformed line\n";
        let seeds = parse_batch_input(input);
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].name, "Corridor Seven");
    }

    #[test]
    fn raw_product_tolerates_missing_fields() {
        let raw: RawProduct = serde_json::from_str(r#"{"name": "Mystery"}"#).unwrap();
        assert_eq!(raw.name, "Mystery");
        assert!(raw.tags.is_empty());
        assert!(raw.structured_hints.is_empty());
        assert!(raw.variant_prices.is_empty());
    }
}
