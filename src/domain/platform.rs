//! Commerce platform identification for crawl targets

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum classification score (0-100) for a platform match to stick.
pub const PLATFORM_CONFIDENCE_THRESHOLD: u8 = 40;

/// Commerce platform powering a merchant site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopify,
    WooCommerce,
    Magento,
    WordPress,
    Webflow,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::WooCommerce => "woocommerce",
            Platform::Magento => "magento",
            Platform::WordPress => "wordpress",
            Platform::Webflow => "webflow",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One crawl target. Platform fields stay mutable until the detector
/// reports a confident match, then freeze for the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub base_url: String,
    pub platform: Platform,
    pub platform_confidence: u8,
}

impl Site {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            platform: Platform::Unknown,
            platform_confidence: 0,
        }
    }

    /// Apply a detection result. Once a confident match is recorded, later
    /// results are ignored for the rest of the run.
    pub fn apply_detection(&mut self, platform: Platform, confidence: u8) {
        if self.is_platform_frozen() {
            tracing::debug!(
                site = %self.name,
                "platform already pinned to {} ({}), ignoring {} ({})",
                self.platform,
                self.platform_confidence,
                platform,
                confidence
            );
            return;
        }
        self.platform = platform;
        self.platform_confidence = confidence;
    }

    pub fn is_platform_frozen(&self) -> bool {
        self.platform_confidence >= PLATFORM_CONFIDENCE_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_below_threshold_stays_mutable() {
        let mut site = Site::new("Test Roasters", "https://test.example");
        site.apply_detection(Platform::WordPress, 30);
        assert!(!site.is_platform_frozen());
        site.apply_detection(Platform::Shopify, 90);
        assert_eq!(site.platform, Platform::Shopify);
        assert!(site.is_platform_frozen());
    }

    #[test]
    fn confident_detection_freezes_platform() {
        let mut site = Site::new("Test Roasters", "https://test.example");
        site.apply_detection(Platform::Shopify, 70);
        site.apply_detection(Platform::Magento, 100);
        assert_eq!(site.platform, Platform::Shopify);
        assert_eq!(site.platform_confidence, 70);
    }
}
