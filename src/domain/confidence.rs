//! Per-field confidence scores for extracted data
//!
//! Every extracted value carries a confidence score in [0, 1]. The map is
//! first-class data on the candidate: it gates enrichment, validation
//! messaging, and downstream trust decisions. Scores only move upward, and
//! only through an explicit stronger-evidence overwrite.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Confidence below this counts as "low" for enrichment gating.
pub const LOW_CONFIDENCE: f32 = 0.55;

/// Side-map of field name to confidence score in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceMap(BTreeMap<String, f32>);

impl ConfidenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<f32> {
        self.0.get(field).copied()
    }

    /// Record a score for a field, accepting it only when it is the first
    /// score for that field or strictly higher than the current one.
    /// Returns whether the score was accepted.
    pub fn record_if_higher(&mut self, field: &str, score: f32) -> bool {
        let score = score.clamp(0.0, 1.0);
        match self.0.get(field) {
            Some(&current) if current >= score => false,
            _ => {
                self.0.insert(field.to_string(), score);
                true
            }
        }
    }

    /// Whether a field is missing or scored below [`LOW_CONFIDENCE`].
    pub fn is_low(&self, field: &str) -> bool {
        self.get(field).is_none_or(|score| score < LOW_CONFIDENCE)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_is_accepted() {
        let mut map = ConfidenceMap::new();
        assert!(map.record_if_higher("roast_level", 0.6));
        assert_eq!(map.get("roast_level"), Some(0.6));
    }

    #[test]
    fn lower_score_never_displaces_higher() {
        let mut map = ConfidenceMap::new();
        map.record_if_higher("bean_type", 0.9);
        assert!(!map.record_if_higher("bean_type", 0.5));
        assert_eq!(map.get("bean_type"), Some(0.9));
    }

    #[test]
    fn stronger_evidence_overwrites() {
        let mut map = ConfidenceMap::new();
        map.record_if_higher("processing_method", 0.55);
        assert!(map.record_if_higher("processing_method", 0.95));
        assert_eq!(map.get("processing_method"), Some(0.95));
    }

    #[test]
    fn scores_are_clamped_to_unit_interval() {
        let mut map = ConfidenceMap::new();
        map.record_if_higher("aroma", 1.7);
        assert_eq!(map.get("aroma"), Some(1.0));
    }

    #[test]
    fn low_confidence_threshold() {
        let mut map = ConfidenceMap::new();
        assert!(map.is_low("missing"));
        map.record_if_higher("roast_level", 0.5);
        assert!(map.is_low("roast_level"));
        map.record_if_higher("roast_level", 0.8);
        assert!(!map.is_low("roast_level"));
    }
}
