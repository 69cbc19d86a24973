//! Price reconciliation across heterogeneous package sizes
//!
//! Variant labels arrive as free text ("250g", "half kilo", "2 x 250g",
//! "Size 500"). Each is parsed into grams with a confidence score,
//! bucketed into a standard weight class, validated for monotonic
//! price-per-gram ordering, and the canonical 250g price derived when
//! missing. Violations are flagged as data for downstream review, never
//! auto-corrected.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::weight::{PriceTable, WeightClass, price_per_gram};

/// One variant label/price pair from raw extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPrice {
    pub label: String,
    pub price: f64,
}

impl VariantPrice {
    pub fn new(label: impl Into<String>, price: f64) -> Self {
        Self {
            label: label.into(),
            price,
        }
    }
}

/// Multi-pack metadata when a variant sells N packs at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackInfo {
    pub pack_count: u32,
}

/// Validation findings attached to a reconciled table. These are data,
/// not errors: reconciliation never fails on a suspicious table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PriceFlag {
    /// The larger class costs materially more per gram than the smaller.
    Inconsistent {
        smaller: WeightClass,
        larger: WeightClass,
    },
    /// The larger class is so much cheaper per gram it looks like a bulk
    /// discount; informational only.
    BulkDiscount {
        smaller: WeightClass,
        larger: WeightClass,
    },
}

impl PriceFlag {
    pub fn is_inconsistency(&self) -> bool {
        matches!(self, PriceFlag::Inconsistent { .. })
    }
}

/// Outcome of reconciling a variant price list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciled {
    pub table: PriceTable,
    /// Confidence per populated class, keyed like the table.
    pub confidence: BTreeMap<WeightClass, f32>,
    pub flags: Vec<PriceFlag>,
    pub multipack: Option<PackInfo>,
}

impl Reconciled {
    pub fn has_inconsistency(&self) -> bool {
        self.flags.iter().any(PriceFlag::is_inconsistency)
    }
}

static UNIT_WEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.?\d*)\s*(g|gram|grams|gm|kg)\b").unwrap());
static BARE_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.?\d*)\s*(?:size|weight|pack)").unwrap());
static MULTI_PACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*x\s*(\d+\.?\d*)\s*(g|gram|gm|kg)").unwrap());

/// Named sizes that appear in variant labels without units.
static NAMED_SIZES: &[(&str, u32)] = &[
    ("quarter pound", 113),
    ("half pound", 227),
    ("one pound", 454),
    ("1 pound", 454),
    ("1 lb", 454),
    ("1lb", 454),
    ("half kilo", 500),
    ("one kilo", 1000),
    ("1 kilo", 1000),
    ("1 kg", 1000),
    ("1kg", 1000),
];

/// Multipack wording in a label; best-effort, not guaranteed to
/// generalize across merchants.
static PACK_WORDS: &[&str] = &["pack of", "multipack", "multi-pack", "combo"];

fn to_grams(value: f64, unit: &str) -> u32 {
    if unit.contains("kg") {
        (value * 1000.0) as u32
    } else {
        value as u32
    }
}

/// Parse a free-text size label into grams with a confidence score.
pub fn parse_weight(label: &str) -> Option<(u32, f32)> {
    if label.is_empty() {
        return None;
    }
    let lower = label.to_lowercase();

    // Explicit unit is the most reliable signal
    if let Some(cap) = UNIT_WEIGHT.captures(&lower) {
        let value: f64 = cap[1].parse().ok()?;
        return Some((to_grams(value, &cap[2]), 0.9));
    }

    // Named common sizes
    for (size_text, grams) in NAMED_SIZES {
        if lower.contains(size_text) {
            return Some((*grams, 0.8));
        }
    }

    // A bare number next to size/weight/pack wording, plausible as grams
    if let Some(cap) = BARE_SIZE.captures(&lower) {
        let value: f64 = cap[1].parse().ok()?;
        if (100.0..=1000.0).contains(&value) {
            return Some((value as u32, 0.7));
        }
    }

    // Bare option values some stores use for size dropdowns
    if matches!(lower.trim(), "250" | "500" | "1000") {
        return Some((lower.trim().parse().ok()?, 0.6));
    }

    None
}

/// Parse a multi-pack label like "2 x 250g", returning the pack count and
/// single-unit weight in grams.
pub fn parse_multipack(label: &str) -> Option<(u32, u32)> {
    let lower = label.to_lowercase();
    let cap = MULTI_PACK.captures(&lower)?;
    let count: u32 = cap[1].parse().ok()?;
    let value: f64 = cap[2].parse().ok()?;
    if count == 0 {
        return None;
    }
    Some((count, to_grams(value, &cap[3])))
}

fn looks_like_multipack(label: &str) -> bool {
    let lower = label.to_lowercase();
    PACK_WORDS.iter().any(|word| lower.contains(word)) || MULTI_PACK.is_match(&lower)
}

/// Reconcile variant price pairs into a standard-class price table.
///
/// Pairs are sorted ascending by weight before bucketing, so when two
/// variants collapse into the same class the heavier one wins. Plain
/// weights are preferred; multi-pack labels are only consulted when no
/// plain weight parsed. A table that parses nothing falls back to the
/// first variant priced as 250g at low confidence.
pub fn reconcile(variants: &[VariantPrice]) -> Reconciled {
    let mut reconciled = Reconciled::default();

    let mut parsed: Vec<(u32, f64, f32)> = variants
        .iter()
        .filter(|v| v.price > 0.0)
        .filter(|v| !looks_like_multipack(&v.label))
        .filter_map(|v| parse_weight(&v.label).map(|(grams, conf)| (grams, v.price, conf)))
        .collect();
    parsed.sort_by_key(|(grams, _, _)| *grams);

    for (grams, price, conf) in &parsed {
        let class = WeightClass::bucket(*grams);
        reconciled.table.insert(class, *price);
        reconciled.confidence.insert(class, *conf);
    }

    // Multi-pack fallback: divide the pack price down to one unit
    if parsed.is_empty() {
        for variant in variants {
            if variant.price <= 0.0 {
                continue;
            }
            if let Some((count, grams)) = parse_multipack(&variant.label) {
                let class = WeightClass::bucket(grams);
                reconciled.table.insert(class, variant.price / f64::from(count));
                reconciled.confidence.insert(class, 0.9);
                reconciled.multipack = Some(PackInfo { pack_count: count });
                break;
            }
        }
    }

    // Last resort: assume the first priced variant is a 250g bag
    if reconciled.table.is_empty() {
        if let Some(first) = variants.iter().find(|v| v.price > 0.0) {
            reconciled.table.insert(WeightClass::G250, first.price);
            reconciled.confidence.insert(WeightClass::G250, 0.3);
        }
    }

    reconciled.flags = validate_price_logic(&reconciled.table);
    reconciled
}

/// Check adjacent populated classes for per-gram anomalies. A larger size
/// more than 10% pricier per gram is flagged inconsistent; one below 70%
/// of the smaller size's rate is noted as a possible bulk discount.
pub fn validate_price_logic(table: &PriceTable) -> Vec<PriceFlag> {
    let mut flags = Vec::new();
    let entries: Vec<(WeightClass, f64)> = table.iter().map(|(c, p)| (*c, *p)).collect();

    for pair in entries.windows(2) {
        let (smaller, smaller_price) = pair[0];
        let (larger, larger_price) = pair[1];
        let smaller_ppg = price_per_gram(smaller, smaller_price);
        let larger_ppg = price_per_gram(larger, larger_price);

        if larger_ppg > smaller_ppg * 1.1 {
            tracing::warn!(
                "price inconsistency: {} pack has higher price per gram than {} pack",
                larger,
                smaller
            );
            flags.push(PriceFlag::Inconsistent { smaller, larger });
        } else if larger_ppg < smaller_ppg * 0.7 {
            flags.push(PriceFlag::BulkDiscount { smaller, larger });
        }
    }
    flags
}

/// Linear-scaling ratios to 250g from each class, with the derivation
/// penalty growing with distance.
static DERIVE_RATIOS: &[(WeightClass, f64, f32)] = &[
    (WeightClass::G200, 1.25, 0.9),
    (WeightClass::G500, 0.5, 0.8),
    (WeightClass::G100, 2.5, 0.7),
    (WeightClass::G750, 1.0 / 3.0, 0.7),
    (WeightClass::Kg1, 0.25, 0.7),
    (WeightClass::Kg2, 0.125, 0.6),
];

/// Derive the canonical 250g price from the nearest populated class.
/// Derived confidence is the source confidence times the penalty, so it is
/// always strictly below the source entry's confidence.
pub fn derive_standard_250g(reconciled: &Reconciled) -> Option<(f64, f32)> {
    if let Some(price) = reconciled.table.get(&WeightClass::G250) {
        let conf = reconciled
            .confidence
            .get(&WeightClass::G250)
            .copied()
            .unwrap_or(0.0);
        return Some((*price, conf));
    }
    for (class, ratio, penalty) in DERIVE_RATIOS {
        if let Some(price) = reconciled.table.get(class) {
            let source_conf = reconciled.confidence.get(class).copied().unwrap_or(0.7);
            return Some((price * ratio, source_conf * penalty));
        }
    }
    None
}
