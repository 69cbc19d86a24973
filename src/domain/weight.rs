//! Standard package weight classes and the per-product price table
//!
//! Merchants sell the same coffee in wildly inconsistent package sizes.
//! Heterogeneous variant weights are bucketed into a fixed set of standard
//! classes so prices become comparable across merchants.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard package weight classes, ordered ascending by grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeightClass {
    #[serde(rename = "100g")]
    G100,
    #[serde(rename = "200g")]
    G200,
    #[serde(rename = "250g")]
    G250,
    #[serde(rename = "500g")]
    G500,
    #[serde(rename = "750g")]
    G750,
    #[serde(rename = "1kg")]
    Kg1,
    #[serde(rename = "2kg")]
    Kg2,
}

impl WeightClass {
    /// All classes, ascending.
    pub const ALL: [WeightClass; 7] = [
        WeightClass::G100,
        WeightClass::G200,
        WeightClass::G250,
        WeightClass::G500,
        WeightClass::G750,
        WeightClass::Kg1,
        WeightClass::Kg2,
    ];

    pub fn grams(&self) -> u32 {
        match self {
            WeightClass::G100 => 100,
            WeightClass::G200 => 200,
            WeightClass::G250 => 250,
            WeightClass::G500 => 500,
            WeightClass::G750 => 750,
            WeightClass::Kg1 => 1000,
            WeightClass::Kg2 => 2000,
        }
    }

    /// Bucket a raw gram weight into the nearest class by upper bound.
    /// Anything above 1kg lands in the 2kg class.
    pub fn bucket(grams: u32) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|class| grams <= class.grams())
            .unwrap_or(WeightClass::Kg2)
    }

    /// Field name used for the class in record payloads and confidence maps.
    pub fn field_name(&self) -> &'static str {
        match self {
            WeightClass::G100 => "price_100g",
            WeightClass::G200 => "price_200g",
            WeightClass::G250 => "price_250g",
            WeightClass::G500 => "price_500g",
            WeightClass::G750 => "price_750g",
            WeightClass::Kg1 => "price_1kg",
            WeightClass::Kg2 => "price_2kg",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WeightClass::G100 => "100g",
            WeightClass::G200 => "200g",
            WeightClass::G250 => "250g",
            WeightClass::G500 => "500g",
            WeightClass::G750 => "750g",
            WeightClass::Kg1 => "1kg",
            WeightClass::Kg2 => "2kg",
        }
    }
}

impl fmt::Display for WeightClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Price per populated weight class, keyed ascending by weight.
pub type PriceTable = BTreeMap<WeightClass, f64>;

/// Price per gram for one populated entry.
pub fn price_per_gram(class: WeightClass, price: f64) -> f64 {
    price / f64::from(class.grams())
}
