//! Persisted entities: roasters and their coffee products
//!
//! `Roaster` is the merchant record; `Coffee` doubles as the in-flight
//! candidate enriched by the extraction engines and the persisted product
//! record. Both convert to flat field maps for the sync engine; child
//! collections and the confidence map are carved off because they are
//! synchronized separately (or not persisted at all).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::confidence::ConfidenceMap;
use crate::domain::platform::Platform;
use crate::domain::value_objects::{BeanType, ProcessMethod, RoastLevel};
use crate::domain::weight::PriceTable;
use crate::utils::slugify;

fn default_true() -> bool {
    true
}

/// A coffee roaster (merchant) record.
///
/// Identity fields (`name`, `slug`) are immutable once created; everything
/// else is mutated only through the sync engine's merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roaster {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub slug: String,
    pub website_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub founded_year: Option<i32>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub instagram_handle: Option<String>,
    #[serde(default)]
    pub social_links: Vec<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub has_physical_store: Option<bool>,
    #[serde(default)]
    pub has_subscription: Option<bool>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl Roaster {
    pub fn new(name: impl Into<String>, website_url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            slug: slugify(&name),
            name,
            website_url: website_url.into(),
            is_active: true,
            ..Self::default()
        }
    }

    /// Flat field map for the sync engine.
    pub fn record_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn from_record(record: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }
}

/// External purchase or listing link attached to a coffee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub provider: String,
    pub url: String,
}

/// A coffee product candidate and its persisted form.
///
/// `prices`, `flavor_profiles`, `brew_methods` and `external_links` are
/// child collections owned wholesale by the scraper; `confidence` is
/// working state and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coffee {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub roaster_id: Option<String>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub direct_buy_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub roast_level: Option<RoastLevel>,
    #[serde(default)]
    pub bean_type: Option<BeanType>,
    #[serde(default)]
    pub processing_method: Option<ProcessMethod>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub varietals: Vec<String>,
    #[serde(default)]
    pub altitude_meters: Option<i32>,
    #[serde(default)]
    pub acidity: Option<String>,
    #[serde(default)]
    pub sweetness: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub aroma: Option<String>,
    #[serde(default)]
    pub with_milk_suitable: Option<bool>,
    #[serde(default)]
    pub is_single_origin: Option<bool>,
    #[serde(default)]
    pub is_blend: bool,
    #[serde(default)]
    pub is_seasonal: Option<bool>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Canonical 250g price, present as a column for comparison queries.
    #[serde(default)]
    pub price_250g: Option<f64>,
    #[serde(default)]
    pub is_multipack: bool,
    #[serde(default)]
    pub pack_count: Option<u32>,
    #[serde(default)]
    pub price_inconsistent: bool,
    #[serde(default)]
    pub prices: PriceTable,
    #[serde(default)]
    pub flavor_profiles: Vec<String>,
    #[serde(default)]
    pub brew_methods: Vec<String>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
    #[serde(default)]
    pub confidence: ConfidenceMap,
}

impl Coffee {
    /// Keys excluded from the flat record: child collections plus the
    /// confidence working state.
    const CHILD_FIELDS: &'static [&'static str] = &[
        "prices",
        "flavor_profiles",
        "brew_methods",
        "external_links",
        "confidence",
    ];

    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            slug: slugify(&name),
            name,
            is_available: true,
            ..Self::default()
        }
    }

    /// Flat field map for the sync engine, without child collections.
    pub fn record_fields(&self) -> Map<String, Value> {
        let mut map = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for field in Self::CHILD_FIELDS {
            map.remove(*field);
        }
        map
    }

    pub fn from_record(record: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }

    /// Combined name + description corpus the extractors scan.
    pub fn corpus(&self) -> String {
        match &self.description {
            Some(description) => format!("{} {}", self.name, description),
            None => self.name.clone(),
        }
    }

    /// Apply a structured-hints map to fill identity-adjacent fields the
    /// extractors do not own (region, varietals, altitude).
    pub fn apply_origin_hints(&mut self, hints: &HashMap<String, Value>) {
        if self.region_name.is_none() {
            let region = hints
                .get("region")
                .or_else(|| hints.get("region_name"))
                .and_then(Value::as_str);
            if let Some(region) = region {
                self.region_name = Some(region.to_string());
                self.confidence.record_if_higher("region_name", 0.95);
            }
        }
        if self.altitude_meters.is_none() {
            let altitude = hints
                .get("altitude")
                .or_else(|| hints.get("altitude_meters"))
                .and_then(Value::as_i64);
            if let Some(altitude) = altitude {
                self.altitude_meters = i32::try_from(altitude).ok();
                self.confidence.record_if_higher("altitude_meters", 0.95);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::weight::WeightClass;

    #[test]
    fn roaster_new_derives_slug() {
        let roaster = Roaster::new("Blue Tokai Coffee", "https://bluetokaicoffee.com");
        assert_eq!(roaster.slug, "blue-tokai-coffee");
        assert!(roaster.is_active);
        assert!(!roaster.is_verified);
    }

    #[test]
    fn coffee_record_fields_exclude_children() {
        let mut coffee = Coffee::new("Ethiopia Yirgacheffe");
        coffee.prices.insert(WeightClass::G250, 450.0);
        coffee.flavor_profiles.push("citrus".to_string());
        coffee.confidence.record_if_higher("roast_level", 0.9);

        let record = coffee.record_fields();
        assert!(record.contains_key("name"));
        assert!(record.contains_key("slug"));
        assert!(!record.contains_key("prices"));
        assert!(!record.contains_key("flavor_profiles"));
        assert!(!record.contains_key("confidence"));
    }

    #[test]
    fn coffee_round_trips_through_record() {
        let mut coffee = Coffee::new("Monsoon Malabar AA");
        coffee.roast_level = Some(RoastLevel::Dark);
        coffee.price_250g = Some(399.0);
        let record = coffee.record_fields();
        let back = Coffee::from_record(record).unwrap();
        assert_eq!(back.name, "Monsoon Malabar AA");
        assert_eq!(back.roast_level, Some(RoastLevel::Dark));
        assert_eq!(back.price_250g, Some(399.0));
        assert!(back.prices.is_empty());
    }

    #[test]
    fn origin_hints_fill_once_only() {
        let mut coffee = Coffee::new("Attikan Estate");
        let mut hints = HashMap::new();
        hints.insert("region".to_string(), Value::from("Karnataka"));
        hints.insert("altitude_meters".to_string(), Value::from(1400));
        coffee.apply_origin_hints(&hints);
        assert_eq!(coffee.region_name.as_deref(), Some("Karnataka"));
        assert_eq!(coffee.altitude_meters, Some(1400));

        let mut other = HashMap::new();
        other.insert("region".to_string(), Value::from("Kerala"));
        coffee.apply_origin_hints(&other);
        assert_eq!(coffee.region_name.as_deref(), Some("Karnataka"));
    }
}
