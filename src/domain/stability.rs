//! Field stability classification
//!
//! Every persisted field belongs to a coarse stability class that drives
//! two independent decisions: how long a cached payload containing the
//! field stays fresh, and whether a stored field is due for a re-scrape.
//! The class assignments are declarative per entity type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expected change frequency of a persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStability {
    /// Almost never changes (name, slug, founded year).
    HighlyStable,
    /// Changes occasionally (description, website URL).
    ModeratelyStable,
    /// Changes regularly (contact info, social links, tags).
    Variable,
    /// Changes week to week (availability, featured flags).
    HighlyVariable,
}

/// Entity type a field belongs to, for stability lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Roaster,
    Coffee,
}

impl FieldStability {
    /// Cache TTL in days for payloads dominated by fields of this class.
    pub fn cache_ttl_days(&self) -> u32 {
        match self {
            FieldStability::HighlyStable => 30,
            FieldStability::ModeratelyStable => 7,
            FieldStability::Variable => 30,
            FieldStability::HighlyVariable => 1,
        }
    }

    /// Re-scrape interval in days; `None` means never once populated.
    pub fn refresh_interval_days(&self) -> Option<i64> {
        match self {
            FieldStability::HighlyStable => None,
            FieldStability::ModeratelyStable => Some(90),
            FieldStability::Variable => Some(30),
            FieldStability::HighlyVariable => Some(7),
        }
    }
}

/// Stability class of a roaster field, if classified.
pub fn roaster_field_stability(field: &str) -> Option<FieldStability> {
    use FieldStability::{HighlyStable, ModeratelyStable, Variable};
    let class = match field {
        "name" | "slug" | "founded_year" | "country" | "address" => HighlyStable,
        "website_url" | "description" | "city" | "state" | "logo_url" | "has_physical_store"
        | "platform" => ModeratelyStable,
        "image_url" | "contact_email" | "contact_phone" | "social_links" | "instagram_handle"
        | "has_subscription" | "tags" | "is_active" => Variable,
        _ => return None,
    };
    Some(class)
}

/// Stability class of a coffee field, if classified.
///
/// Child collections (prices, brew methods, flavor profiles, external
/// links) are not listed; they are fully scraper-owned and rewritten on
/// every sync.
pub fn coffee_field_stability(field: &str) -> Option<FieldStability> {
    use FieldStability::{HighlyStable, HighlyVariable, ModeratelyStable, Variable};
    let class = match field {
        "name" | "slug" | "roaster_id" | "bean_type" | "processing_method" | "region_name"
        | "is_single_origin" | "varietals" | "altitude_meters" => HighlyStable,
        "description" | "roast_level" | "direct_buy_url" | "acidity" | "body" | "sweetness"
        | "aroma" | "with_milk_suitable" => ModeratelyStable,
        "image_url" | "is_seasonal" | "tags" | "price_250g" => Variable,
        "is_available" | "is_featured" => HighlyVariable,
        _ => return None,
    };
    Some(class)
}

/// Whether a stored field is due for a fresh scrape, given when it was
/// last written. Unknown fields and never-written fields always refresh.
pub fn should_update_field(
    field: &str,
    last_updated: Option<DateTime<Utc>>,
    entity: EntityKind,
) -> bool {
    let stability = match entity {
        EntityKind::Roaster => roaster_field_stability(field),
        EntityKind::Coffee => coffee_field_stability(field),
    };
    let (Some(stability), Some(last_updated)) = (stability, last_updated) else {
        return true;
    };
    match stability.refresh_interval_days() {
        None => false,
        Some(days) => Utc::now() - last_updated > chrono::Duration::days(days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roaster_identity_fields_are_highly_stable() {
        assert_eq!(
            roaster_field_stability("name"),
            Some(FieldStability::HighlyStable)
        );
        assert_eq!(
            roaster_field_stability("slug"),
            Some(FieldStability::HighlyStable)
        );
        assert_eq!(roaster_field_stability("nonsense"), None);
    }

    #[test]
    fn coffee_availability_is_highly_variable() {
        assert_eq!(
            coffee_field_stability("is_available"),
            Some(FieldStability::HighlyVariable)
        );
        assert_eq!(
            FieldStability::HighlyVariable.cache_ttl_days(),
            1
        );
    }

    #[test]
    fn never_written_field_always_refreshes() {
        assert!(should_update_field("name", None, EntityKind::Roaster));
        assert!(should_update_field("unmapped", None, EntityKind::Coffee));
    }

    #[test]
    fn highly_stable_field_never_refreshes_once_set() {
        let long_ago = Utc::now() - chrono::Duration::days(3650);
        assert!(!should_update_field(
            "founded_year",
            Some(long_ago),
            EntityKind::Roaster
        ));
    }

    #[test]
    fn variable_field_refreshes_after_a_month() {
        let five_weeks = Utc::now() - chrono::Duration::days(35);
        assert!(should_update_field(
            "contact_email",
            Some(five_weeks),
            EntityKind::Roaster
        ));
        let yesterday = Utc::now() - chrono::Duration::days(1);
        assert!(!should_update_field(
            "contact_email",
            Some(yesterday),
            EntityKind::Roaster
        ));
    }
}
