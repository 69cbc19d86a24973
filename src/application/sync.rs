//! Synchronization engine: smart upsert
//!
//! Freshly scraped records merge into existing ones instead of replacing
//! them. The merge set is computed field by field: protected and system
//! fields are skipped, a null never overwrites a non-null value, and
//! unchanged values are dropped, so an identical candidate produces no
//! write at all. Child collections are fully scraper-owned and rewritten
//! wholesale.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::entities::{Coffee, Roaster};
use crate::infrastructure::store::{Record, RecordKind, RecordStore, StoreError};

/// Fields the scraper may never touch, on top of per-call protections.
pub const SYSTEM_FIELDS: [&str; 3] = ["created_at", "updated_at", "is_verified"];

/// Roaster identity fields are immutable once created.
const ROASTER_PROTECTED: [&str; 2] = ["name", "slug"];

/// Manually featured coffees stay featured.
const COFFEE_PROTECTED: [&str; 1] = ["is_featured"];

/// Sync failure for a single record.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("record conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),

    #[error("store returned a record without an id")]
    MissingId,
}

/// What the upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Inserted,
    /// Updated exactly these fields.
    Updated(Vec<String>),
    /// The merge set was empty; no write was issued.
    Unchanged,
}

/// Merge-based upsert over a generic record store.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn RecordStore>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Upsert a record, preserving manually curated data.
    ///
    /// No stable identifier: insert directly (the store drops a null id
    /// and assigns one). Identifier present but unknown: warn and insert.
    /// Otherwise merge and update only when something material changed.
    pub async fn upsert(
        &self,
        kind: RecordKind,
        record: Record,
        protected: &[&str],
    ) -> Result<(Record, SyncOutcome), SyncError> {
        let all_protected: HashSet<&str> = protected
            .iter()
            .copied()
            .chain(SYSTEM_FIELDS)
            .collect();

        let id = record
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let Some(id) = id else {
            let stored = self.store.insert(kind, record).await?;
            return Ok((stored, SyncOutcome::Inserted));
        };

        let Some(existing) = self.store.get(kind, &id).await? else {
            warn!(
                "{} record with id={} not found, inserting as new",
                kind.table(),
                id
            );
            let stored = self.store.insert(kind, record).await?;
            return Ok((stored, SyncOutcome::Inserted));
        };

        let merge = merge_record_data(&existing, &record, &all_protected);
        if merge.is_empty() {
            debug!("no changes detected for {} (id={})", kind.table(), id);
            return Ok((existing, SyncOutcome::Unchanged));
        }

        let fields: Vec<String> = merge.keys().cloned().collect();
        info!(
            "updating {} (id={}) with fields: {}",
            kind.table(),
            id,
            fields.join(", ")
        );
        let stored = self.store.update(kind, &id, merge).await?;
        Ok((stored, SyncOutcome::Updated(fields)))
    }

    /// Upsert a roaster, resolving identity by website URL when the
    /// candidate carries no id.
    pub async fn upsert_roaster(
        &self,
        roaster: &Roaster,
    ) -> Result<(Roaster, SyncOutcome), SyncError> {
        let mut record = roaster.record_fields();
        if roaster.id.is_none() {
            if let Some(existing_id) = self
                .find_id(RecordKind::Roaster, "website_url", &roaster.website_url)
                .await?
            {
                record.insert("id".to_string(), Value::from(existing_id));
            }
        }
        let (stored, outcome) = self
            .upsert(RecordKind::Roaster, record, &ROASTER_PROTECTED)
            .await?;
        Ok((Roaster::from_record(stored)?, outcome))
    }

    /// Upsert a coffee and rewrite its child collections (prices, flavor
    /// and brew-method links, external links) wholesale.
    pub async fn upsert_coffee(
        &self,
        coffee: &Coffee,
    ) -> Result<(Coffee, SyncOutcome), SyncError> {
        let mut record = coffee.record_fields();
        if coffee.id.is_none() {
            if let Some(existing_id) = self.find_coffee_id(coffee).await? {
                record.insert("id".to_string(), Value::from(existing_id));
            }
        }
        let (stored, outcome) = self
            .upsert(RecordKind::Coffee, record, &COFFEE_PROTECTED)
            .await?;

        let coffee_id = stored
            .get("id")
            .and_then(Value::as_str)
            .ok_or(SyncError::MissingId)?
            .to_string();

        self.sync_children(&coffee_id, coffee).await?;

        let mut result = Coffee::from_record(stored)?;
        result.prices = coffee.prices.clone();
        result.flavor_profiles = coffee.flavor_profiles.clone();
        result.brew_methods = coffee.brew_methods.clone();
        result.external_links = coffee.external_links.clone();
        result.confidence = coffee.confidence.clone();
        Ok((result, outcome))
    }

    /// Child collections carry no manual curation: delete everything for
    /// the parent, then re-insert the freshly reconciled set.
    async fn sync_children(&self, coffee_id: &str, coffee: &Coffee) -> Result<(), SyncError> {
        let parent = json!(coffee_id);

        if !coffee.prices.is_empty() {
            self.store
                .delete_where(RecordKind::CoffeePrice, "coffee_id", &parent)
                .await?;
            for (class, price) in &coffee.prices {
                let mut row = Map::new();
                row.insert("coffee_id".to_string(), parent.clone());
                row.insert("weight_class".to_string(), Value::from(class.label()));
                row.insert("grams".to_string(), Value::from(class.grams()));
                row.insert("price".to_string(), json!(price));
                self.store.insert(RecordKind::CoffeePrice, row).await?;
            }
        }

        if !coffee.flavor_profiles.is_empty() {
            self.store
                .delete_where(RecordKind::FlavorLink, "coffee_id", &parent)
                .await?;
            for flavor in &coffee.flavor_profiles {
                let mut row = Map::new();
                row.insert("coffee_id".to_string(), parent.clone());
                row.insert("flavor".to_string(), Value::from(flavor.as_str()));
                self.store.insert(RecordKind::FlavorLink, row).await?;
            }
        }

        if !coffee.brew_methods.is_empty() {
            self.store
                .delete_where(RecordKind::BrewMethodLink, "coffee_id", &parent)
                .await?;
            for method in &coffee.brew_methods {
                let mut row = Map::new();
                row.insert("coffee_id".to_string(), parent.clone());
                row.insert("method".to_string(), Value::from(method.as_str()));
                self.store.insert(RecordKind::BrewMethodLink, row).await?;
            }
        }

        if !coffee.external_links.is_empty() {
            self.store
                .delete_where(RecordKind::ExternalLink, "coffee_id", &parent)
                .await?;
            for link in &coffee.external_links {
                let mut row = Map::new();
                row.insert("coffee_id".to_string(), parent.clone());
                row.insert("provider".to_string(), Value::from(link.provider.as_str()));
                row.insert("url".to_string(), Value::from(link.url.as_str()));
                self.store.insert(RecordKind::ExternalLink, row).await?;
            }
        }

        Ok(())
    }

    async fn find_id(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> Result<Option<String>, SyncError> {
        let matches = self
            .store
            .list_by_field(kind, field, &Value::from(value))
            .await?;
        Ok(matches
            .first()
            .and_then(|record| record.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// A coffee's natural key is its slug within its roaster.
    async fn find_coffee_id(&self, coffee: &Coffee) -> Result<Option<String>, SyncError> {
        let matches = self
            .store
            .list_by_field(RecordKind::Coffee, "slug", &Value::from(coffee.slug.as_str()))
            .await?;
        let roaster_id = coffee.roaster_id.as_deref().map(Value::from);
        Ok(matches
            .iter()
            .find(|record| match &roaster_id {
                Some(roaster_id) => record.get("roaster_id") == Some(roaster_id),
                None => true,
            })
            .and_then(|record| record.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// Compute the merge set between an existing record and a candidate.
///
/// Rules, in order: protected fields are skipped; a null candidate value
/// never replaces a non-null existing one; unchanged values are skipped;
/// fields new to the schema are included.
fn merge_record_data(
    existing: &Record,
    candidate: &Record,
    protected: &HashSet<&str>,
) -> Record {
    let mut update = Record::new();
    for (field, new_value) in candidate {
        if field == "id" || protected.contains(field.as_str()) {
            continue;
        }
        match existing.get(field) {
            None => {
                update.insert(field.clone(), new_value.clone());
            }
            Some(existing_value) => {
                if new_value.is_null() && !existing_value.is_null() {
                    continue;
                }
                if existing_value == new_value {
                    continue;
                }
                update.insert(field.clone(), new_value.clone());
            }
        }
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::weight::WeightClass;
    use crate::infrastructure::store::MemoryStore;

    fn engine_with_memory() -> (SyncEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SyncEngine::new(store.clone()), store)
    }

    #[tokio::test]
    async fn insert_without_identifier() {
        let (engine, _) = engine_with_memory();
        let roaster = Roaster::new("Blue Tokai", "https://bluetokaicoffee.com");
        let (stored, outcome) = engine.upsert_roaster(&roaster).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Inserted);
        assert!(stored.id.is_some());
    }

    #[tokio::test]
    async fn second_upsert_of_identical_candidate_writes_nothing() {
        let (engine, store) = engine_with_memory();
        let roaster = Roaster::new("Blue Tokai", "https://bluetokaicoffee.com");
        engine.upsert_roaster(&roaster).await.unwrap();
        let writes_after_insert = store.write_count();

        // same candidate again, identity resolved by URL
        let (_, outcome) = engine.upsert_roaster(&roaster).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(store.write_count(), writes_after_insert);
    }

    #[tokio::test]
    async fn null_never_overwrites_non_null() {
        let (engine, _) = engine_with_memory();
        let mut roaster = Roaster::new("Corridor Seven", "https://corridorseven.coffee");
        roaster.description = Some("Nagpur based roaster".to_string());
        let (stored, _) = engine.upsert_roaster(&roaster).await.unwrap();

        let mut rescraped = Roaster::new("Corridor Seven", "https://corridorseven.coffee");
        rescraped.id = stored.id.clone();
        rescraped.description = None;
        rescraped.city = Some("Nagpur".to_string());
        let (merged, outcome) = engine.upsert_roaster(&rescraped).await.unwrap();

        assert_eq!(
            merged.description.as_deref(),
            Some("Nagpur based roaster")
        );
        assert_eq!(merged.city.as_deref(), Some("Nagpur"));
        assert_eq!(outcome, SyncOutcome::Updated(vec!["city".to_string()]));
    }

    #[tokio::test]
    async fn protected_fields_survive_the_merge() {
        let (engine, store) = engine_with_memory();
        let roaster = Roaster::new("Blue Tokai", "https://bluetokaicoffee.com");
        let (stored, _) = engine.upsert_roaster(&roaster).await.unwrap();
        let id = stored.id.clone().unwrap();

        // a human verified the roaster out of band
        store
            .update(
                RecordKind::Roaster,
                &id,
                [("is_verified".to_string(), Value::from(true))]
                    .into_iter()
                    .collect(),
            )
            .await
            .unwrap();

        let mut rescraped = stored.clone();
        rescraped.is_verified = false;
        rescraped.description = Some("fresh description".to_string());
        let (merged, _) = engine.upsert_roaster(&rescraped).await.unwrap();
        assert!(merged.is_verified);
        assert_eq!(merged.description.as_deref(), Some("fresh description"));
    }

    #[tokio::test]
    async fn identity_fields_are_immutable() {
        let (engine, _) = engine_with_memory();
        let roaster = Roaster::new("Blue Tokai", "https://bluetokaicoffee.com");
        let (stored, _) = engine.upsert_roaster(&roaster).await.unwrap();

        let mut renamed = stored.clone();
        renamed.name = "Blue Tokai Rebranded".to_string();
        let (merged, outcome) = engine.upsert_roaster(&renamed).await.unwrap();
        assert_eq!(merged.name, "Blue Tokai");
        assert_eq!(outcome, SyncOutcome::Unchanged);
    }

    #[tokio::test]
    async fn unknown_identifier_falls_back_to_insert() {
        let (engine, _) = engine_with_memory();
        let mut roaster = Roaster::new("Ghost Roasters", "https://ghost.example");
        roaster.id = Some("vanished".to_string());
        let (stored, outcome) = engine.upsert_roaster(&roaster).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Inserted);
        assert_eq!(stored.id.as_deref(), Some("vanished"));
    }

    #[tokio::test]
    async fn coffee_children_are_rewritten_wholesale() {
        let (engine, store) = engine_with_memory();
        let mut coffee = Coffee::new("Attikan Estate");
        coffee.roaster_id = Some("r1".to_string());
        coffee.prices.insert(WeightClass::G250, 420.0);
        coffee.prices.insert(WeightClass::G500, 780.0);
        coffee.flavor_profiles = vec!["chocolate".to_string(), "caramel".to_string()];

        let (stored, _) = engine.upsert_coffee(&coffee).await.unwrap();
        let coffee_id = stored.id.clone().unwrap();

        // rescrape drops the 500g variant and one flavor
        let mut rescraped = coffee.clone();
        rescraped.prices.remove(&WeightClass::G500);
        rescraped.flavor_profiles = vec!["chocolate".to_string()];
        engine.upsert_coffee(&rescraped).await.unwrap();

        let prices = store
            .list_by_field(RecordKind::CoffeePrice, "coffee_id", &json!(coffee_id))
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0]["weight_class"], json!("250g"));

        let flavors = store
            .list_by_field(RecordKind::FlavorLink, "coffee_id", &json!(coffee_id))
            .await
            .unwrap();
        assert_eq!(flavors.len(), 1);
    }

    #[tokio::test]
    async fn coffee_identity_resolves_by_slug_within_roaster() {
        let (engine, _) = engine_with_memory();
        let mut coffee = Coffee::new("Monsoon Malabar");
        coffee.roaster_id = Some("r1".to_string());
        let (first, _) = engine.upsert_coffee(&coffee).await.unwrap();

        // same slug under a different roaster is a different product
        let mut other = Coffee::new("Monsoon Malabar");
        other.roaster_id = Some("r2".to_string());
        let (second, outcome) = engine.upsert_coffee(&other).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Inserted);
        assert_ne!(first.id, second.id);

        // rescrape under the original roaster reuses the record
        let mut rescraped = Coffee::new("Monsoon Malabar");
        rescraped.roaster_id = Some("r1".to_string());
        let (third, outcome) = engine.upsert_coffee(&rescraped).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(third.id, first.id);
    }
}
