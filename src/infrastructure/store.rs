//! Generic keyed record store
//!
//! The sync engine works over a small persistence interface: typed record
//! kinds, JSON field maps, and field-level partial updates. `SqliteStore`
//! backs it with one JSON-document table per kind; `MemoryStore` serves
//! tests and doubles as a write counter for idempotence assertions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A flat record: field name to JSON value.
pub type Record = Map<String, Value>;

/// Entity kinds the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Roaster,
    Coffee,
    CoffeePrice,
    FlavorLink,
    BrewMethodLink,
    ExternalLink,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Roaster,
        RecordKind::Coffee,
        RecordKind::CoffeePrice,
        RecordKind::FlavorLink,
        RecordKind::BrewMethodLink,
        RecordKind::ExternalLink,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Roaster => "roasters",
            RecordKind::Coffee => "coffees",
            RecordKind::CoffeePrice => "coffee_prices",
            RecordKind::FlavorLink => "coffee_flavor_profiles",
            RecordKind::BrewMethodLink => "coffee_brew_methods",
            RecordKind::ExternalLink => "external_links",
        }
    }
}

/// Store failures. Fatal for the record being processed, never for the
/// whole batch.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} record not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Generic keyed record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Record>, StoreError>;

    async fn list_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError>;

    /// Insert a record, assigning an id when absent and stamping
    /// `created_at`/`updated_at`. Returns the stored record.
    async fn insert(&self, kind: RecordKind, record: Record) -> Result<Record, StoreError>;

    /// Merge the partial fields into an existing record and bump
    /// `updated_at`. Returns the stored record.
    async fn update(
        &self,
        kind: RecordKind,
        id: &str,
        partial: Record,
    ) -> Result<Record, StoreError>;

    /// Delete every record whose field equals the value. Returns the
    /// number removed.
    async fn delete_where(
        &self,
        kind: RecordKind,
        field: &str,
        value: &Value,
    ) -> Result<u64, StoreError>;
}

fn prepare_insert(mut record: Record) -> (String, Record) {
    let id = match record.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        // drop a null/absent id so the store assigns one
        _ => Uuid::new_v4().to_string(),
    };
    record.insert("id".to_string(), Value::from(id.clone()));
    let now = Utc::now().to_rfc3339();
    record.insert("created_at".to_string(), Value::from(now.clone()));
    record.insert("updated_at".to_string(), Value::from(now));
    (id, record)
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

/// SQLite-backed store keeping each record as a JSON document row.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    /// Connect and run migrations. A connection failure here is fatal at
    /// startup by design.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with(database_url, 10).await
    }

    /// In-memory stores must keep a single connection: each fresh SQLite
    /// `:memory:` connection is its own empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect_with("sqlite::memory:", 1).await
    }

    async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self {
            pool: Arc::new(pool),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for kind in RecordKind::ALL {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, data TEXT NOT NULL)",
                kind.table()
            );
            sqlx::query(&ddl).execute(&*self.pool).await?;
        }
        Ok(())
    }

    fn row_to_record(data: &str) -> Result<Record, StoreError> {
        let value: Value = serde_json::from_str(data)?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Record::new()),
        }
    }

    /// Bindable SQL text for comparing against `json_extract` output.
    fn comparable(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Record>, StoreError> {
        let sql = format!("SELECT data FROM {} WHERE id = ?", kind.table());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(Self::row_to_record(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        let sql = format!(
            "SELECT data FROM {} WHERE json_extract(data, '$.' || ?) = ?",
            kind.table()
        );
        let rows = sqlx::query(&sql)
            .bind(field)
            .bind(Self::comparable(value))
            .fetch_all(&*self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let data: String = row.get("data");
                Self::row_to_record(&data)
            })
            .collect()
    }

    async fn insert(&self, kind: RecordKind, record: Record) -> Result<Record, StoreError> {
        let (id, record) = prepare_insert(record);
        let sql = format!("INSERT INTO {} (id, data) VALUES (?, ?)", kind.table());
        sqlx::query(&sql)
            .bind(&id)
            .bind(serde_json::to_string(&record)?)
            .execute(&*self.pool)
            .await?;
        Ok(record)
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: &str,
        partial: Record,
    ) -> Result<Record, StoreError> {
        let mut record = self.get(kind, id).await?.ok_or(StoreError::NotFound {
            kind: kind.table(),
            id: id.to_string(),
        })?;
        for (field, value) in partial {
            record.insert(field, value);
        }
        record.insert(
            "updated_at".to_string(),
            Value::from(Utc::now().to_rfc3339()),
        );
        let sql = format!("UPDATE {} SET data = ? WHERE id = ?", kind.table());
        sqlx::query(&sql)
            .bind(serde_json::to_string(&record)?)
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(record)
    }

    async fn delete_where(
        &self,
        kind: RecordKind,
        field: &str,
        value: &Value,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE json_extract(data, '$.' || ?) = ?",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(field)
            .bind(Self::comparable(value))
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory store for tests. Counts writes so idempotence can be
/// asserted precisely.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKind, HashMap<String, Record>>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total insert/update/delete operations performed.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Record>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&kind).and_then(|table| table.get(id)).cloned())
    }

    async fn list_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|record| record.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, kind: RecordKind, record: Record) -> Result<Record, StoreError> {
        let (id, record) = prepare_insert(record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write().await;
        records.entry(kind).or_default().insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: &str,
        partial: Record,
    ) -> Result<Record, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write().await;
        let table = records.entry(kind).or_default();
        let record = table.get_mut(id).ok_or(StoreError::NotFound {
            kind: kind.table(),
            id: id.to_string(),
        })?;
        for (field, value) in partial {
            record.insert(field, value);
        }
        record.insert(
            "updated_at".to_string(),
            Value::from(Utc::now().to_rfc3339()),
        );
        Ok(record.clone())
    }

    async fn delete_where(
        &self,
        kind: RecordKind,
        field: &str,
        value: &Value,
    ) -> Result<u64, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write().await;
        let Some(table) = records.get_mut(&kind) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|_, record| record.get(field) != Some(value));
        Ok((before - table.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let stored = store
            .insert(
                RecordKind::Roaster,
                record(&[("name", json!("Blue Tokai"))]),
            )
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();
        assert!(stored.contains_key("created_at"));

        let fetched = store.get(RecordKind::Roaster, &id).await.unwrap().unwrap();
        assert_eq!(fetched["name"], json!("Blue Tokai"));
    }

    #[tokio::test]
    async fn memory_store_lists_by_field() {
        let store = MemoryStore::new();
        store
            .insert(
                RecordKind::Coffee,
                record(&[("roaster_id", json!("r1")), ("name", json!("A"))]),
            )
            .await
            .unwrap();
        store
            .insert(
                RecordKind::Coffee,
                record(&[("roaster_id", json!("r2")), ("name", json!("B"))]),
            )
            .await
            .unwrap();
        let matches = store
            .list_by_field(RecordKind::Coffee, "roaster_id", &json!("r1"))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["name"], json!("A"));
    }

    #[tokio::test]
    async fn memory_store_delete_where() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store
                .insert(
                    RecordKind::CoffeePrice,
                    record(&[("coffee_id", json!("c1"))]),
                )
                .await
                .unwrap();
        }
        let removed = store
            .delete_where(RecordKind::CoffeePrice, "coffee_id", &json!("c1"))
            .await
            .unwrap();
        assert_eq!(removed, 3);
    }

    #[tokio::test]
    async fn sqlite_store_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let stored = store
            .insert(
                RecordKind::Roaster,
                record(&[
                    ("name", json!("Corridor Seven")),
                    ("website_url", json!("https://corridorseven.coffee")),
                ]),
            )
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let fetched = store.get(RecordKind::Roaster, &id).await.unwrap().unwrap();
        assert_eq!(fetched["name"], json!("Corridor Seven"));

        let by_url = store
            .list_by_field(
                RecordKind::Roaster,
                "website_url",
                &json!("https://corridorseven.coffee"),
            )
            .await
            .unwrap();
        assert_eq!(by_url.len(), 1);
    }

    #[tokio::test]
    async fn sqlite_store_partial_update_preserves_other_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let stored = store
            .insert(
                RecordKind::Coffee,
                record(&[("name", json!("Attikan")), ("roast_level", json!("dark"))]),
            )
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let updated = store
            .update(
                RecordKind::Coffee,
                &id,
                record(&[("roast_level", json!("medium-dark"))]),
            )
            .await
            .unwrap();
        assert_eq!(updated["name"], json!("Attikan"));
        assert_eq!(updated["roast_level"], json!("medium-dark"));
    }

    #[tokio::test]
    async fn sqlite_update_of_missing_record_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store
            .update(RecordKind::Coffee, "nope", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn sqlite_delete_where_removes_children() {
        let store = SqliteStore::in_memory().await.unwrap();
        for flavor in ["citrus", "floral"] {
            store
                .insert(
                    RecordKind::FlavorLink,
                    record(&[("coffee_id", json!("c9")), ("flavor", json!(flavor))]),
                )
                .await
                .unwrap();
        }
        let removed = store
            .delete_where(RecordKind::FlavorLink, "coffee_id", &json!("c9"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
    }
}
