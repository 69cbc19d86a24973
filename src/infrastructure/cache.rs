//! Stability-aware file cache
//!
//! Three disjoint namespaces: raw pages, roaster records, and per-roaster
//! product lists. Entries are never evicted; freshness is decided at read
//! time from the file's age against an effective TTL, which a field
//! stability class can override. Storage errors degrade to a miss or a
//! no-op — caching must never abort the pipeline.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::domain::entities::{Coffee, Roaster};
use crate::domain::stability::FieldStability;
use crate::infrastructure::config::CacheConfig;
use crate::utils::normalize_url;

/// Cache namespace; each maps to its own subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheNamespace {
    Pages,
    Roasters,
    Products,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 3] = [
        CacheNamespace::Pages,
        CacheNamespace::Roasters,
        CacheNamespace::Products,
    ];

    fn dir_name(self) -> &'static str {
        match self {
            CacheNamespace::Pages => "pages",
            CacheNamespace::Roasters => "roasters",
            CacheNamespace::Products => "products",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            CacheNamespace::Pages => "html",
            CacheNamespace::Roasters | CacheNamespace::Products => "json",
        }
    }
}

/// File-backed cache for scraped data.
pub struct ScraperCache {
    root: PathBuf,
    config: CacheConfig,
}

impl ScraperCache {
    /// Create the cache, ensuring namespace directories exist. Directory
    /// creation failure is a startup error, not a runtime one.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let root = config.root_dir.clone();
        for namespace in CacheNamespace::ALL {
            std::fs::create_dir_all(root.join(namespace.dir_name()))
                .with_context(|| format!("Failed to create cache dir under {}", root.display()))?;
        }
        Ok(Self { root, config })
    }

    /// Cache key for a URL: scheme variance, `www.` and trailing slashes
    /// all collapse to the same key.
    pub fn page_key(url: &str) -> String {
        let normalized = normalize_url(url).to_lowercase();
        let stripped = normalized
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        blake3::hash(stripped.as_bytes()).to_hex().to_string()
    }

    /// Cache key for a roaster, combining name and URL.
    pub fn roaster_key(name: &str, url: &str) -> String {
        let combined = format!("{}_{}", name.to_lowercase(), normalize_url(url).to_lowercase());
        blake3::hash(combined.as_bytes()).to_hex().to_string()
    }

    fn entry_path(&self, namespace: CacheNamespace, key: &str) -> PathBuf {
        self.root
            .join(namespace.dir_name())
            .join(format!("{key}.{}", namespace.extension()))
    }

    /// Effective TTL: an explicit stability class overrides the caller's
    /// max age, which in turn overrides the namespace default.
    fn effective_ttl_days(
        &self,
        namespace: CacheNamespace,
        max_age_days: Option<u32>,
        stability: Option<FieldStability>,
    ) -> u32 {
        if let Some(stability) = stability {
            return stability.cache_ttl_days();
        }
        max_age_days.unwrap_or(match namespace {
            CacheNamespace::Pages => self.config.page_ttl_days,
            CacheNamespace::Roasters => self.config.roaster_ttl_days,
            CacheNamespace::Products => self.config.products_ttl_days,
        })
    }

    /// Whether the file is younger than the TTL. Unreadable metadata
    /// counts as stale.
    async fn is_fresh(path: &Path, ttl_days: u32) -> bool {
        let Ok(metadata) = tokio::fs::metadata(path).await else {
            return false;
        };
        let modified = metadata
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age.as_secs() <= u64::from(ttl_days) * 24 * 3600,
            // clock skew: treat a future mtime as fresh
            Err(_) => true,
        }
    }

    async fn read_fresh(&self, path: &Path, ttl_days: u32, what: &str) -> Option<String> {
        if !Self::is_fresh(path, ttl_days).await {
            debug!("cache for {} exceeds max age of {} days", what, ttl_days);
            return None;
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Error reading cache for {}: {}", what, e);
                None
            }
        }
    }

    async fn write_entry(&self, path: &Path, content: &str, what: &str) -> bool {
        match tokio::fs::write(path, content).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error writing cache for {}: {}", what, e);
                false
            }
        }
    }

    /// Cached HTML for a URL, if present and fresh.
    pub async fn get_page(
        &self,
        url: &str,
        max_age_days: Option<u32>,
        stability: Option<FieldStability>,
    ) -> Option<String> {
        let ttl = self.effective_ttl_days(CacheNamespace::Pages, max_age_days, stability);
        let path = self.entry_path(CacheNamespace::Pages, &Self::page_key(url));
        self.read_fresh(&path, ttl, url).await
    }

    /// Cache HTML for a URL. Empty bodies are not worth keeping.
    pub async fn put_page(&self, url: &str, html: &str) -> bool {
        if html.is_empty() {
            return false;
        }
        let path = self.entry_path(CacheNamespace::Pages, &Self::page_key(url));
        self.write_entry(&path, html, url).await
    }

    /// Cached roaster record, if present and fresh.
    pub async fn get_roaster(
        &self,
        name: &str,
        url: &str,
        max_age_days: Option<u32>,
        stability: Option<FieldStability>,
    ) -> Option<Roaster> {
        let ttl = self.effective_ttl_days(CacheNamespace::Roasters, max_age_days, stability);
        let path = self.entry_path(CacheNamespace::Roasters, &Self::roaster_key(name, url));
        let content = self.read_fresh(&path, ttl, name).await?;
        match serde_json::from_str(&content) {
            Ok(roaster) => Some(roaster),
            Err(e) => {
                warn!("Error decoding roaster cache for {}: {}", name, e);
                None
            }
        }
    }

    pub async fn put_roaster(&self, roaster: &Roaster) -> bool {
        if roaster.name.is_empty() || roaster.website_url.is_empty() {
            return false;
        }
        let key = Self::roaster_key(&roaster.name, &roaster.website_url);
        let path = self.entry_path(CacheNamespace::Roasters, &key);
        match serde_json::to_string_pretty(roaster) {
            Ok(json) => self.write_entry(&path, &json, &roaster.name).await,
            Err(e) => {
                warn!("Error encoding roaster cache for {}: {}", roaster.name, e);
                false
            }
        }
    }

    /// Cached product list for a roaster, if present and fresh.
    pub async fn get_products(
        &self,
        roaster_id: &str,
        max_age_days: Option<u32>,
        stability: Option<FieldStability>,
    ) -> Option<Vec<Coffee>> {
        let ttl = self.effective_ttl_days(CacheNamespace::Products, max_age_days, stability);
        let path = self.entry_path(CacheNamespace::Products, roaster_id);
        let content = self.read_fresh(&path, ttl, roaster_id).await?;
        match serde_json::from_str(&content) {
            Ok(products) => Some(products),
            Err(e) => {
                warn!("Error decoding products cache for {}: {}", roaster_id, e);
                None
            }
        }
    }

    pub async fn put_products(&self, roaster_id: &str, products: &[Coffee]) -> bool {
        if roaster_id.is_empty() || products.is_empty() {
            return false;
        }
        let path = self.entry_path(CacheNamespace::Products, roaster_id);
        match serde_json::to_string_pretty(products) {
            Ok(json) => self.write_entry(&path, &json, roaster_id).await,
            Err(e) => {
                warn!("Error encoding products cache for {}: {}", roaster_id, e);
                false
            }
        }
    }

    /// Remove entries: everything, one namespace, or one key within it.
    /// Returns the number of files removed.
    pub async fn clear(&self, namespace: Option<CacheNamespace>, key: Option<&str>) -> usize {
        let namespaces: Vec<CacheNamespace> = match namespace {
            Some(ns) => vec![ns],
            None => CacheNamespace::ALL.to_vec(),
        };
        let mut removed = 0;
        for ns in namespaces {
            if let Some(key) = key {
                let path = self.entry_path(ns, key);
                if tokio::fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
                continue;
            }
            let dir = self.root.join(ns.dir_name());
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                if tokio::fs::remove_file(entry.path()).await.is_ok() {
                    removed += 1;
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cache_in(dir: &Path) -> ScraperCache {
        let config = CacheConfig {
            root_dir: dir.to_path_buf(),
            ..CacheConfig::default()
        };
        ScraperCache::new(config).unwrap()
    }

    #[test]
    fn equivalent_urls_share_a_page_key() {
        let a = ScraperCache::page_key("http://www.example.com/");
        let b = ScraperCache::page_key("https://example.com");
        assert_eq!(a, b);
        let c = ScraperCache::page_key("https://example.com/shop");
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn page_round_trip() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        assert!(cache.put_page("https://example.com", "<html>hi</html>").await);
        let cached = cache.get_page("http://www.example.com/", None, None).await;
        assert_eq!(cached.as_deref(), Some("<html>hi</html>"));
    }

    #[tokio::test]
    async fn missing_entry_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        assert!(cache.get_page("https://nowhere.example", None, None).await.is_none());
    }

    #[tokio::test]
    async fn empty_page_is_not_cached() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        assert!(!cache.put_page("https://example.com", "").await);
    }

    #[tokio::test]
    async fn stale_entry_is_treated_as_miss_not_deleted() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.put_page("https://example.com", "<html/>").await;
        // a zero-day TTL only admits entries written "today"; age of a
        // fresh write is seconds, which rounds under the day threshold,
        // so force staleness via an ancient mtime instead
        let path = dir
            .path()
            .join("pages")
            .join(format!("{}.html", ScraperCache::page_key("https://example.com")));
        let ancient = SystemTime::now() - std::time::Duration::from_secs(40 * 24 * 3600);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(ancient).unwrap();

        assert!(cache.get_page("https://example.com", Some(7), None).await.is_none());
        // the file is still there: stale means miss, not eviction
        assert!(path.exists());
    }

    #[tokio::test]
    async fn stability_class_overrides_max_age() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.put_page("https://example.com", "<html/>").await;
        let path = dir
            .path()
            .join("pages")
            .join(format!("{}.html", ScraperCache::page_key("https://example.com")));
        // three days old: fresh for a 7-day window, stale for HighlyVariable
        let three_days = SystemTime::now() - std::time::Duration::from_secs(3 * 24 * 3600);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(three_days).unwrap();

        assert!(cache.get_page("https://example.com", Some(7), None).await.is_some());
        assert!(
            cache
                .get_page(
                    "https://example.com",
                    Some(7),
                    Some(FieldStability::HighlyVariable)
                )
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn roaster_round_trip() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let roaster = Roaster::new("Blue Tokai", "https://bluetokaicoffee.com");
        assert!(cache.put_roaster(&roaster).await);
        let cached = cache
            .get_roaster("Blue Tokai", "https://bluetokaicoffee.com", None, None)
            .await
            .unwrap();
        assert_eq!(cached.slug, "blue-tokai");
    }

    #[tokio::test]
    async fn products_round_trip_and_clear() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let products = vec![Coffee::new("Attikan Estate")];
        assert!(cache.put_products("roaster-1", &products).await);
        let cached = cache.get_products("roaster-1", None, None).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].name, "Attikan Estate");

        assert_eq!(cache.clear(Some(CacheNamespace::Products), None).await, 1);
        assert!(cache.get_products("roaster-1", None, None).await.is_none());
    }

    #[tokio::test]
    async fn clear_single_key() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.put_page("https://a.example", "<a/>").await;
        cache.put_page("https://b.example", "<b/>").await;
        let removed = cache
            .clear(
                Some(CacheNamespace::Pages),
                Some(&ScraperCache::page_key("https://a.example")),
            )
            .await;
        assert_eq!(removed, 1);
        assert!(cache.get_page("https://a.example", None, None).await.is_none());
        assert!(cache.get_page("https://b.example", None, None).await.is_some());
    }
}
