//! Batch scraping pipeline
//!
//! Wires the fetcher, cache, platform detector, extraction engines,
//! enrichment client, and sync engine together, with every collaborator
//! injected. Sites are processed as independent tasks gated by a
//! semaphore; the cache and the per-host rate limiters are the only
//! shared state. Failures stay contained to their own item and are
//! reported alongside successes.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::application::dto::{BatchFailure, BatchReport, RawProduct, RoasterSeed, SiteReport};
use crate::application::sync::SyncEngine;
use crate::domain::entities::{Coffee, Roaster};
use crate::domain::platform::Site;
use crate::extraction::attributes::extract_all;
use crate::extraction::price::{derive_standard_250g, reconcile};
use crate::infrastructure::cache::ScraperCache;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::enrichment::EnrichmentClient;
use crate::infrastructure::fetcher::{FetchOptions, Fetcher};
use crate::infrastructure::platform_detector::PlatformDetector;
use crate::infrastructure::rate_limiter::{HostLimiters, HostRateLimiter};
use crate::infrastructure::store::RecordStore;
use crate::utils::{clean_description, ensure_absolute_url, is_coffee_product, normalize_url};

/// Platform-specific raw extraction lives outside this crate; the
/// pipeline only needs something that turns a classified site into raw
/// candidate records.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch_products(
        &self,
        site: &Site,
        fetcher: &Fetcher,
        limiter: &HostRateLimiter,
    ) -> Result<Vec<RawProduct>>;
}

/// Source that yields no products; roaster-only crawls.
pub struct NoProducts;

#[async_trait]
impl ProductSource for NoProducts {
    async fn fetch_products(
        &self,
        _site: &Site,
        _fetcher: &Fetcher,
        _limiter: &HostRateLimiter,
    ) -> Result<Vec<RawProduct>> {
        Ok(Vec::new())
    }
}

/// The scraping pipeline. Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct ScrapePipeline {
    fetcher: Arc<Fetcher>,
    cache: Arc<ScraperCache>,
    detector: Arc<PlatformDetector>,
    limiters: Arc<HostLimiters>,
    enrichment: Arc<EnrichmentClient>,
    sync: SyncEngine,
    source: Arc<dyn ProductSource>,
    concurrency: usize,
}

impl ScrapePipeline {
    /// Assemble the pipeline from configuration plus the injected store
    /// and product source.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn RecordStore>,
        source: Arc<dyn ProductSource>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher: Arc::new(Fetcher::new(config.fetcher.clone())?),
            cache: Arc::new(ScraperCache::new(config.cache.clone())?),
            detector: Arc::new(PlatformDetector::new()),
            limiters: Arc::new(HostLimiters::new(
                config.fetcher.per_host_requests_per_second,
            )),
            enrichment: Arc::new(EnrichmentClient::new(config.enrichment.clone())),
            sync: SyncEngine::new(store),
            source,
            concurrency: config.batch.concurrency,
        })
    }

    pub fn cache(&self) -> &ScraperCache {
        &self.cache
    }

    pub fn sync_engine(&self) -> &SyncEngine {
        &self.sync
    }

    /// Process one site end to end: fetch and classify the homepage,
    /// upsert the roaster, then extract, reconcile, enrich, and upsert
    /// each coffee candidate. Per-product failures are contained.
    pub async fn run_one(&self, seed: &RoasterSeed) -> Result<SiteReport> {
        let base_url = normalize_url(&seed.url);
        let mut site = Site::new(&seed.name, &base_url);
        let limiter = self.limiters.for_url(&base_url).await;
        let options = FetchOptions {
            limiter: Some(limiter.as_ref()),
            ..FetchOptions::default()
        };

        let html = match self.cache.get_page(&base_url, None, None).await {
            Some(html) => html,
            None => {
                let page = self
                    .fetcher
                    .fetch(&base_url, &options)
                    .await
                    .with_context(|| format!("Failed to fetch homepage for {}", seed.name))?;
                self.cache.put_page(&base_url, &page.body).await;
                page.body
            }
        };

        let (platform, confidence) = self.detector.classify_cached(&base_url, &html).await;
        site.apply_detection(platform, confidence);
        info!(
            "{}: platform {} (confidence {})",
            seed.name, site.platform, site.platform_confidence
        );

        let mut roaster = match self
            .cache
            .get_roaster(&seed.name, &base_url, None, None)
            .await
        {
            Some(cached) => cached,
            None => {
                let mut roaster = Roaster::new(&seed.name, &base_url);
                roaster.platform = Some(site.platform);
                self.enrichment.enhance_roaster(&mut roaster).await;
                roaster
            }
        };
        if roaster.platform.is_none() {
            roaster.platform = Some(site.platform);
        }

        let (stored_roaster, _) = self.sync.upsert_roaster(&roaster).await?;
        self.cache.put_roaster(&stored_roaster).await;
        let roaster_id = stored_roaster
            .id
            .clone()
            .context("store returned a roaster without an id")?;

        let raw_products = match self
            .source
            .fetch_products(&site, &self.fetcher, &limiter)
            .await
        {
            Ok(products) => products,
            Err(e) => {
                warn!("product extraction failed for {}: {}", seed.name, e);
                Vec::new()
            }
        };

        let mut synced = 0usize;
        let mut skipped = 0usize;
        let mut coffees = Vec::new();
        for raw in raw_products {
            if !is_coffee_product(
                &raw.name,
                raw.description.as_deref(),
                raw.product_type.as_deref(),
                &raw.tags,
            ) {
                skipped += 1;
                continue;
            }
            let mut coffee = build_candidate(&raw, &roaster_id, &base_url);
            if self.enrichment.is_enabled() && EnrichmentClient::needs_enhancement(&coffee) {
                self.enrichment
                    .enhance_coffee(&mut coffee, Some(&stored_roaster.name))
                    .await;
            }
            match self.sync.upsert_coffee(&coffee).await {
                Ok((stored, _)) => {
                    synced += 1;
                    coffees.push(stored);
                }
                Err(e) => {
                    // one bad product never takes the site down
                    warn!("failed to sync product '{}': {}", coffee.name, e);
                    skipped += 1;
                }
            }
        }
        if !coffees.is_empty() {
            self.cache.put_products(&roaster_id, &coffees).await;
        }

        Ok(SiteReport {
            name: seed.name.clone(),
            url: base_url,
            platform: site.platform,
            platform_confidence: site.platform_confidence,
            roaster_id,
            products_synced: synced,
            products_skipped: skipped,
        })
    }

    /// Process many sites with bounded concurrency. Partial success is
    /// the normal outcome: every item lands in either `succeeded` or
    /// `failed`.
    pub async fn run_batch(&self, seeds: Vec<RoasterSeed>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let total = seeds.len();
        let mut labels = Vec::with_capacity(total);
        let mut tasks = Vec::with_capacity(total);

        for (index, seed) in seeds.into_iter().enumerate() {
            labels.push((seed.name.clone(), seed.url.clone()));
            let pipeline = self.clone();
            let semaphore = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Err(BatchFailure {
                        name: seed.name,
                        url: seed.url,
                        error: "semaphore acquisition failed".to_string(),
                    });
                };
                info!("[{}/{}] processing: {} ({})", index + 1, total, seed.name, seed.url);
                pipeline.run_one(&seed).await.map_err(|e| BatchFailure {
                    name: seed.name,
                    url: seed.url,
                    error: e.to_string(),
                })
            }));
        }

        let mut report = BatchReport::default();
        for (result, (name, url)) in futures::future::join_all(tasks).await.into_iter().zip(labels)
        {
            match result {
                Ok(Ok(site)) => report.succeeded.push(site),
                Ok(Err(failure)) => report.failed.push(failure),
                Err(join_error) => report.failed.push(BatchFailure {
                    name,
                    url,
                    error: format!("task panicked: {join_error}"),
                }),
            }
        }
        info!("batch finished: {}", report.summary());
        report
    }
}

/// Build a coffee candidate from a raw product: clean the text, run the
/// extraction waterfall, reconcile prices, and derive the canonical 250g
/// price.
pub fn build_candidate(raw: &RawProduct, roaster_id: &str, base_url: &str) -> Coffee {
    let mut coffee = Coffee::new(&raw.name);
    coffee.roaster_id = Some(roaster_id.to_string());
    coffee.description = raw
        .description
        .as_deref()
        .map(clean_description)
        .filter(|cleaned| !cleaned.is_empty());
    coffee.direct_buy_url = raw
        .url
        .as_deref()
        .map(|url| ensure_absolute_url(url, base_url));
    coffee.image_url = raw.image_url.clone();
    coffee.tags = raw.tags.clone();

    let hints: Option<&HashMap<String, Value>> =
        (!raw.structured_hints.is_empty()).then_some(&raw.structured_hints);
    let text = coffee.corpus();
    extract_all(&mut coffee, &text, &raw.tags, hints);
    coffee.apply_origin_hints(&raw.structured_hints);

    let reconciled = reconcile(&raw.variant_prices);
    for (class, conf) in &reconciled.confidence {
        coffee.confidence.record_if_higher(class.field_name(), *conf);
    }
    coffee.price_inconsistent = reconciled.has_inconsistency();
    if let Some(pack) = reconciled.multipack {
        coffee.is_multipack = true;
        coffee.pack_count = Some(pack.pack_count);
    }
    if let Some((price, conf)) = derive_standard_250g(&reconciled) {
        coffee.price_250g = Some(price);
        coffee.confidence.record_if_higher("price_250g", conf);
    }
    coffee.prices = reconciled.table;

    coffee
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{ProcessMethod, RoastLevel};
    use crate::domain::weight::WeightClass;
    use crate::extraction::price::VariantPrice;

    #[test]
    fn candidate_from_raw_product() {
        let mut raw = RawProduct::new("Ethiopia Yirgacheffe");
        raw.description = Some("<p>Notes of citrus and floral</p>".to_string());
        raw.tags = vec!["Light Roast".to_string(), "Washed".to_string()];
        raw.url = Some("/products/yirgacheffe".to_string());
        raw.variant_prices = vec![
            VariantPrice::new("250g", 520.0),
            VariantPrice::new("500g", 960.0),
        ];

        let coffee = build_candidate(&raw, "r1", "https://example.com");

        assert_eq!(coffee.roaster_id.as_deref(), Some("r1"));
        assert_eq!(
            coffee.direct_buy_url.as_deref(),
            Some("https://example.com/products/yirgacheffe")
        );
        assert_eq!(coffee.description.as_deref(), Some("Notes of citrus and floral"));
        assert_eq!(coffee.roast_level, Some(RoastLevel::Light));
        assert_eq!(coffee.processing_method, Some(ProcessMethod::Washed));
        assert_eq!(coffee.prices.get(&WeightClass::G250), Some(&520.0));
        assert_eq!(coffee.price_250g, Some(520.0));
        assert!(!coffee.price_inconsistent);
    }

    #[test]
    fn candidate_with_no_prices_has_no_price_fields() {
        let raw = RawProduct::new("Mystery Beans");
        let coffee = build_candidate(&raw, "r1", "https://example.com");
        assert!(coffee.prices.is_empty());
        assert!(coffee.price_250g.is_none());
    }
}
