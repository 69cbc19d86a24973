//! Commerce platform classification from homepage markup
//!
//! Five signature scanners score the same document independently; each
//! accumulates points from weighted signals and is capped at 100. The
//! highest scorer wins unless it stays under the confidence threshold, in
//! which case the site is reported unknown. Signatures are near-disjoint,
//! so ties are broken by scanner declaration order without drama.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::platform::{PLATFORM_CONFIDENCE_THRESHOLD, Platform};
use crate::infrastructure::cache::ScraperCache;
use crate::infrastructure::fetcher::{FetchOptions, Fetcher};
use crate::utils::normalize_url;

static SCRIPT_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("script[src]").unwrap());
static DATA_SHOPIFY: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-shopify]").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static LINK_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("link[href]").unwrap());
static META_GENERATOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="generator"]"#).unwrap());
static MAGENTO_INIT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="text/x-magento-init"]"#).unwrap());
static DATA_MAGE_INIT: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-mage-init]").unwrap());

fn generator_contains(doc: &Html, needle: &str) -> bool {
    doc.select(&META_GENERATOR).any(|meta| {
        meta.value()
            .attr("content")
            .is_some_and(|content| content.contains(needle))
    })
}

fn score_shopify(doc: &Html, html: &str, url: &str) -> u8 {
    let mut score = 0u32;
    if doc.select(&SCRIPT_SRC).any(|script| {
        script
            .value()
            .attr("src")
            .is_some_and(|src| src.contains("cdn.shopify.com"))
    }) {
        score += 40;
    }
    if doc.select(&DATA_SHOPIFY).next().is_some() {
        score += 30;
    }
    if url.contains("/cdn/shop/") {
        score += 10;
    }
    if html.contains("Shopify.theme") {
        score += 20;
    }
    score.min(100) as u8
}

fn score_woocommerce(doc: &Html, html: &str, _url: &str) -> u8 {
    let mut score = 0u32;
    if doc.select(&BODY).any(|body| {
        body.value()
            .attr("class")
            .is_some_and(|classes| classes.contains("woocommerce"))
    }) {
        score += 40;
    }
    if doc.select(&LINK_HREF).any(|link| {
        link.value()
            .attr("href")
            .is_some_and(|href| href.contains("woocommerce"))
    }) {
        score += 20;
    }
    if html.to_lowercase().contains("woocommerce") {
        score += 20;
    }
    // any element styled with a woocommerce- class
    if html.contains("class=\"woocommerce") || html.contains("woocommerce-") {
        score += 20;
    }
    score.min(100) as u8
}

fn score_magento(doc: &Html, html: &str, _url: &str) -> u8 {
    let mut score = 0u32;
    if generator_contains(doc, "Magento") {
        score += 60;
    }
    if html.contains("/pub/static/frontend/") {
        score += 30;
    }
    if doc.select(&MAGENTO_INIT).next().is_some() {
        score += 30;
    }
    if doc.select(&DATA_MAGE_INIT).next().is_some() {
        score += 20;
    }
    if html.contains("var require = {")
        && html.contains("baseUrl")
        && html.contains("/pub/static/frontend/")
    {
        score += 20;
    }
    if html.contains("mage-") {
        score += 10;
    }
    score.min(100) as u8
}

fn score_wordpress(doc: &Html, html: &str, _url: &str) -> u8 {
    let mut score = 0u32;
    if generator_contains(doc, "WordPress") {
        score += 40;
    }
    if html.contains("/wp-content/") || html.contains("/wp-includes/") {
        score += 30;
    }
    score.min(100) as u8
}

fn score_webflow(doc: &Html, html: &str, _url: &str) -> u8 {
    let mut score = 0u32;
    if generator_contains(doc, "Webflow") {
        score += 60;
    }
    if html.contains("Webflow.require") {
        score += 30;
    }
    score.min(100) as u8
}

/// Score all platform signatures against the document and take the best.
/// Below the threshold the result degrades to `Unknown` with the score.
pub fn classify(html: &str, url: &str) -> (Platform, u8) {
    let doc = Html::parse_document(html);
    let results = [
        (Platform::Shopify, score_shopify(&doc, html, url)),
        (Platform::WooCommerce, score_woocommerce(&doc, html, url)),
        (Platform::Magento, score_magento(&doc, html, url)),
        (Platform::WordPress, score_wordpress(&doc, html, url)),
        (Platform::Webflow, score_webflow(&doc, html, url)),
    ];
    // max_by_key takes the last maximum; iterate reversed so ties resolve
    // to declaration order
    let (platform, confidence) = results
        .iter()
        .rev()
        .max_by_key(|(_, score)| *score)
        .copied()
        .unwrap_or((Platform::Unknown, 0));

    if confidence < PLATFORM_CONFIDENCE_THRESHOLD {
        return (Platform::Unknown, confidence);
    }
    (platform, confidence)
}

/// Classifier with a per-run memo so one crawl never re-classifies the
/// same site on every page fetch.
pub struct PlatformDetector {
    memo: RwLock<HashMap<String, (Platform, u8)>>,
}

impl Default for PlatformDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformDetector {
    pub fn new() -> Self {
        Self {
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Classify the given homepage markup, memoized per normalized URL.
    pub async fn classify_cached(&self, url: &str, html: &str) -> (Platform, u8) {
        let key = normalize_url(url);
        if let Some(result) = self.memo.read().await.get(&key) {
            return *result;
        }
        let result = classify(html, url);
        debug!("classified {} as {} ({})", url, result.0, result.1);
        self.memo.write().await.insert(key, result);
        result
    }

    /// Fetch a site's homepage (through the cache) and classify it.
    /// Every failure degrades to `(Unknown, 0)` — detection never aborts
    /// a crawl.
    pub async fn detect(
        &self,
        url: &str,
        fetcher: &Fetcher,
        cache: &ScraperCache,
        options: &FetchOptions<'_>,
    ) -> (Platform, u8) {
        let key = normalize_url(url);
        if let Some(result) = self.memo.read().await.get(&key) {
            return *result;
        }
        let html = match cache.get_page(url, None, None).await {
            Some(html) => html,
            None => match fetcher.fetch_text(url, options).await {
                Ok(html) => {
                    cache.put_page(url, &html).await;
                    html
                }
                Err(e) => {
                    warn!("platform detection fetch failed for {}: {}", url, e);
                    return (Platform::Unknown, 0);
                }
            },
        };
        self.classify_cached(url, &html).await
    }
}
