//! Common text and URL helpers used across the crate

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").unwrap());
static HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
static SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").unwrap());

/// Create a URL-friendly slug from a name.
pub fn slugify(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let slug = name.to_lowercase();
    let slug = NON_WORD.replace_all(&slug, "");
    let slug = WHITESPACE_RUN.replace_all(&slug, "-");
    let slug = HYPHEN_RUN.replace_all(&slug, "-");
    slug.trim_matches('-').to_string()
}

/// Normalize a URL for comparison: ensure a scheme, lowercase the host,
/// strip the `www.` prefix and any trailing slash. Idempotent.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let Ok(parsed) = Url::parse(&with_scheme) else {
        return with_scheme;
    };
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let mut normalized = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    let path = parsed.path().trim_end_matches('/');
    if !path.is_empty() {
        normalized.push_str(path);
    }
    normalized
}

/// Extract the bare domain from a URL (no scheme, no `www.`).
pub fn domain_of(url: &str) -> Option<String> {
    let normalized = normalize_url(url);
    let parsed = Url::parse(&normalized).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Resolve a possibly relative URL against a base URL.
pub fn ensure_absolute_url(url: &str, base_url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//") {
        return url.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(url)) {
        Ok(joined) => joined.to_string(),
        Err(_) => url.to_string(),
    }
}

/// Remove script/style blocks and HTML tags, collapse whitespace.
pub fn clean_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let text = SCRIPT_STYLE.replace_all(html, " ");
    let text = HTML_TAG.replace_all(&text, " ");
    SPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// Clean a product description, filtering out the common
/// scripts-disabled boilerplate some themes render into the markup.
pub fn clean_description(text: &str) -> String {
    let cleaned = clean_html(text);
    if cleaned.starts_with("JavaScript seems to be disabled") {
        return String::new();
    }
    cleaned
}

/// Normalize a phone number, preferring the Indian national format.
pub fn normalize_phone_number(phone: &str) -> Option<String> {
    if phone.is_empty() {
        return None;
    }
    let digits = NON_DIGIT.replace_all(phone, "").to_string();
    if digits.is_empty() {
        return None;
    }
    let formatted = if digits.len() == 10 {
        format!("+91 {} {}", &digits[..5], &digits[5..])
    } else if digits.len() == 11 && digits.starts_with('0') {
        format!("+91 {} {}", &digits[1..6], &digits[6..])
    } else if digits.len() == 12 && digits.starts_with("91") {
        format!("+91 {} {}", &digits[2..7], &digits[7..])
    } else {
        format!("+{digits}")
    };
    Some(formatted)
}

/// Extract an Instagram handle from a profile URL. Post URLs yield `None`.
pub fn extract_instagram_handle(url: &str) -> Option<String> {
    if !url.contains("instagram.com") || url.contains("/p/") {
        return None;
    }
    let rest = url.split("instagram.com/").nth(1)?;
    let handle = rest.split(['/', '?']).next()?;
    if handle.is_empty() {
        return None;
    }
    Some(handle.to_string())
}

/// Terms whose presence in a product name rules out coffee beans.
static NON_COFFEE_TERMS: &[&str] = &[
    "grinder",
    "machine",
    "mug",
    "cup",
    "filter paper",
    "chocolate",
    "tool",
    "course",
    "workshop",
    "kettle",
    "dripper",
    "aeropress",
    "v60",
    "chemex",
    "carafe",
    "equipment",
    "accessory",
    "maker",
    "bootcamp",
    "barista",
    "masterclass",
    "paper",
    "bag",
    "spoon",
    "french press",
    "scale",
    "reusable",
    "class",
    "event",
    "gift card",
    "subscription",
    "gift",
    "academy",
    "training",
    "espresso machine",
    "coffee maker",
    "coffee grinder",
    "coffee cup",
    "coffee mug",
    "coffee filter",
];

/// Name/tag keywords that confirm a product is roasted coffee.
static COFFEE_KEYWORDS: &[&str] = &[
    "arabica",
    "robusta",
    "liberica",
    "single origin",
    "blend",
    "specialty",
    "direct trade",
    "freshly roasted",
    "decaf",
    "vienna roast",
    "espresso roast",
    "dark roast",
    "medium roast",
    "light roast",
    "coffee beans",
    "coffee blend",
    "filter coffee",
    "peaberry",
    "malabar",
    "turkish",
];

/// Description phrases that indicate roasted beans.
static BEAN_INDICATORS: &[&str] = &[
    "medium roast",
    "light roast",
    "dark roast",
    "single origin",
    "arabica beans",
    "robusta beans",
    "fruity notes",
    "chocolate notes",
    "caramel notes",
];

/// Decide whether a product is roasted coffee (beans or ground), as
/// opposed to equipment, merchandise, or courses. Biased toward skipping
/// when unsure.
pub fn is_coffee_product(
    name: &str,
    description: Option<&str>,
    product_type: Option<&str>,
    tags: &[String],
) -> bool {
    if name.is_empty() {
        return false;
    }
    let name = name.to_lowercase();
    let description = description.unwrap_or("").to_lowercase();
    let product_type = product_type.unwrap_or("").to_lowercase();

    if matches!(
        product_type.as_str(),
        "coffee" | "beans" | "ground coffee" | "whole bean"
    ) {
        tracing::debug!("accepted '{}': product_type={}", name, product_type);
        return true;
    }

    let padded = format!(" {name} ");
    for term in NON_COFFEE_TERMS {
        if padded.contains(&format!(" {term} ")) {
            tracing::debug!("skipping '{}': excluded term '{}'", name, term);
            return false;
        }
    }

    // "filter" only counts when it names filter coffee, not filter gear
    if name.contains("filter") && !name.contains("filter coffee") && !name.contains("filter blend")
    {
        tracing::debug!("skipping '{}': filter in name but not filter coffee", name);
        return false;
    }

    for keyword in COFFEE_KEYWORDS {
        if name.contains(keyword) {
            tracing::debug!("accepted '{}': bean indicator '{}' in name", name, keyword);
            return true;
        }
    }

    if tags
        .iter()
        .any(|tag| COFFEE_KEYWORDS.iter().any(|kw| tag.to_lowercase().contains(kw)))
    {
        tracing::debug!("accepted '{}': tag includes coffee keyword", name);
        return true;
    }

    // Estate names are almost always single-estate coffees
    if name.ends_with(" estate") || name.contains(" estate - ") || name.contains("estate |") {
        tracing::debug!("accepted '{}': name includes 'estate'", name);
        return true;
    }

    for indicator in BEAN_INDICATORS {
        if description.contains(indicator) {
            tracing::debug!("accepted '{}': bean indicator in description", name);
            return true;
        }
    }

    tracing::debug!("skipping '{}': doesn't appear to be coffee beans", name);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Blue Tokai Coffee"), "blue-tokai-coffee");
        assert_eq!(slugify("  Attikan  Estate!  "), "attikan-estate");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn normalize_url_strips_www_and_trailing_slash() {
        assert_eq!(
            normalize_url("http://www.Example.com/shop/"),
            "http://example.com/shop"
        );
        assert_eq!(normalize_url("example.com"), "https://example.com");
    }

    #[test]
    fn normalize_url_is_idempotent_on_samples() {
        for raw in [
            "https://www.bluetokaicoffee.com/",
            "bluetokaicoffee.com/collections/coffee/",
            "http://example.com:8080/a/b/",
        ] {
            let once = normalize_url(raw);
            assert_eq!(normalize_url(&once), once);
        }
    }

    proptest! {
        #[test]
        fn normalize_url_is_idempotent(host in "[a-z][a-z0-9]{1,12}\\.(com|in|coffee)", path in "(/[a-z0-9]{1,8}){0,3}/?") {
            let raw = format!("{host}{path}");
            let once = normalize_url(&raw);
            prop_assert_eq!(normalize_url(&once), once.clone());

            let with_www = format!("http://www.{host}{path}");
            let normalized = normalize_url(&with_www);
            prop_assert_eq!(normalize_url(&normalized), normalized);
        }
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(
            domain_of("https://www.bluetokaicoffee.com/shop"),
            Some("bluetokaicoffee.com".to_string())
        );
    }

    #[test]
    fn clean_html_strips_scripts_and_tags() {
        let html = "<p>Notes of <b>citrus</b></p><script>var x = 1;</script>";
        assert_eq!(clean_html(html), "Notes of citrus");
    }

    #[test]
    fn clean_description_filters_js_warning() {
        assert_eq!(
            clean_description("JavaScript seems to be disabled in your browser."),
            ""
        );
    }

    #[test]
    fn phone_normalization_handles_indian_formats() {
        assert_eq!(
            normalize_phone_number("98765 43210"),
            Some("+91 98765 43210".to_string())
        );
        assert_eq!(
            normalize_phone_number("+91-98765-43210"),
            Some("+91 98765 43210".to_string())
        );
        assert_eq!(normalize_phone_number(""), None);
    }

    #[test]
    fn instagram_handle_extraction() {
        assert_eq!(
            extract_instagram_handle("https://instagram.com/bluetokai?hl=en"),
            Some("bluetokai".to_string())
        );
        assert_eq!(
            extract_instagram_handle("https://instagram.com/p/Cxyz123/"),
            None
        );
    }

    #[test]
    fn coffee_gate_accepts_beans_and_rejects_gear() {
        assert!(is_coffee_product(
            "Ethiopia Yirgacheffe",
            Some("Notes of citrus, light roast"),
            None,
            &[]
        ));
        assert!(is_coffee_product("Anything", None, Some("coffee"), &[]));
        assert!(!is_coffee_product(
            "Ceramic Coffee Mug",
            Some("350ml stoneware"),
            None,
            &[]
        ));
        assert!(!is_coffee_product("Hario V60 Dripper", None, None, &[]));
    }

    #[test]
    fn coffee_gate_uses_tags() {
        let tags = vec!["Single Origin".to_string()];
        assert!(is_coffee_product("Mystery Box", None, None, &tags));
    }
}
