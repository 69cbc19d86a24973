//! Confidence-scored attribute extraction
//!
//! Every extractable field runs the same strategy waterfall over the
//! product text, its tags, and any structured platform metadata, returning
//! on the first hit:
//!
//! 1. dedicated attribute in structured hints (confidence ~0.95)
//! 2. curated tag pattern match (0.8-0.9)
//! 3. explicit declaration in the description (0.75-0.85)
//! 4. bare keyword occurrence, weighted lower because common words are
//!    ambiguous (0.55-0.7)
//! 5. nothing found
//!
//! Extractors are pure; the policy for combining their outputs with
//! already-present values lives in [`extract_all`], which only overwrites
//! through the confidence map's stronger-evidence rule.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::entities::Coffee;
use crate::domain::value_objects::{BeanType, ProcessMethod, RoastLevel};

/// First string hint found under any of the given keys.
fn hint_str<'a>(
    hints: Option<&'a HashMap<String, Value>>,
    keys: &[&str],
) -> Option<&'a str> {
    let hints = hints?;
    keys.iter().find_map(|key| {
        hints
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

fn hint_bool(hints: Option<&HashMap<String, Value>>, keys: &[&str]) -> Option<bool> {
    let hints = hints?;
    keys.iter().find_map(|key| match hints.get(*key) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => Some(matches!(
            s.to_lowercase().as_str(),
            "true" | "yes" | "1" | "suitable"
        )),
        _ => None,
    })
}

fn hint_str_list(hints: Option<&HashMap<String, Value>>, keys: &[&str]) -> Option<Vec<String>> {
    let hints = hints?;
    keys.iter().find_map(|key| {
        hints.get(*key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
    })
}

/// Word-boundary containment without compiling a regex per keyword.
fn contains_word(haystack: &str, word: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(word) {
        let abs = start + pos;
        let before_ok = haystack[..abs]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let end = abs + word.len();
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end.max(abs + 1);
    }
    false
}

// ---------------------------------------------------------------------------
// Roast level
// ---------------------------------------------------------------------------

static ROAST_TAG_PATTERNS: Lazy<Vec<(Regex, RoastLevel, f32)>> = Lazy::new(|| {
    [
        (r"\blight[\s-]*roast\b", RoastLevel::Light, 0.9),
        (r"\bmedium[\s-]*dark[\s-]*roast\b", RoastLevel::MediumDark, 0.9),
        (r"\bmedium[\s-]*roast\b", RoastLevel::Medium, 0.9),
        (r"\bdark[\s-]*roast\b", RoastLevel::Dark, 0.9),
        (r"\bfrench[\s-]*roast\b", RoastLevel::French, 0.9),
        (r"\blight[\s-]*medium\s+roast\b", RoastLevel::LightMedium, 0.9),
        (r"\bcity[\s-]*plus\b|city\+", RoastLevel::CityPlus, 0.85),
        (r"\bfull[\s-]*city\b", RoastLevel::FullCity, 0.85),
        (r"\bcity\b", RoastLevel::City, 0.8),
        (r"\bfrench\b", RoastLevel::French, 0.8),
        (r"\bitalian\b", RoastLevel::Italian, 0.8),
        // espresso and filter are also brew methods, so score lower
        (r"\bespresso\b", RoastLevel::Espresso, 0.7),
        (r"\bcinnamon\b", RoastLevel::Cinnamon, 0.8),
        (r"\bfilter\b", RoastLevel::Filter, 0.7),
        (r"\bomni[\s-]*roast\b", RoastLevel::Omniroast, 0.85),
    ]
    .into_iter()
    .map(|(pattern, level, conf)| (Regex::new(pattern).unwrap(), level, conf))
    .collect()
});

static ROAST_EXPLICIT_PATTERNS: Lazy<Vec<(Regex, f32)>> = Lazy::new(|| {
    const LEVELS: &str = "light[\\s-]*medium|medium[\\s-]*light|medium[\\s-]*dark|light|medium|dark|city[\\s-]*plus|city\\+|full[\\s-]*city|city|french|italian|espresso|cinnamon|filter|omni[\\s-]*roast";
    vec![
        (
            Regex::new(&format!(
                r"roast(?:ed)?\s*(?:level)?(?:\s*(?:is|:))?\s*({LEVELS})"
            ))
            .unwrap(),
            0.8,
        ),
        (
            Regex::new(&format!(r"({LEVELS})\s+roast(?:ed)?")).unwrap(),
            0.75,
        ),
    ]
});

/// Low-confidence roast words; "medium" and "dark" are everyday words, so
/// they only count when the text also talks about roasting or a profile.
static ROAST_WORDS: &[(&str, RoastLevel, f32)] = &[
    ("medium-light", RoastLevel::LightMedium, 0.6),
    ("medium light", RoastLevel::LightMedium, 0.6),
    ("medium-dark", RoastLevel::MediumDark, 0.6),
    ("medium dark", RoastLevel::MediumDark, 0.6),
    ("light", RoastLevel::Light, 0.6),
    ("medium", RoastLevel::Medium, 0.55),
    ("dark", RoastLevel::Dark, 0.55),
];

/// Extract the roast level via the strategy waterfall.
pub fn extract_roast_level(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(RoastLevel, f32)> {
    if let Some(raw) = hint_str(hints, &["roast_level", "roast", "roastLevel", "roast-level"]) {
        return Some((RoastLevel::standardize(raw), 0.95));
    }

    for tag in tags {
        let tag = tag.to_lowercase();
        for (pattern, level, conf) in ROAST_TAG_PATTERNS.iter() {
            if pattern.is_match(&tag) {
                return Some((*level, *conf));
            }
        }
    }

    let lower = text.to_lowercase();
    for (pattern, conf) in ROAST_EXPLICIT_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(&lower) {
            return Some((RoastLevel::standardize(&cap[1]), *conf));
        }
    }

    for (word, level, conf) in ROAST_WORDS {
        if contains_word(&lower, word)
            && (lower.contains("roast") || lower.contains("profile"))
        {
            return Some((*level, *conf));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Bean type
// ---------------------------------------------------------------------------

static BEAN_TAG_PATTERNS: &[(&str, BeanType, f32)] = &[
    ("arabica-robusta", BeanType::ArabicaRobusta, 0.9),
    ("arabica robusta", BeanType::ArabicaRobusta, 0.9),
    ("mixed-arabica", BeanType::MixedArabica, 0.9),
    ("mixed arabica", BeanType::MixedArabica, 0.9),
    ("arabica", BeanType::Arabica, 0.9),
    ("robusta", BeanType::Robusta, 0.9),
    ("liberica", BeanType::Liberica, 0.9),
    // "blend" turns up in non-bean contexts, so slightly lower
    ("blend", BeanType::Blend, 0.8),
];

static BEAN_EXPLICIT_PATTERNS: Lazy<Vec<(Regex, BeanType, f32)>> = Lazy::new(|| {
    [
        (
            r"(?:bean|coffee)(?:\s*(?:type|variety))?(?:\s*(?:is|:))?\s*(?:100%\s*)?arabica",
            BeanType::Arabica,
            0.85,
        ),
        (
            r"(?:bean|coffee)(?:\s*(?:type|variety))?(?:\s*(?:is|:))?\s*(?:100%\s*)?robusta",
            BeanType::Robusta,
            0.85,
        ),
        (
            r"(?:bean|coffee)(?:\s*(?:type|variety))?(?:\s*(?:is|:))?\s*(?:100%\s*)?liberica",
            BeanType::Liberica,
            0.85,
        ),
        (
            r"(?:bean|coffee)(?:\s*(?:type|variety))?(?:\s*(?:is|:))?\s*blend",
            BeanType::Blend,
            0.8,
        ),
        (r"100%\s*arabica", BeanType::Arabica, 0.8),
        (r"100%\s*robusta", BeanType::Robusta, 0.8),
        (r"100%\s*liberica", BeanType::Liberica, 0.8),
    ]
    .into_iter()
    .map(|(pattern, bean, conf)| (Regex::new(pattern).unwrap(), bean, conf))
    .collect()
});

static BEAN_KEYWORDS: &[(&str, BeanType, f32)] = &[
    ("arabica", BeanType::Arabica, 0.6),
    ("robusta", BeanType::Robusta, 0.6),
    ("liberica", BeanType::Liberica, 0.6),
    ("blend", BeanType::Blend, 0.5),
];

/// Extract the bean type via the strategy waterfall.
pub fn extract_bean_type(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(BeanType, f32)> {
    if let Some(raw) = hint_str(hints, &["bean_type", "beanType", "bean-type", "bean", "variety"]) {
        return Some((BeanType::standardize(raw), 0.95));
    }

    for tag in tags {
        let tag = tag.to_lowercase();
        for (term, bean, conf) in BEAN_TAG_PATTERNS {
            if contains_word(&tag, term) {
                return Some((*bean, *conf));
            }
        }
    }

    let lower = text.to_lowercase();
    // Species combinations beat single-species declarations
    if contains_word(&lower, "arabica") && contains_word(&lower, "robusta") {
        return Some((BeanType::ArabicaRobusta, 0.85));
    }
    for (pattern, bean, conf) in BEAN_EXPLICIT_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            return Some((*bean, *conf));
        }
    }

    // Varietal names imply arabica, but only by inference
    for varietal in BeanType::ARABICA_VARIETALS {
        if contains_word(&lower, varietal) {
            return Some((BeanType::Arabica, 0.75));
        }
    }

    for (keyword, bean, conf) in BEAN_KEYWORDS {
        if contains_word(&lower, keyword) {
            return Some((*bean, *conf));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Processing method
// ---------------------------------------------------------------------------

static PROCESS_TAG_PATTERNS: Lazy<Vec<(Regex, ProcessMethod, f32)>> = Lazy::new(|| {
    [
        (r"\b(washed|wet[\s-]*process)\b", ProcessMethod::Washed, 0.9),
        (r"\b(natural|dry[\s-]*process)\b", ProcessMethod::Natural, 0.9),
        (r"\b(honey|pulped[\s-]*natural)\b", ProcessMethod::Honey, 0.9),
        (r"\banaerobic\b", ProcessMethod::Anaerobic, 0.9),
        (
            r"\b(monsooned|monsoon[\s-]*process)\b",
            ProcessMethod::Monsooned,
            0.9,
        ),
        (r"\bwet[\s-]*hulled\b", ProcessMethod::WetHulled, 0.9),
        (
            r"\bcarbonic[\s-]*maceration\b",
            ProcessMethod::CarbonicMaceration,
            0.9,
        ),
        (
            r"\bdouble[\s-]*fermented\b",
            ProcessMethod::DoubleFermented,
            0.9,
        ),
    ]
    .into_iter()
    .map(|(pattern, method, conf)| (Regex::new(pattern).unwrap(), method, conf))
    .collect()
});

static PROCESS_EXPLICIT_PATTERNS: Lazy<Vec<(Regex, f32)>> = Lazy::new(|| {
    const METHODS: &str = "washed|natural|honey|anaerobic|monsooned|wet[\\s-]*hulled|carbonic[\\s-]*maceration|double[\\s-]*fermented";
    vec![
        (
            Regex::new(&format!(
                r"process(?:ing)?(?:\s*(?:method|type))?(?:\s*(?:is|:))?\s*({METHODS})"
            ))
            .unwrap(),
            0.8,
        ),
        (
            Regex::new(&format!(
                r"({METHODS})(?:\s*(?:process|processing|processed))"
            ))
            .unwrap(),
            0.8,
        ),
    ]
});

static PROCESS_KEYWORDS: &[(&str, ProcessMethod, f32)] = &[
    ("washed", ProcessMethod::Washed, 0.7),
    ("wet process", ProcessMethod::Washed, 0.7),
    // "natural" and "honey" double as everyday words / flavor notes
    ("natural", ProcessMethod::Natural, 0.65),
    ("dry process", ProcessMethod::Natural, 0.7),
    ("honey", ProcessMethod::Honey, 0.65),
    ("pulped natural", ProcessMethod::PulpedNatural, 0.7),
    ("anaerobic", ProcessMethod::Anaerobic, 0.7),
    ("monsooned", ProcessMethod::Monsooned, 0.7),
    ("monsoon malabar", ProcessMethod::Monsooned, 0.7),
    ("wet hulled", ProcessMethod::WetHulled, 0.7),
    ("carbonic maceration", ProcessMethod::CarbonicMaceration, 0.7),
    ("double fermented", ProcessMethod::DoubleFermented, 0.7),
];

/// Extract the processing method via the strategy waterfall.
pub fn extract_processing_method(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(ProcessMethod, f32)> {
    if let Some(raw) = hint_str(
        hints,
        &["processing_method", "process", "processing", "process_method"],
    ) {
        return Some((ProcessMethod::standardize(raw), 0.95));
    }

    for tag in tags {
        let tag = tag.to_lowercase();
        for (pattern, method, conf) in PROCESS_TAG_PATTERNS.iter() {
            if pattern.is_match(&tag) {
                return Some((*method, *conf));
            }
        }
    }

    let lower = text.to_lowercase();
    for (pattern, conf) in PROCESS_EXPLICIT_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(&lower) {
            return Some((ProcessMethod::standardize(&cap[1]), *conf));
        }
    }

    for (keyword, method, conf) in PROCESS_KEYWORDS {
        if contains_word(&lower, keyword) {
            return Some((*method, *conf));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Cup profile: acidity, sweetness, body, aroma
// ---------------------------------------------------------------------------

static ACIDITY_TAG_PATTERNS: Lazy<Vec<(Regex, &'static str, f32)>> = Lazy::new(|| {
    [
        (r"\bacidity[\s-]*medium[\s-]*high\b", "medium high", 0.9),
        (r"\bacidity[\s-]*low\b", "low", 0.9),
        (r"\bacidity[\s-]*medium\b", "medium", 0.9),
        (r"\bacidity[\s-]*high\b", "high", 0.9),
        (r"\blow[\s-]*acidity\b", "low", 0.9),
        (r"\bmedium[\s-]*acidity\b", "medium", 0.9),
        (r"\bhigh[\s-]*acidity\b", "high", 0.9),
        (r"\bbright[\s-]*acidity\b", "bright", 0.85),
        (r"\bmellow[\s-]*acidity\b", "mellow", 0.85),
        (r"\bcrisp[\s-]*acidity\b", "crisp", 0.85),
    ]
    .into_iter()
    .map(|(pattern, level, conf)| (Regex::new(pattern).unwrap(), level, conf))
    .collect()
});

static ACIDITY_TEXT_PATTERNS: Lazy<Vec<(Regex, f32)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(?:acidity|acidic)\s+(?:is\s+)?(low|medium|high|bright|mellow|crisp)\b")
                .unwrap(),
            0.8,
        ),
        (
            Regex::new(r"\b(low|medium|high|bright|mellow|crisp)\s+(?:acidity|acidic)\b").unwrap(),
            0.8,
        ),
    ]
});

static ACIDITY_KEYWORDS: &[(&str, &str, f32)] = &[
    ("low acidity", "low", 0.7),
    ("medium acidity", "medium", 0.7),
    ("high acidity", "high", 0.7),
    ("bright", "bright", 0.6),
    ("crisp", "crisp", 0.6),
    ("mellow", "mellow", 0.6),
];

/// Extract the acidity description via the strategy waterfall.
pub fn extract_acidity(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(String, f32)> {
    if let Some(raw) = hint_str(hints, &["acidity", "acidity_level", "acidityLevel"]) {
        return Some((raw.to_lowercase(), 0.95));
    }
    for tag in tags {
        let tag = tag.to_lowercase();
        for (pattern, level, conf) in ACIDITY_TAG_PATTERNS.iter() {
            if pattern.is_match(&tag) {
                return Some(((*level).to_string(), *conf));
            }
        }
    }
    let lower = text.to_lowercase();
    for (pattern, conf) in ACIDITY_TEXT_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(&lower) {
            return Some((cap[1].to_string(), *conf));
        }
    }
    for (keyword, level, conf) in ACIDITY_KEYWORDS {
        if contains_word(&lower, keyword) {
            return Some(((*level).to_string(), *conf));
        }
    }
    None
}

static SWEETNESS_TAG_PATTERNS: Lazy<Vec<(Regex, &'static str, f32)>> = Lazy::new(|| {
    [
        (r"\bsweetness[\s-]*medium[\s-]*high\b", "medium high", 0.9),
        (r"\bsweetness[\s-]*low\b", "low", 0.9),
        (r"\bsweetness[\s-]*medium\b", "medium", 0.9),
        (r"\bsweetness[\s-]*high\b", "high", 0.9),
        (r"\blow[\s-]*sweetness\b", "low", 0.9),
        (r"\bmedium[\s-]*sweetness\b", "medium", 0.9),
        (r"\bhigh[\s-]*sweetness\b", "high", 0.9),
        (r"\bmedium[\s-]*high[\s-]*sweetness\b", "medium high", 0.9),
    ]
    .into_iter()
    .map(|(pattern, level, conf)| (Regex::new(pattern).unwrap(), level, conf))
    .collect()
});

/// Bitterness tags read in reverse: low bitterness suggests a sweet cup.
static BITTERNESS_TAG_PATTERNS: Lazy<Vec<(Regex, &'static str, f32)>> = Lazy::new(|| {
    [
        (r"\bbitterness[\s-]*medium[\s-]*high\b", "low", 0.7),
        (r"\bbitterness[\s-]*low\b", "high", 0.7),
        (r"\bbitterness[\s-]*medium\b", "medium", 0.7),
        (r"\bbitterness[\s-]*high\b", "low", 0.7),
        (r"\blow[\s-]*bitterness\b", "high", 0.7),
        (r"\bmedium[\s-]*bitterness\b", "medium", 0.7),
        (r"\bhigh[\s-]*bitterness\b", "low", 0.7),
    ]
    .into_iter()
    .map(|(pattern, level, conf)| (Regex::new(pattern).unwrap(), level, conf))
    .collect()
});

static SWEETNESS_TEXT_PATTERNS: Lazy<Vec<(Regex, f32)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(?:sweetness|sweet)\s+(?:is\s+)?(low|medium|high|bright|mellow)\b")
                .unwrap(),
            0.8,
        ),
        (
            Regex::new(r"\b(low|medium|high|bright|mellow)\s+(?:sweetness|sweet)\b").unwrap(),
            0.8,
        ),
    ]
});

static SWEET_FLAVOR_KEYWORDS: &[&str] = &[
    "honey-like",
    "caramel",
    "brown sugar",
    "maple",
    "molasses",
    "toffee",
    "butterscotch",
];

/// Extract the sweetness description, inferring from bitterness tags when
/// sweetness is not stated directly.
pub fn extract_sweetness(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(String, f32)> {
    if let Some(raw) = hint_str(hints, &["sweetness", "sweetness_level", "sweetnessLevel"]) {
        return Some((raw.to_lowercase(), 0.95));
    }
    for tag in tags {
        let tag = tag.to_lowercase();
        for (pattern, level, conf) in SWEETNESS_TAG_PATTERNS.iter() {
            if pattern.is_match(&tag) {
                return Some(((*level).to_string(), *conf));
            }
        }
    }
    for tag in tags {
        let tag = tag.to_lowercase();
        for (pattern, level, conf) in BITTERNESS_TAG_PATTERNS.iter() {
            if pattern.is_match(&tag) {
                return Some(((*level).to_string(), *conf));
            }
        }
    }
    let lower = text.to_lowercase();
    for (pattern, conf) in SWEETNESS_TEXT_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(&lower) {
            return Some((cap[1].to_string(), *conf));
        }
    }
    for keyword in SWEET_FLAVOR_KEYWORDS {
        if contains_word(&lower, keyword) {
            return Some(("high".to_string(), 0.7));
        }
    }
    None
}

static BODY_TAG_PATTERNS: Lazy<Vec<(Regex, &'static str, f32)>> = Lazy::new(|| {
    [
        (r"\bbody[\s-]*light\b", "light", 0.9),
        (r"\bbody[\s-]*medium\b", "medium", 0.9),
        (r"\bbody[\s-]*high\b", "high", 0.9),
        (r"\bbody[\s-]*full\b", "full", 0.9),
        (r"\blight[\s-]*body\b", "light", 0.9),
        (r"\bmedium[\s-]*body\b", "medium", 0.9),
        (r"\bheavy[\s-]*body\b", "full", 0.9),
        (r"\bfull[\s-]*body\b", "full", 0.9),
        (r"\bsyrupy[\s-]*body\b", "full", 0.85),
        (r"\btea[\s-]*like[\s-]*body\b", "light", 0.85),
    ]
    .into_iter()
    .map(|(pattern, level, conf)| (Regex::new(pattern).unwrap(), level, conf))
    .collect()
});

static BODY_TEXT_PATTERNS: Lazy<Vec<(Regex, f32)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(
                r"\b(?:body|mouthfeel)\s+(?:is\s+)?(light|medium|heavy|full|syrupy|tea[\s-]*like)\b",
            )
            .unwrap(),
            0.8,
        ),
        (
            Regex::new(
                r"\b(light|medium|heavy|full|syrupy|tea[\s-]*like)\s+(?:body|mouthfeel)\b",
            )
            .unwrap(),
            0.8,
        ),
    ]
});

static BODY_KEYWORDS: &[(&str, &str, f32)] = &[
    ("full-bodied", "full", 0.7),
    ("light-bodied", "light", 0.7),
    ("syrupy", "full", 0.7),
    ("velvety", "full", 0.7),
    ("tea-like", "light", 0.7),
    ("thin", "light", 0.7),
];

/// Extract the body description via the strategy waterfall.
pub fn extract_body(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(String, f32)> {
    if let Some(raw) = hint_str(hints, &["body", "body_level", "bodyLevel"]) {
        return Some((raw.to_lowercase(), 0.95));
    }
    for tag in tags {
        let tag = tag.to_lowercase();
        for (pattern, level, conf) in BODY_TAG_PATTERNS.iter() {
            if pattern.is_match(&tag) {
                return Some(((*level).to_string(), *conf));
            }
        }
    }
    let lower = text.to_lowercase();
    for (pattern, conf) in BODY_TEXT_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(&lower) {
            let level = if cap[1].starts_with("heavy") {
                "full".to_string()
            } else {
                cap[1].to_string()
            };
            return Some((level, *conf));
        }
    }
    for (keyword, level, conf) in BODY_KEYWORDS {
        if contains_word(&lower, keyword) {
            return Some(((*level).to_string(), *conf));
        }
    }
    None
}

static AROMA_TEXT_PATTERNS: Lazy<Vec<(Regex, f32)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(?:aroma|fragrance)\s+(?:of|is)\s+([\w\s]+)").unwrap(),
            0.8,
        ),
        (
            Regex::new(r"\b(?:with|has)\s+(?:aroma|fragrance)\s+of\s+([\w\s]+)").unwrap(),
            0.8,
        ),
    ]
});

static AROMA_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(and|with|notes?|profile|include)\b").unwrap());

static AROMA_KEYWORDS: &[(&str, &str, f32)] = &[
    ("jasmine", "floral", 0.7),
    ("rose", "floral", 0.7),
    ("cinnamon", "spicy", 0.7),
    ("vanilla", "sweet", 0.7),
    ("floral", "floral", 0.6),
    ("nutty", "nutty", 0.6),
    ("spicy", "spicy", 0.6),
    ("chocolaty", "chocolaty", 0.6),
    ("fruity", "fruity", 0.6),
    ("earthy", "earthy", 0.6),
    ("woody", "woody", 0.6),
];

/// Extract the aroma description via the strategy waterfall.
pub fn extract_aroma(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(String, f32)> {
    if let Some(raw) = hint_str(hints, &["aroma", "aroma_description", "aromaDescription"]) {
        return Some((raw.to_lowercase(), 0.95));
    }
    for tag in tags {
        let tag = tag.to_lowercase();
        if let Some(rest) = tag.strip_prefix("aroma-").or_else(|| tag.strip_prefix("aroma ")) {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some((rest.to_string(), 0.9));
            }
        }
    }
    let lower = text.to_lowercase();
    for (pattern, conf) in AROMA_TEXT_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(&lower) {
            let aroma = AROMA_FILLER.replace_all(&cap[1], "");
            let aroma = aroma.split_whitespace().collect::<Vec<_>>().join(" ");
            if !aroma.is_empty() {
                return Some((aroma, *conf));
            }
        }
    }
    for (keyword, aroma, conf) in AROMA_KEYWORDS {
        if contains_word(&lower, keyword) {
            return Some(((*aroma).to_string(), *conf));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Flavor profiles
// ---------------------------------------------------------------------------

/// Flavor descriptors worth keeping; anything else in a notes list is noise.
pub static KNOWN_FLAVORS: &[&str] = &[
    "chocolate",
    "cocoa",
    "nutty",
    "nuts",
    "almond",
    "hazelnut",
    "caramel",
    "toffee",
    "butterscotch",
    "fruity",
    "berry",
    "blueberry",
    "strawberry",
    "cherry",
    "citrus",
    "lemon",
    "orange",
    "lime",
    "floral",
    "jasmine",
    "rose",
    "spice",
    "cinnamon",
    "vanilla",
    "earthy",
    "woody",
    "tobacco",
    "cedar",
    "honey",
    "maple",
    "malt",
    "molasses",
    "stone fruit",
    "peach",
    "apricot",
    "plum",
    "tropical",
    "pineapple",
    "mango",
    "coconut",
    "apple",
    "pear",
    "wine",
    "winey",
    "grapes",
    "blackcurrant",
    "melon",
    "herbal",
    "roasted",
];

static NOTES_OF_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:notes|flavors|flavours|aromas|tasting\s*profile)\s+of\s+([\w\s,&+]+)").unwrap()
});

/// Explicitly labelled flavor sections, e.g. "FLAVOUR NOTES: ..." or
/// "Taste Notes - Juicy Mango, Mixed berries".
static FLAVOR_SECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?is)(?:FLAVOUR|FLAVOR)\s+NOTES:\s*(.*?)(?:\.|$)").unwrap(),
        Regex::new(r"(?is)Taste\s+Notes\s*[-:]\s*(.*?)(?:\.|$)").unwrap(),
    ]
});

fn known_flavors_in(text: &str) -> Vec<String> {
    let mut found: Vec<String> = KNOWN_FLAVORS
        .iter()
        .filter(|flavor| text.contains(*flavor))
        .map(|flavor| (*flavor).to_string())
        .collect();
    found.dedup();
    found
}

/// Extract flavor profiles. Explicit "notes of" enumeration is
/// higher-precision than incidental mentions, so it is tried first.
pub fn extract_flavor_profiles(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(Vec<String>, f32)> {
    if let Some(raw) = hint_str_list(
        hints,
        &["flavor_profiles", "flavor_notes", "tasting_notes", "flavors"],
    ) {
        let valid: Vec<String> = raw
            .iter()
            .map(|f| f.to_lowercase())
            .filter(|f| KNOWN_FLAVORS.iter().any(|kf| f.contains(kf)))
            .collect();
        if !valid.is_empty() {
            return Some((valid, 0.95));
        }
    }

    let mut tag_flavors = Vec::new();
    for tag in tags {
        let tag = tag.to_lowercase();
        for flavor in KNOWN_FLAVORS {
            if tag.contains(flavor) && !tag_flavors.contains(&(*flavor).to_string()) {
                tag_flavors.push((*flavor).to_string());
            }
        }
    }
    if !tag_flavors.is_empty() {
        return Some((tag_flavors, 0.9));
    }

    let lower = text.to_lowercase();
    if let Some(cap) = NOTES_OF_PATTERN.captures(&lower) {
        let flavors = known_flavors_in(&cap[1]);
        if !flavors.is_empty() {
            return Some((flavors, 0.85));
        }
    }

    for pattern in FLAVOR_SECTION_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(text) {
            let flavors = known_flavors_in(&cap[1].to_lowercase());
            if !flavors.is_empty() {
                return Some((flavors, 0.8));
            }
        }
    }

    let flavors = known_flavors_in(&lower);
    if !flavors.is_empty() {
        return Some((flavors, 0.7));
    }

    None
}

// ---------------------------------------------------------------------------
// Flags: milk suitability, single origin, seasonal
// ---------------------------------------------------------------------------

static MILK_POSITIVE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bwith[\s-]*milk\b",
        r"\bmilk[\s-]*suitable\b",
        r"\bsuitable[\s-]*(?:with|for)[\s-]*milk\b",
        r"\b(?:good|perfect)[\s-]*with[\s-]*milk\b",
        r"\bespresso[\s-]*based\b",
        r"\blatte\b",
        r"\bcappuccino\b",
        r"\bmacchiato\b",
        r"\bmilk[\s-]*drinks?\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static MILK_NEGATIVE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bblack[\s-]*only\b",
        r"\bnot[\s-]*(?:suitable[\s-]*)?with[\s-]*milk\b",
        r"\bavoid[\s-]*milk\b",
        r"\bno[\s-]*milk\b",
        r"\bbest[\s-]*black\b",
        r"\bdrink[\s-]*black\b",
        // these brew methods are conventionally taken black
        r"\bpour[\s-]*over\b",
        r"\baeropress\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Detect whether the coffee suits milk drinks. Falls back to roast-level
/// inference: darker roasts generally carry milk, lighter ones do not.
pub fn detect_with_milk_suitable(
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) -> Option<(bool, f32)> {
    if let Some(flag) = hint_bool(hints, &["with_milk_suitable", "milk_suitable", "milkSuitable"]) {
        return Some((flag, 0.95));
    }
    for tag in tags {
        let tag = tag.to_lowercase();
        if MILK_POSITIVE.iter().any(|p| p.is_match(&tag)) {
            return Some((true, 0.9));
        }
        if MILK_NEGATIVE.iter().any(|p| p.is_match(&tag)) {
            return Some((false, 0.9));
        }
    }
    let lower = text.to_lowercase();
    if MILK_POSITIVE.iter().any(|p| p.is_match(&lower)) {
        return Some((true, 0.8));
    }
    if MILK_NEGATIVE.iter().any(|p| p.is_match(&lower)) {
        return Some((false, 0.8));
    }
    static DARK_ROAST: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b(?:dark|french|italian)\s+roast\b").unwrap());
    static LIGHT_ROAST: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b(?:light|medium)\s+roast\b").unwrap());
    if DARK_ROAST.is_match(&lower) {
        return Some((true, 0.6));
    }
    if LIGHT_ROAST.is_match(&lower) {
        return Some((false, 0.6));
    }
    None
}

/// Producing countries and origin markers that suggest single-origin lots.
static ORIGIN_INDICATORS: &[&str] = &[
    "estate",
    "farm",
    "ethiopia",
    "colombian",
    "kenya",
    "sumatra",
    "guatemala",
    "brazil",
    "costa rica",
    "honduras",
    "rwanda",
    "burundi",
    "el salvador",
    "nicaragua",
    "panama",
    "indonesia",
    "india",
    "vietnam",
    "mexico",
    "peru",
    "jamaica",
    "hawaii",
    "kona",
];

static SINGLE_ORIGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsingle[\s-]*origin\b").unwrap());

/// Detect whether a product is single origin as opposed to a blend.
pub fn detect_is_single_origin(
    name: &str,
    text: &str,
    tags: &[String],
) -> Option<(bool, f32)> {
    let name_lower = name.to_lowercase();
    let text_lower = text.to_lowercase();

    if SINGLE_ORIGIN.is_match(&name_lower) || SINGLE_ORIGIN.is_match(&text_lower) {
        return Some((true, 0.95));
    }
    for tag in tags {
        let tag = tag.to_lowercase();
        if SINGLE_ORIGIN.is_match(&tag) {
            return Some((true, 0.9));
        }
        if contains_word(&tag, "blend") {
            return Some((false, 0.9));
        }
    }
    for origin in ORIGIN_INDICATORS {
        if contains_word(&name_lower, origin) {
            return Some((true, 0.85));
        }
    }
    if contains_word(&name_lower, "blend") || contains_word(&name_lower, "mix") {
        return Some((false, 0.85));
    }
    if text_lower.contains("single farm") || text_lower.contains("one farm") {
        return Some((true, 0.8));
    }
    for origin in ORIGIN_INDICATORS {
        if contains_word(&text_lower, origin)
            && (text_lower.contains("from")
                || text_lower.contains("origin")
                || text_lower.contains("region"))
        {
            return Some((true, 0.75));
        }
    }
    // Absent any blend indicator, lean single origin at low confidence
    if !contains_word(&text_lower, "blend") && !contains_word(&text_lower, "mix") {
        return Some((true, 0.6));
    }
    None
}

static SEASONAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bseasonal\b",
        r"\blimited\s+(?:time|edition|release|availability)\b",
        r"\bavailable\s+(?:only|just)\s+for\b",
        r"\bspecial\s+harvest\b",
        r"\bwhile\s+supplies\s+last\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SEASON_WORDS: &[&str] = &[
    "summer", "winter", "spring", "autumn", "fall", "holiday", "christmas", "festival",
];

/// Detect whether a product is a seasonal or limited release.
pub fn detect_is_seasonal(name: &str, text: &str, tags: &[String]) -> Option<(bool, f32)> {
    for tag in tags {
        let tag = tag.to_lowercase();
        if contains_word(&tag, "seasonal") || contains_word(&tag, "limited") {
            return Some((true, 0.9));
        }
    }
    let name_lower = name.to_lowercase();
    if contains_word(&name_lower, "seasonal") || contains_word(&name_lower, "limited") {
        return Some((true, 0.85));
    }
    let text_lower = text.to_lowercase();
    if SEASONAL_PATTERNS.iter().any(|p| p.is_match(&text_lower)) {
        return Some((true, 0.8));
    }
    for season in SEASON_WORDS {
        if contains_word(&name_lower, season) {
            return Some((true, 0.8));
        }
        if contains_word(&text_lower, season) {
            return Some((true, 0.7));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// `"<N>% <bean> ... <N>% <bean>"` name fragments mark an explicit blend.
static PERCENT_BLEND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)%\s*([a-zA-Z]+).*?(\d+)%\s*([a-zA-Z]+)").unwrap());

/// Run every extractor over a candidate and fold the results in. Values
/// only overwrite earlier ones through the confidence map's
/// stronger-evidence rule; the extractors themselves never mutate state.
pub fn extract_all(
    coffee: &mut Coffee,
    text: &str,
    tags: &[String],
    hints: Option<&HashMap<String, Value>>,
) {
    if let Some((level, conf)) = extract_roast_level(text, tags, hints) {
        if coffee.confidence.record_if_higher("roast_level", conf) {
            coffee.roast_level = Some(level);
        }
    }
    if let Some((bean, conf)) = extract_bean_type(text, tags, hints) {
        if coffee.confidence.record_if_higher("bean_type", conf) {
            coffee.bean_type = Some(bean);
        }
    }
    if let Some((method, conf)) = extract_processing_method(text, tags, hints) {
        if coffee.confidence.record_if_higher("processing_method", conf) {
            coffee.processing_method = Some(method);
        }
    }
    if let Some((acidity, conf)) = extract_acidity(text, tags, hints) {
        if coffee.confidence.record_if_higher("acidity", conf) {
            coffee.acidity = Some(acidity);
        }
    }
    if let Some((sweetness, conf)) = extract_sweetness(text, tags, hints) {
        if coffee.confidence.record_if_higher("sweetness", conf) {
            coffee.sweetness = Some(sweetness);
        }
    }
    if let Some((body, conf)) = extract_body(text, tags, hints) {
        if coffee.confidence.record_if_higher("body", conf) {
            coffee.body = Some(body);
        }
    }
    if let Some((aroma, conf)) = extract_aroma(text, tags, hints) {
        if coffee.confidence.record_if_higher("aroma", conf) {
            coffee.aroma = Some(aroma);
        }
    }
    if let Some((flavors, conf)) = extract_flavor_profiles(text, tags, hints) {
        if coffee.confidence.record_if_higher("flavor_profiles", conf) {
            coffee.flavor_profiles = flavors;
        }
    }
    let name = coffee.name.clone();
    if let Some((single, conf)) = detect_is_single_origin(&name, text, tags) {
        if coffee.confidence.record_if_higher("is_single_origin", conf) {
            coffee.is_single_origin = Some(single);
        }
    }
    if let Some((seasonal, conf)) = detect_is_seasonal(&name, text, tags) {
        if coffee.confidence.record_if_higher("is_seasonal", conf) {
            coffee.is_seasonal = Some(seasonal);
        }
    }
    if let Some((milk, conf)) = detect_with_milk_suitable(text, tags, hints) {
        if coffee.confidence.record_if_higher("with_milk_suitable", conf) {
            coffee.with_milk_suitable = Some(milk);
        }
    }

    derive_blend_flag(coffee);
}

/// Blend detection is derived, not extracted: the bean type, the
/// single-origin flag, the name, and explicit percentage fragments all
/// feed it. A detected blend defaults `is_single_origin` to false unless
/// already set.
fn derive_blend_flag(coffee: &mut Coffee) {
    let name_lower = coffee.name.to_lowercase();
    let mut blend_detected = false;

    if let Some(cap) = PERCENT_BLEND.captures(&name_lower) {
        blend_detected = true;
        if coffee.bean_type.is_none() {
            let first = cap[2].to_lowercase();
            let second = cap[4].to_lowercase();
            if (first.contains("arabica") && second.contains("robusta"))
                || (first.contains("robusta") && second.contains("arabica"))
            {
                if coffee.confidence.record_if_higher("bean_type", 0.9) {
                    coffee.bean_type = Some(BeanType::ArabicaRobusta);
                }
            }
        }
    }

    if coffee.bean_type.is_some_and(|bean| bean.is_blendish()) {
        blend_detected = true;
    } else if coffee.is_single_origin == Some(false) {
        blend_detected = true;
    } else if contains_word(&name_lower, "blend") {
        blend_detected = true;
    }

    if blend_detected {
        coffee.is_blend = true;
        if coffee.is_single_origin.is_none() {
            coffee.is_single_origin = Some(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn structured_hint_wins_with_highest_confidence() {
        let mut hints = HashMap::new();
        hints.insert("roast_level".to_string(), Value::from("Medium Dark"));
        let (level, conf) =
            extract_roast_level("some dark text", &[], Some(&hints)).unwrap();
        assert_eq!(level, RoastLevel::MediumDark);
        assert!((conf - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn tag_match_beats_description() {
        let tag_list = tags(&["Light Roast"]);
        let (level, conf) =
            extract_roast_level("a dark and stormy description roast", &tag_list, None).unwrap();
        assert_eq!(level, RoastLevel::Light);
        assert!(conf >= 0.9);
    }

    #[test]
    fn explicit_declaration_in_description() {
        let (level, conf) =
            extract_roast_level("Roast level: medium dark, with cocoa", &[], None).unwrap();
        assert_eq!(level, RoastLevel::MediumDark);
        assert!((conf - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn bare_keyword_requires_roast_context() {
        assert!(extract_roast_level("a medium sized bag", &[], None).is_none());
        let (level, conf) =
            extract_roast_level("medium profile with chocolate", &[], None).unwrap();
        assert_eq!(level, RoastLevel::Medium);
        assert!(conf < 0.6);
    }

    #[rstest]
    #[case("100% arabica beans from Chikmagalur", BeanType::Arabica)]
    #[case("a mix of arabica and robusta", BeanType::ArabicaRobusta)]
    #[case("classic SL28 varietal lot", BeanType::Arabica)]
    fn bean_type_from_text(#[case] text: &str, #[case] expected: BeanType) {
        let (bean, _) = extract_bean_type(text, &[], None).unwrap();
        assert_eq!(bean, expected);
    }

    #[test]
    fn process_method_from_tag() {
        let tag_list = tags(&["Washed"]);
        let (method, conf) = extract_processing_method("", &tag_list, None).unwrap();
        assert_eq!(method, ProcessMethod::Washed);
        assert!(conf >= 0.9);
    }

    #[test]
    fn process_method_explicit_text() {
        let (method, conf) =
            extract_processing_method("process: carbonic maceration", &[], None).unwrap();
        assert_eq!(method, ProcessMethod::CarbonicMaceration);
        assert!((conf - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn flavor_profiles_prefer_notes_enumeration() {
        let (flavors, conf) =
            extract_flavor_profiles("Notes of citrus and floral with honey", &[], None).unwrap();
        assert!(flavors.contains(&"citrus".to_string()));
        assert!(flavors.contains(&"floral".to_string()));
        assert!((conf - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn flavor_section_label_capture() {
        let text = "Great coffee. FLAVOUR NOTES: juicy mango, mixed berry. Enjoy";
        let (flavors, conf) = extract_flavor_profiles(text, &[], None).unwrap();
        assert!(flavors.contains(&"mango".to_string()));
        assert!(flavors.contains(&"berry".to_string()));
        assert!((conf - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn incidental_flavor_mentions_score_lower() {
        let (flavors, conf) =
            extract_flavor_profiles("a hint of chocolate somewhere", &[], None).unwrap();
        assert_eq!(flavors, vec!["chocolate".to_string()]);
        assert!((conf - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn sweetness_inferred_from_bitterness_tag() {
        let tag_list = tags(&["Bitterness - Low"]);
        let (sweetness, conf) = extract_sweetness("", &tag_list, None).unwrap();
        assert_eq!(sweetness, "high");
        assert!((conf - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn milk_suitability_from_dark_roast_inference() {
        let (milk, conf) = detect_with_milk_suitable("a bold dark roast", &[], None).unwrap();
        assert!(milk);
        assert!((conf - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn single_origin_from_origin_name() {
        let (single, conf) =
            detect_is_single_origin("Ethiopia Yirgacheffe", "washed lot", &[]).unwrap();
        assert!(single);
        assert!((conf - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn blend_tag_rules_out_single_origin() {
        let tag_list = tags(&["House Blend"]);
        let (single, _) = detect_is_single_origin("Morning Cup", "", &tag_list).unwrap();
        assert!(!single);
    }

    #[test]
    fn seasonal_from_limited_release_text() {
        let (seasonal, conf) =
            detect_is_seasonal("Harvest Lot", "a limited release for the season", &[]).unwrap();
        assert!(seasonal);
        assert!((conf - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn extract_all_end_to_end_scenario() {
        let mut coffee = Coffee::new("Ethiopia Yirgacheffe");
        let tag_list = tags(&["Light Roast", "Washed"]);
        extract_all(
            &mut coffee,
            "Notes of citrus and floral",
            &tag_list,
            None,
        );

        assert_eq!(coffee.roast_level, Some(RoastLevel::Light));
        assert!(coffee.confidence.get("roast_level").unwrap() >= 0.9);
        assert_eq!(coffee.processing_method, Some(ProcessMethod::Washed));
        assert!(coffee.confidence.get("processing_method").unwrap() >= 0.9);
        assert!(coffee.flavor_profiles.contains(&"citrus".to_string()));
        assert!(coffee.flavor_profiles.contains(&"floral".to_string()));
        assert!((coffee.confidence.get("flavor_profiles").unwrap() - 0.85).abs() < 0.01);
        assert_eq!(coffee.is_single_origin, Some(true));
        assert!(!coffee.is_blend);
    }

    #[test]
    fn percentage_fragments_mark_blend_and_bean_type() {
        let mut coffee = Coffee::new("60% Arabica - 40% Robusta");
        extract_all(&mut coffee, "", &[], None);
        assert!(coffee.is_blend);
        assert_eq!(coffee.bean_type, Some(BeanType::ArabicaRobusta));
    }

    #[test]
    fn blend_name_defaults_single_origin_false() {
        let mut coffee = Coffee::new("Morning Blend");
        let tag_list = tags(&["House Blend"]);
        extract_all(&mut coffee, "our signature blend", &tag_list, None);
        assert!(coffee.is_blend);
        assert_eq!(coffee.is_single_origin, Some(false));
    }

    #[test]
    fn weaker_evidence_never_overwrites() {
        let mut coffee = Coffee::new("Test");
        coffee.roast_level = Some(RoastLevel::Light);
        coffee.confidence.record_if_higher("roast_level", 0.95);
        extract_all(&mut coffee, "dark roast", &[], None);
        assert_eq!(coffee.roast_level, Some(RoastLevel::Light));
        assert_eq!(coffee.confidence.get("roast_level"), Some(0.95));
    }
}
