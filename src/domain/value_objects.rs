//! Canonical value enums for coffee attributes
//!
//! Scraped attribute text arrives in dozens of spellings per concept.
//! Each enum owns a `standardize` constructor implementing the shared
//! canonicalization shape: exact-match table, then substring fallback,
//! then special-case fallbacks, then `Unknown`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Roast level of a coffee product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoastLevel {
    Light,
    LightMedium,
    Medium,
    MediumDark,
    Dark,
    City,
    CityPlus,
    FullCity,
    French,
    Italian,
    Cinnamon,
    Filter,
    Espresso,
    Omniroast,
    Unknown,
}

impl RoastLevel {
    /// Exact-match table of common roast terms to canonical values.
    const MAPPING: &'static [(&'static str, RoastLevel)] = &[
        // Light roasts
        ("light", RoastLevel::Light),
        ("light roast", RoastLevel::Light),
        ("cinnamon", RoastLevel::Cinnamon),
        ("half city", RoastLevel::Light),
        ("blonde", RoastLevel::Light),
        ("new england", RoastLevel::Light),
        // Light-medium roasts; city is technically light-medium
        ("light medium", RoastLevel::LightMedium),
        ("light-medium", RoastLevel::LightMedium),
        ("city", RoastLevel::LightMedium),
        // Medium roasts
        ("medium", RoastLevel::Medium),
        ("medium roast", RoastLevel::Medium),
        ("city+", RoastLevel::CityPlus),
        ("city plus", RoastLevel::CityPlus),
        ("full city", RoastLevel::FullCity),
        ("american", RoastLevel::Medium),
        ("breakfast", RoastLevel::Medium),
        // Medium-dark roasts
        ("medium dark", RoastLevel::MediumDark),
        ("medium-dark", RoastLevel::MediumDark),
        ("full city+", RoastLevel::MediumDark),
        ("full-city+", RoastLevel::MediumDark),
        ("vienna", RoastLevel::MediumDark),
        ("continental", RoastLevel::MediumDark),
        // Dark roasts
        ("dark", RoastLevel::Dark),
        ("dark roast", RoastLevel::Dark),
        ("french", RoastLevel::French),
        ("french roast", RoastLevel::French),
        ("italian", RoastLevel::Italian),
        ("italian roast", RoastLevel::Italian),
        ("espresso", RoastLevel::Espresso),
        ("espresso roast", RoastLevel::Espresso),
        ("high roast", RoastLevel::Dark),
        ("spanish", RoastLevel::Dark),
        // Specialty roasts
        ("omni", RoastLevel::Omniroast),
        ("omni roast", RoastLevel::Omniroast),
        ("omniroast", RoastLevel::Omniroast),
    ];

    /// Convert free roast-level text to a canonical value.
    pub fn standardize(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return RoastLevel::Unknown;
        }
        if let Some((_, level)) = Self::MAPPING.iter().find(|(term, _)| *term == text) {
            return *level;
        }
        if let Some((_, level)) = Self::MAPPING.iter().find(|(term, _)| text.contains(term)) {
            return *level;
        }
        // "filter" as a roast level is contested but some roasters use it
        if text.contains("filter") {
            tracing::debug!("Using 'filter' as roast level for: {}", text);
            return RoastLevel::Filter;
        }
        RoastLevel::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoastLevel::Light => "light",
            RoastLevel::LightMedium => "light-medium",
            RoastLevel::Medium => "medium",
            RoastLevel::MediumDark => "medium-dark",
            RoastLevel::Dark => "dark",
            RoastLevel::City => "city",
            RoastLevel::CityPlus => "city-plus",
            RoastLevel::FullCity => "full-city",
            RoastLevel::French => "french",
            RoastLevel::Italian => "italian",
            RoastLevel::Cinnamon => "cinnamon",
            RoastLevel::Filter => "filter",
            RoastLevel::Espresso => "espresso",
            RoastLevel::Omniroast => "omniroast",
            RoastLevel::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, RoastLevel::Unknown)
    }
}

impl fmt::Display for RoastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bean type of a coffee product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BeanType {
    Arabica,
    Robusta,
    Liberica,
    Blend,
    MixedArabica,
    ArabicaRobusta,
    Unknown,
}

impl BeanType {
    const MAPPING: &'static [(&'static str, BeanType)] = &[
        ("arabica", BeanType::Arabica),
        ("100% arabica", BeanType::Arabica),
        ("robusta", BeanType::Robusta),
        ("100% robusta", BeanType::Robusta),
        ("canephora", BeanType::Robusta),
        ("liberica", BeanType::Liberica),
        ("100% liberica", BeanType::Liberica),
        // Excelsa is usually classified as a type of liberica
        ("excelsa", BeanType::Liberica),
        ("blend", BeanType::Blend),
        ("coffee blend", BeanType::Blend),
        ("house blend", BeanType::Blend),
        ("espresso blend", BeanType::Blend),
        ("signature blend", BeanType::Blend),
        ("arabica blend", BeanType::MixedArabica),
        ("mixed arabica", BeanType::MixedArabica),
        ("arabica mix", BeanType::MixedArabica),
        ("arabica robusta", BeanType::ArabicaRobusta),
        ("arabica/robusta", BeanType::ArabicaRobusta),
        ("arabica and robusta", BeanType::ArabicaRobusta),
        ("arabica & robusta", BeanType::ArabicaRobusta),
        // Common ratio shorthand for arabica-robusta blends
        ("80/20 blend", BeanType::ArabicaRobusta),
        ("80/20", BeanType::ArabicaRobusta),
    ];

    /// Arabica varietals mapped back to the species.
    pub const ARABICA_VARIETALS: &'static [&'static str] = &[
        "bourbon",
        "typica",
        "gesha",
        "geisha",
        "sl28",
        "sl34",
        "sl-28",
        "sl-34",
        "caturra",
        "catuai",
        "catimor",
        "pacamara",
        "maragogipe",
        "pacas",
        "villa sarchi",
        "java",
        "mundo novo",
    ];

    /// Convert free bean-type text to a canonical value.
    pub fn standardize(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return BeanType::Unknown;
        }
        if let Some((_, bean)) = Self::MAPPING.iter().find(|(term, _)| *term == text) {
            return *bean;
        }
        // Combination checks before single-species substring matches
        if text.contains("arabica") && text.contains("robusta") {
            return BeanType::ArabicaRobusta;
        }
        if text.contains("arabica") && (text.contains("blend") || text.contains("mix")) {
            return BeanType::MixedArabica;
        }
        if Self::ARABICA_VARIETALS.iter().any(|v| text.contains(v)) {
            return BeanType::Arabica;
        }
        if text.contains("excelsa") {
            return BeanType::Liberica;
        }
        if text.contains("arabica") {
            return BeanType::Arabica;
        }
        if text.contains("robusta") {
            return BeanType::Robusta;
        }
        if text.contains("liberica") {
            return BeanType::Liberica;
        }
        if text.contains("blend") {
            return BeanType::Blend;
        }
        BeanType::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BeanType::Arabica => "arabica",
            BeanType::Robusta => "robusta",
            BeanType::Liberica => "liberica",
            BeanType::Blend => "blend",
            BeanType::MixedArabica => "mixed-arabica",
            BeanType::ArabicaRobusta => "arabica-robusta",
            BeanType::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, BeanType::Unknown)
    }

    /// Whether this bean type describes a blend rather than a single species.
    pub fn is_blendish(&self) -> bool {
        matches!(
            self,
            BeanType::Blend | BeanType::MixedArabica | BeanType::ArabicaRobusta
        )
    }
}

impl fmt::Display for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-harvest processing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessMethod {
    Washed,
    Natural,
    Honey,
    PulpedNatural,
    Anaerobic,
    Monsooned,
    WetHulled,
    CarbonicMaceration,
    DoubleFermented,
    Unknown,
}

impl ProcessMethod {
    const MAPPING: &'static [(&'static str, ProcessMethod)] = &[
        // Washed process
        ("washed", ProcessMethod::Washed),
        ("wet process", ProcessMethod::Washed),
        ("fully washed", ProcessMethod::Washed),
        ("traditional washed", ProcessMethod::Washed),
        ("water process", ProcessMethod::Washed),
        // Natural process
        ("natural", ProcessMethod::Natural),
        ("dry process", ProcessMethod::Natural),
        ("sun dried", ProcessMethod::Natural),
        ("sundried", ProcessMethod::Natural),
        ("unwashed", ProcessMethod::Natural),
        ("traditional natural", ProcessMethod::Natural),
        // Honey process
        ("honey", ProcessMethod::Honey),
        ("black honey", ProcessMethod::Honey),
        ("red honey", ProcessMethod::Honey),
        ("yellow honey", ProcessMethod::Honey),
        ("white honey", ProcessMethod::Honey),
        ("golden honey", ProcessMethod::Honey),
        ("pulped natural", ProcessMethod::PulpedNatural),
        ("semi-washed", ProcessMethod::Honey),
        ("semi washed", ProcessMethod::Honey),
        // Anaerobic process
        ("anaerobic", ProcessMethod::Anaerobic),
        ("anaerobic natural", ProcessMethod::Anaerobic),
        ("anaerobic washed", ProcessMethod::Anaerobic),
        ("anaerobic fermentation", ProcessMethod::Anaerobic),
        ("double anaerobic", ProcessMethod::Anaerobic),
        ("carbonic", ProcessMethod::CarbonicMaceration),
        ("carbonic maceration", ProcessMethod::CarbonicMaceration),
        // Wet hulled
        ("wet hulled", ProcessMethod::WetHulled),
        ("wet-hulled", ProcessMethod::WetHulled),
        ("giling basah", ProcessMethod::WetHulled),
        // Monsooned
        ("monsooned", ProcessMethod::Monsooned),
        ("monsoon", ProcessMethod::Monsooned),
        ("monsooning", ProcessMethod::Monsooned),
        ("monsooned malabar", ProcessMethod::Monsooned),
        // Double fermented
        ("double fermented", ProcessMethod::DoubleFermented),
        ("extended fermentation", ProcessMethod::DoubleFermented),
    ];

    /// Convert free processing-method text to a canonical value.
    pub fn standardize(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.is_empty() || text.contains("experimental") {
            return ProcessMethod::Unknown;
        }
        if let Some((_, method)) = Self::MAPPING.iter().find(|(term, _)| *term == text) {
            return *method;
        }
        if let Some((_, method)) = Self::MAPPING.iter().find(|(term, _)| text.contains(term)) {
            return *method;
        }
        if text.contains("double") && text.contains("ferment") {
            return ProcessMethod::DoubleFermented;
        }
        if text.contains("honey") {
            return ProcessMethod::Honey;
        }
        if text.contains("anaerobic") {
            return ProcessMethod::Anaerobic;
        }
        if text.contains("natural") || text.contains("dry") {
            return ProcessMethod::Natural;
        }
        if text.contains("washed") {
            return ProcessMethod::Washed;
        }
        ProcessMethod::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessMethod::Washed => "washed",
            ProcessMethod::Natural => "natural",
            ProcessMethod::Honey => "honey",
            ProcessMethod::PulpedNatural => "pulped-natural",
            ProcessMethod::Anaerobic => "anaerobic",
            ProcessMethod::Monsooned => "monsooned",
            ProcessMethod::WetHulled => "wet-hulled",
            ProcessMethod::CarbonicMaceration => "carbonic-maceration",
            ProcessMethod::DoubleFermented => "double-fermented",
            ProcessMethod::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ProcessMethod::Unknown)
    }
}

impl fmt::Display for ProcessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Light Roast", RoastLevel::Light)]
    #[case("blonde", RoastLevel::Light)]
    #[case("City+", RoastLevel::CityPlus)]
    #[case("Full City", RoastLevel::FullCity)]
    #[case("Vienna", RoastLevel::MediumDark)]
    #[case("omni roast", RoastLevel::Omniroast)]
    #[case("filter profile", RoastLevel::Filter)]
    #[case("something else", RoastLevel::Unknown)]
    #[case("", RoastLevel::Unknown)]
    fn roast_level_standardization(#[case] input: &str, #[case] expected: RoastLevel) {
        assert_eq!(RoastLevel::standardize(input), expected);
    }

    #[rstest]
    #[case("100% Arabica", BeanType::Arabica)]
    #[case("Arabica & Robusta", BeanType::ArabicaRobusta)]
    #[case("arabica mix", BeanType::MixedArabica)]
    #[case("Gesha", BeanType::Arabica)]
    #[case("excelsa", BeanType::Liberica)]
    #[case("House Blend", BeanType::Blend)]
    #[case("tea", BeanType::Unknown)]
    fn bean_type_standardization(#[case] input: &str, #[case] expected: BeanType) {
        assert_eq!(BeanType::standardize(input), expected);
    }

    #[rstest]
    #[case("Fully Washed", ProcessMethod::Washed)]
    #[case("sun dried", ProcessMethod::Natural)]
    #[case("Black Honey", ProcessMethod::Honey)]
    #[case("giling basah", ProcessMethod::WetHulled)]
    #[case("Monsooned Malabar", ProcessMethod::Monsooned)]
    #[case("double fermentation tank", ProcessMethod::DoubleFermented)]
    #[case("experimental process", ProcessMethod::Unknown)]
    fn process_method_standardization(#[case] input: &str, #[case] expected: ProcessMethod) {
        assert_eq!(ProcessMethod::standardize(input), expected);
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&RoastLevel::MediumDark).unwrap();
        assert_eq!(json, "\"medium-dark\"");
        let bean: BeanType = serde_json::from_str("\"arabica-robusta\"").unwrap();
        assert_eq!(bean, BeanType::ArabicaRobusta);
    }
}
