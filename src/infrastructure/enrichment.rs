//! LLM enrichment collaborator
//!
//! An OpenAI-compatible chat-completions client used to fill attributes
//! the extractors could not recover. The call is opaque from the engine's
//! point of view: text in, partial attribute set out. Without an API key
//! the client is a pass-through no-op. Enrichment only fills fields the
//! reply returns non-null and that are locally missing or low-confidence,
//! and its scores go through the stronger-evidence rule so direct
//! extraction evidence is never displaced.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::domain::entities::{Coffee, Roaster};
use crate::domain::value_objects::{BeanType, ProcessMethod, RoastLevel};
use crate::infrastructure::config::EnrichmentConfig;

/// Confidence recorded for enrichment-filled fields; below any direct
/// extraction strategy so scraped evidence always wins.
const ENRICHMENT_CONFIDENCE: f32 = 0.5;

/// Coffee attribute fields the enrichment reply may fill.
const COFFEE_FIELDS: &[&str] = &[
    "roast_level",
    "bean_type",
    "processing_method",
    "region_name",
    "flavor_profiles",
    "brew_methods",
    "is_single_origin",
    "is_seasonal",
    "tags",
    "varietals",
    "altitude_meters",
    "acidity",
    "body",
    "sweetness",
    "aroma",
    "with_milk_suitable",
];

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for the enrichment service.
pub struct EnrichmentClient {
    client: reqwest::Client,
    config: EnrichmentConfig,
    enabled: bool,
}

impl EnrichmentClient {
    pub fn new(config: EnrichmentConfig) -> Self {
        let enabled = config.api_key.as_deref().is_some_and(|key| !key.is_empty());
        if !enabled {
            warn!("enrichment disabled: no API key provided");
        }
        Self {
            client: reqwest::Client::new(),
            config,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a candidate is worth an enrichment call. At least two
    /// materially missing attributes are required, to bound external-call
    /// cost.
    pub fn needs_enhancement(coffee: &Coffee) -> bool {
        let mut missing = 0;
        if coffee.roast_level.is_none_or(|level| level.is_unknown()) {
            missing += 1;
        }
        if coffee.bean_type.is_none_or(|bean| bean.is_unknown()) {
            missing += 1;
        }
        if coffee.processing_method.is_none() && !coffee.is_blend {
            missing += 1;
        }
        if coffee.flavor_profiles.is_empty() {
            missing += 1;
        }
        missing >= 2
    }

    /// Enhance a coffee candidate in place. Failures are logged and leave
    /// the candidate untouched; enrichment never aborts a product.
    pub async fn enhance_coffee(&self, coffee: &mut Coffee, roaster_name: Option<&str>) {
        if !self.enabled || coffee.name.is_empty() {
            return;
        }
        let context = format!(
            "Product Name: {}\nRoaster: {}\nOriginal Description: {}",
            coffee.name,
            roaster_name.unwrap_or("Unknown"),
            coffee.description.as_deref().unwrap_or(""),
        );
        let prompt = format!(
            "Based on the coffee product information provided, extract the following attributes:\n\
             1. roast_level: exactly one of: light, light-medium, medium, medium-dark, dark, city, city-plus, full-city, french, italian, cinnamon, filter, espresso, omniroast, unknown\n\
             2. bean_type: exactly one of: arabica, robusta, liberica, blend, mixed-arabica, arabica-robusta, unknown\n\
             3. processing_method: exactly one of: washed, natural, honey, pulped-natural, anaerobic, monsooned, wet-hulled, carbonic-maceration, double-fermented, unknown\n\
             4. region_name: geographic origin of the beans as a string\n\
             5. flavor_profiles: array of flavor descriptors\n\
             6. brew_methods: array of brewing methods\n\
             7. is_single_origin: boolean, null if unclear\n\
             8. is_seasonal: boolean, null if unclear\n\
             9. tags: array of descriptive keywords\n\
             10. varietals: array of coffee varietals\n\
             11. altitude_meters: integer elevation if mentioned\n\
             12. acidity: string acidity level\n\
             13. body: string body description\n\
             14. sweetness: string sweetness level\n\
             15. aroma: string aroma description\n\
             16. with_milk_suitable: boolean, null if unclear\n\n\
             DO NOT infer or guess any values. If a field is not clearly stated in the text, return null for that field.\n\
             Return ONLY a valid JSON object with these fields and nothing else.\n\n{context}"
        );

        match self
            .complete(
                "You are a coffee expert who extracts structured attributes from product descriptions.",
                &prompt,
                800,
                0.1,
            )
            .await
        {
            Ok(reply) => {
                let Some(attributes) = extract_json_object(&reply) else {
                    warn!("unparseable enrichment reply for {}", coffee.name);
                    return;
                };
                apply_coffee_attributes(coffee, &attributes);
                info!("enriched coffee attributes for {}", coffee.name);
            }
            Err(e) => warn!("enrichment failed for {}: {}", coffee.name, e),
        }
    }

    /// Enhance a roaster's descriptive fields (description, founded year,
    /// address). Only fills fields that are currently empty.
    pub async fn enhance_roaster(&self, roaster: &mut Roaster) {
        if !self.enabled || roaster.name.is_empty() {
            return;
        }
        let prompt = format!(
            "You are a coffee expert. Based on the roaster name '{}' and any additional info, \
             provide the following information in JSON format:\n\
             1. description: a concise 2-3 sentence description of this coffee roaster\n\
             2. founded_year: the year this roaster was likely founded (integer)\n\
             3. address: a likely address for this roaster, if you can determine one\n\n\
             Additional context:\nWebsite: {}\nCity/State: {}, {}\n\n\
             Return ONLY valid JSON with these fields. If you're uncertain about a field, set it to null.",
            roaster.name,
            roaster.website_url,
            roaster.city.as_deref().unwrap_or("Unknown"),
            roaster.state.as_deref().unwrap_or("Unknown"),
        );

        match self
            .complete(
                "You are a coffee expert who provides precise, factual information.",
                &prompt,
                300,
                0.3,
            )
            .await
        {
            Ok(reply) => {
                let Some(result) = extract_json_object(&reply) else {
                    warn!("unparseable enrichment reply for {}", roaster.name);
                    return;
                };
                if roaster.description.is_none() {
                    if let Some(description) = result.get("description").and_then(Value::as_str) {
                        roaster.description = Some(description.to_string());
                        debug!("enhanced description for {}", roaster.name);
                    }
                }
                if roaster.founded_year.is_none() {
                    if let Some(year) = result.get("founded_year").and_then(Value::as_i64) {
                        roaster.founded_year = i32::try_from(year).ok();
                    }
                }
                if roaster.address.is_none() {
                    if let Some(address) = result.get("address").and_then(Value::as_str) {
                        roaster.address = Some(address.to_string());
                    }
                }
            }
            Err(e) => warn!("enrichment failed for {}: {}", roaster.name, e),
        }
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .context("enrichment called without an API key")?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .context("enrichment request failed")?
            .error_for_status()
            .context("enrichment request rejected")?;
        let parsed: ChatResponse = response
            .json()
            .await
            .context("invalid enrichment response body")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("empty enrichment reply"))
    }
}

/// Pull the first JSON object out of a free-form LLM reply.
fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Fold reply attributes into the candidate: only non-null reply values,
/// only fields locally missing or low-confidence, always through the
/// stronger-evidence rule.
fn apply_coffee_attributes(coffee: &mut Coffee, attributes: &serde_json::Map<String, Value>) {
    for field in COFFEE_FIELDS {
        let Some(value) = attributes.get(*field) else {
            continue;
        };
        if value.is_null() || !coffee.confidence.is_low(field) {
            continue;
        }
        let accepted = match *field {
            "roast_level" => value.as_str().is_some_and(|raw| {
                let level = RoastLevel::standardize(raw);
                if level.is_unknown() {
                    return false;
                }
                coffee.roast_level = Some(level);
                true
            }),
            "bean_type" => value.as_str().is_some_and(|raw| {
                let bean = BeanType::standardize(raw);
                if bean.is_unknown() {
                    return false;
                }
                coffee.bean_type = Some(bean);
                true
            }),
            "processing_method" => value.as_str().is_some_and(|raw| {
                let method = ProcessMethod::standardize(raw);
                if method.is_unknown() {
                    return false;
                }
                coffee.processing_method = Some(method);
                true
            }),
            "region_name" => value.as_str().is_some_and(|raw| {
                coffee.region_name = Some(raw.to_string());
                true
            }),
            "flavor_profiles" => {
                let flavors = string_list(value);
                if flavors.is_empty() {
                    false
                } else {
                    coffee.flavor_profiles = flavors;
                    true
                }
            }
            "brew_methods" => {
                let methods = string_list(value);
                if methods.is_empty() {
                    false
                } else {
                    coffee.brew_methods = methods;
                    true
                }
            }
            "tags" => {
                let tags = string_list(value);
                if tags.is_empty() || !coffee.tags.is_empty() {
                    false
                } else {
                    coffee.tags = tags;
                    true
                }
            }
            "varietals" => {
                let varietals = string_list(value);
                if varietals.is_empty() {
                    false
                } else {
                    coffee.varietals = varietals;
                    true
                }
            }
            "is_single_origin" => value.as_bool().is_some_and(|flag| {
                coffee.is_single_origin = Some(flag);
                true
            }),
            "is_seasonal" => value.as_bool().is_some_and(|flag| {
                coffee.is_seasonal = Some(flag);
                true
            }),
            "with_milk_suitable" => value.as_bool().is_some_and(|flag| {
                coffee.with_milk_suitable = Some(flag);
                true
            }),
            "altitude_meters" => value.as_i64().is_some_and(|altitude| {
                coffee.altitude_meters = i32::try_from(altitude).ok();
                coffee.altitude_meters.is_some()
            }),
            "acidity" => value.as_str().is_some_and(|raw| {
                coffee.acidity = Some(raw.to_lowercase());
                true
            }),
            "body" => value.as_str().is_some_and(|raw| {
                coffee.body = Some(raw.to_lowercase());
                true
            }),
            "sweetness" => value.as_str().is_some_and(|raw| {
                coffee.sweetness = Some(raw.to_lowercase());
                true
            }),
            "aroma" => value.as_str().is_some_and(|raw| {
                coffee.aroma = Some(raw.to_lowercase());
                true
            }),
            _ => false,
        };
        if accepted {
            coffee.confidence.record_if_higher(field, ENRICHMENT_CONFIDENCE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_api_key() {
        let client = EnrichmentClient::new(EnrichmentConfig::default());
        assert!(!client.is_enabled());
    }

    #[tokio::test]
    async fn disabled_client_is_a_no_op() {
        let client = EnrichmentClient::new(EnrichmentConfig::default());
        let mut coffee = Coffee::new("Mystery Coffee");
        let before = coffee.clone();
        client.enhance_coffee(&mut coffee, None).await;
        assert_eq!(coffee, before);
    }

    #[test]
    fn enhancement_gate_requires_two_missing_fields() {
        let mut coffee = Coffee::new("Test");
        // everything missing: well past the gate
        assert!(EnrichmentClient::needs_enhancement(&coffee));

        coffee.roast_level = Some(RoastLevel::Light);
        coffee.bean_type = Some(BeanType::Arabica);
        coffee.flavor_profiles = vec!["citrus".to_string()];
        // only processing method missing
        assert!(!EnrichmentClient::needs_enhancement(&coffee));

        coffee.flavor_profiles.clear();
        assert!(EnrichmentClient::needs_enhancement(&coffee));
    }

    #[test]
    fn blend_does_not_count_missing_process() {
        let mut coffee = Coffee::new("House Blend");
        coffee.roast_level = Some(RoastLevel::Medium);
        coffee.bean_type = Some(BeanType::Blend);
        coffee.is_blend = true;
        coffee.flavor_profiles.clear();
        // only flavors missing; process is excused for blends
        assert!(!EnrichmentClient::needs_enhancement(&coffee));
    }

    #[test]
    fn json_extraction_from_noisy_reply() {
        let reply = "Sure! Here you go:\n```json\n{\"roast_level\": \"light\"}\n```";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["roast_level"], Value::from("light"));
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn reply_fills_only_missing_fields() {
        let mut coffee = Coffee::new("Test");
        coffee.roast_level = Some(RoastLevel::Light);
        coffee.confidence.record_if_higher("roast_level", 0.9);

        let attributes = extract_json_object(
            r#"{"roast_level": "dark", "processing_method": "washed", "region_name": null}"#,
        )
        .unwrap();
        apply_coffee_attributes(&mut coffee, &attributes);

        // high-confidence extraction survives the reply
        assert_eq!(coffee.roast_level, Some(RoastLevel::Light));
        // missing field gets filled at enrichment confidence
        assert_eq!(coffee.processing_method, Some(ProcessMethod::Washed));
        assert_eq!(coffee.confidence.get("processing_method"), Some(0.5));
        assert!(coffee.region_name.is_none());
    }

    #[test]
    fn unknown_reply_values_are_rejected() {
        let mut coffee = Coffee::new("Test");
        let attributes =
            extract_json_object(r#"{"bean_type": "something weird"}"#).unwrap();
        apply_coffee_attributes(&mut coffee, &attributes);
        assert!(coffee.bean_type.is_none());
        assert!(coffee.confidence.get("bean_type").is_none());
    }
}
