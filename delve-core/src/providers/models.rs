//! Model discovery for accounts whose available models are not known upfront.

use serde::Deserialize;

/// One entry of the backend's model listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Fully-qualified name, e.g. `models/gemini-2.5-flash`.
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }

    /// Name without the `models/` prefix, as used in endpoint paths.
    pub fn short_name(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }
}

/// Pick a working model: a `flash` model first, then a `pro` model,
/// then anything that can generate content.
pub fn pick_preferred_model(models: &[ModelInfo]) -> Option<String> {
    let usable: Vec<&ModelInfo> = models
        .iter()
        .filter(|m| m.supports_generate_content())
        .collect();

    ["flash", "pro"]
        .iter()
        .find_map(|family| {
            usable
                .iter()
                .find(|m| m.short_name().to_lowercase().contains(*family))
        })
        .or_else(|| usable.first())
        .map(|m| m.short_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, methods: &[&str]) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_prefers_flash() {
        let models = vec![
            model("models/gemini-2.5-pro", &["generateContent"]),
            model("models/gemini-2.5-flash", &["generateContent", "countTokens"]),
        ];
        assert_eq!(
            pick_preferred_model(&models).as_deref(),
            Some("gemini-2.5-flash")
        );
    }

    #[test]
    fn test_skips_models_without_generate_content() {
        let models = vec![
            model("models/embedding-flash", &["embedContent"]),
            model("models/gemini-pro", &["generateContent"]),
        ];
        assert_eq!(pick_preferred_model(&models).as_deref(), Some("gemini-pro"));
    }

    #[test]
    fn test_falls_back_to_any_generator() {
        let models = vec![
            model("models/aqa", &["generateAnswer"]),
            model("models/gemma-3-27b-it", &["generateContent"]),
        ];
        assert_eq!(
            pick_preferred_model(&models).as_deref(),
            Some("gemma-3-27b-it")
        );
    }

    #[test]
    fn test_no_usable_model() {
        assert_eq!(pick_preferred_model(&[]), None);
        assert_eq!(
            pick_preferred_model(&[model("models/embedding-001", &["embedContent"])]),
            None
        );
    }

    #[test]
    fn test_deserialize_listing_entry() {
        let json = r#"{"name":"models/gemini-2.5-flash","displayName":"Gemini 2.5 Flash","supportedGenerationMethods":["generateContent"]}"#;
        let info: ModelInfo = serde_json::from_str(json).unwrap();
        assert!(info.supports_generate_content());
        assert_eq!(info.short_name(), "gemini-2.5-flash");
    }
}
