//! Google Gemini API text generator.
//!
//! Implements `TextGenerator` over the Gemini `generateContent` endpoint.
//!
//! Key details:
//! - Auth via `?key=API_KEY` query parameter (not header-based)
//! - Search grounding is attached as a single tool object keyed by the
//!   variant name, e.g. `{"google_search": {}}`
//! - Failures are returned as `GenerationError` internally and classified
//!   into `GenerationOutcome` by the configured `ErrorClassifier`

use super::classifier::{ErrorClassifier, PatternClassifier};
use super::models::ModelInfo;
use crate::config::LlmConfig;
use crate::error::GenerationError;
use crate::generator::TextGenerator;
use crate::types::{GenerationOutcome, GenerationRequest, ModelProfile, ToolVariant};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API generator.
pub struct GeminiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    fast_model: String,
    synthesis_model: String,
    temperature: f32,
    max_tokens: Option<usize>,
    timeout_secs: u64,
    classifier: Box<dyn ErrorClassifier>,
}

impl GeminiGenerator {
    /// Create a new Gemini generator from configuration.
    ///
    /// Reads the API key from the environment variable named by `config.api_key_env`
    /// unless `config.api_key` is set.
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GenerationError::AuthFailed {
                provider: format!("Gemini (env var '{}' not set)", config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Gemini generator with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, GenerationError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| GenerationError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            fast_model: config.fast_model.clone(),
            synthesis_model: config.synthesis_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            classifier: Box::new(PatternClassifier::new()),
        })
    }

    /// Replace the error classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Override the model used for the fast profile.
    pub fn set_fast_model(&mut self, model: impl Into<String>) {
        self.fast_model = model.into();
    }

    /// Build the JSON request body for `generateContent`.
    fn build_request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": request.prompt}]
            }],
            "generationConfig": {
                "temperature": self.temperature,
            },
        });

        if let Some(max_tokens) = self.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        if let Some(tool) = &request.tool {
            body["tools"] = serde_json::json!([Self::tool_to_json(tool)]);
        }

        body
    }

    /// A tool object enabling the given search variant.
    fn tool_to_json(tool: &ToolVariant) -> Value {
        let mut object = serde_json::Map::new();
        object.insert(tool.as_str().to_string(), serde_json::json!({}));
        Value::Object(object)
    }

    /// Join the text parts of the first candidate.
    fn parse_response(body: &Value) -> Result<String, GenerationError> {
        let candidates = body["candidates"].as_array();
        let candidate = match candidates.and_then(|c| c.first()) {
            Some(c) => c,
            None => {
                if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
                    return Err(GenerationError::Blocked {
                        reason: reason.to_string(),
                    });
                }
                return Err(GenerationError::ResponseParse {
                    message: "No candidates in Gemini response".to_string(),
                });
            }
        };

        let text: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate["finishReason"].as_str().unwrap_or("EMPTY");
            return Err(GenerationError::Blocked {
                reason: reason.to_string(),
            });
        }

        Ok(text)
    }

    /// Map an HTTP status code to the appropriate `GenerationError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> GenerationError {
        match status.as_u16() {
            401 | 403 => GenerationError::AuthFailed {
                provider: "Gemini".to_string(),
            },
            code => GenerationError::Http {
                status: code,
                body: body_text.to_string(),
            },
        }
    }

    /// The URL carries the API key, so it is stripped before formatting.
    fn map_transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            GenerationError::Connection {
                message: self.redact(&format!(
                    "Request to Gemini API failed: {}",
                    e.without_url()
                )),
            }
        }
    }

    /// Replace every occurrence of the API key in backend-provided text.
    fn redact(&self, text: &str) -> String {
        redact_key(text, &self.api_key)
    }

    /// Build the endpoint URL for a model method call.
    fn endpoint_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, model, method, self.api_key
        )
    }

    async fn send(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let model = self.model_name(request.profile);
        let body = self.build_request_body(request);
        let url = self.endpoint_url(model, "generateContent");

        debug!(
            model,
            tool = request.tool.as_ref().map(ToolVariant::as_str),
            "Sending Gemini generation request"
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| GenerationError::ResponseParse {
                message: format!("Failed to read response body: {}", e.without_url()),
            })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &self.redact(&body_text)));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| GenerationError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;

        Self::parse_response(&response_json)
    }

    /// List the models available to this API key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, GenerationError> {
        let url = format!("{}/models?pageSize=1000&key={}", self.base_url, self.api_key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| GenerationError::ResponseParse {
                message: format!("Failed to read model listing: {}", e.without_url()),
            })?;
        if !status.is_success() {
            return Err(Self::map_http_error(status, &self.redact(&body_text)));
        }

        Self::parse_model_listing(&body_text)
    }

    fn parse_model_listing(body_text: &str) -> Result<Vec<ModelInfo>, GenerationError> {
        #[derive(serde::Deserialize)]
        struct Listing {
            #[serde(default)]
            models: Vec<ModelInfo>,
        }

        serde_json::from_str::<Listing>(body_text)
            .map(|listing| listing.models)
            .map_err(|e| GenerationError::ResponseParse {
                message: format!("Invalid model listing: {}", e),
            })
    }
}

/// Mask `key` wherever it appears in `text`.
fn redact_key(text: &str, key: &str) -> String {
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[REDACTED]")
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        match self.send(request).await {
            Ok(text) => GenerationOutcome::Success(text),
            Err(e) => {
                let outcome = self.classifier.classify(&e);
                warn!(
                    model = self.model_name(request.profile),
                    outcome = outcome.kind(),
                    error = %e,
                    "Gemini generation failed"
                );
                outcome
            }
        }
    }

    fn model_name(&self, profile: ModelProfile) -> &str {
        match profile {
            ModelProfile::Fast => &self.fast_model,
            ModelProfile::Synthesis => &self.synthesis_model,
        }
    }
}
