//! Text-generation backend implementations.
//!
//! Provides the Gemini adapter, the boundary error classifier, and model
//! discovery. Use `create_generator()` to instantiate the backend named in config.

pub mod classifier;
pub mod gemini;
pub mod models;

use crate::config::LlmConfig;
use crate::error::{ConfigError, DelveError};
use crate::generator::TextGenerator;
use std::sync::Arc;

pub use classifier::{ErrorClassifier, PatternClassifier};
pub use gemini::GeminiGenerator;
pub use models::{ModelInfo, pick_preferred_model};

/// Create a text generator based on the configuration.
///
/// When `auto_detect_model` is set, the backend's model listing is consulted
/// and the fast-profile model replaced by the preferred available one. A
/// failed lookup keeps the configured model.
pub async fn create_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, DelveError> {
    match config.provider.as_str() {
        "gemini" => {
            let mut generator = GeminiGenerator::new(config)?;
            if config.auto_detect_model {
                match generator.list_models().await {
                    Ok(models) => match pick_preferred_model(&models) {
                        Some(model) => {
                            tracing::info!(model = %model, "Auto-selected model");
                            generator.set_fast_model(model);
                        }
                        None => tracing::warn!(
                            configured = %config.fast_model,
                            "No model supporting generateContent found; keeping configured model"
                        ),
                    },
                    Err(e) => tracing::warn!(
                        error = %e,
                        configured = %config.fast_model,
                        "Could not list models; keeping configured model"
                    ),
                }
            }
            Ok(Arc::new(generator))
        }
        other => Err(ConfigError::Invalid {
            message: format!("unknown provider '{}' (supported: gemini)", other),
        }
        .into()),
    }
}
