//! Topic decomposition into sub-topics.
//!
//! One fast-profile generation asks for a raw JSON array of strings. Anything
//! unusable falls back to a fixed three-entry outline so a run never stalls
//! at the first phase.

use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::generator::TextGenerator;
use crate::types::{GenerationOutcome, GenerationRequest, ModelProfile};
use std::sync::Arc;
use tracing::{debug, warn};

/// Suffixes of the fallback outline, appended to the topic.
pub const FALLBACK_SUFFIXES: [&str; 3] = ["Key Concepts", "Historical Context", "Future Outlook"];

/// Build the brainstorming prompt for `topic`.
pub fn brainstorm_prompt(topic: &str, min: usize, max: usize) -> String {
    let count = if min == max {
        format!("exactly {min}")
    } else {
        format!("{min} to {max}")
    };
    let example: Vec<String> = (1..=min.clamp(1, 3))
        .map(|i| format!("\"Topic {i}\""))
        .collect();
    format!(
        "You are a research assistant. Break down this main topic into {count} specific, \
         answerable sub-topics for a report. Return ONLY a raw JSON array of strings, like this: \
         [{}]\nMain Topic: \"{topic}\"",
        example.join(", ")
    )
}

/// Parse the model's answer into between `min` and `max` sub-topics.
///
/// The JSON array is taken from the first `[` to the last `]`, so fenced or
/// chatty answers are tolerated. Extra entries beyond `max` are dropped.
pub fn parse_sub_topics(raw: &str, min: usize, max: usize) -> Result<Vec<String>, ResearchError> {
    let start = raw.find('[');
    let end = raw.rfind(']');
    let span = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => {
            return Err(ResearchError::MalformedResponse {
                message: "no JSON array found in response".into(),
            });
        }
    };

    let values: Vec<serde_json::Value> =
        serde_json::from_str(span).map_err(|e| ResearchError::MalformedResponse {
            message: format!("invalid JSON array: {e}"),
        })?;

    let mut sub_topics = Vec::with_capacity(values.len());
    for value in values {
        match value.as_str().map(str::trim) {
            Some(text) if !text.is_empty() => sub_topics.push(text.to_string()),
            _ => {
                return Err(ResearchError::MalformedResponse {
                    message: format!("expected a non-empty string, got {value}"),
                });
            }
        }
    }

    if sub_topics.len() < min {
        return Err(ResearchError::MalformedResponse {
            message: format!("expected at least {min} sub-topics, got {}", sub_topics.len()),
        });
    }
    sub_topics.truncate(max);
    Ok(sub_topics)
}

/// The fixed outline used when brainstorming fails.
pub fn fallback_sub_topics(topic: &str) -> Vec<String> {
    FALLBACK_SUFFIXES
        .iter()
        .map(|suffix| format!("{topic} - {suffix}"))
        .collect()
}

/// Result of brainstorming.
#[derive(Debug, Clone, PartialEq)]
pub struct Brainstorm {
    pub sub_topics: Vec<String>,
    /// Set when the fallback outline was used, with the reason.
    pub fallback_reason: Option<ResearchError>,
}

impl Brainstorm {
    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Asks the backend to split a topic into sub-topics.
pub struct Brainstormer {
    generator: Arc<dyn TextGenerator>,
    min: usize,
    max: usize,
}

impl Brainstormer {
    pub fn new(generator: Arc<dyn TextGenerator>, min: usize, max: usize) -> Self {
        let min = min.max(1);
        Self {
            generator,
            min,
            max: max.max(min),
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &ResearchConfig) -> Self {
        Self::new(generator, config.min_sub_topics, config.max_sub_topics)
    }

    /// Produce the sub-topic list for `topic`. Never fails.
    pub async fn brainstorm(&self, topic: &str) -> Brainstorm {
        let prompt = brainstorm_prompt(topic, self.min, self.max);
        let request = GenerationRequest::new(prompt, ModelProfile::Fast);

        let parsed = match self.generator.generate(&request).await {
            GenerationOutcome::Success(text) => parse_sub_topics(&text, self.min, self.max),
            other => Err(outcome_to_error(other)),
        };

        match parsed {
            Ok(sub_topics) => {
                debug!(count = sub_topics.len(), "Brainstormed sub-topics");
                Brainstorm {
                    sub_topics,
                    fallback_reason: None,
                }
            }
            Err(reason) => {
                warn!(topic, reason = %reason, "Brainstorm fallback used");
                Brainstorm {
                    sub_topics: fallback_sub_topics(topic),
                    fallback_reason: Some(reason),
                }
            }
        }
    }
}

/// Map a non-success outcome onto the research error taxonomy.
pub(crate) fn outcome_to_error(outcome: GenerationOutcome) -> ResearchError {
    match outcome {
        GenerationOutcome::Success(_) => ResearchError::MalformedResponse {
            message: "unexpected success".into(),
        },
        GenerationOutcome::RateLimited(hint) => ResearchError::RateLimited {
            retry_after_secs: hint.map(|d| d.as_secs()),
        },
        GenerationOutcome::ToolUnsupported => ResearchError::CapabilityUnsupported {
            message: "backend rejected the request".into(),
        },
        GenerationOutcome::TransientError(message) => ResearchError::TransientBackend { message },
        GenerationOutcome::FatalError(message) => ResearchError::FatalBackend { message },
    }
}
