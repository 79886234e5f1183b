//! Report synthesis from per-sub-topic notes.

use super::brainstorm::outcome_to_error;
use crate::error::ResearchError;
use crate::generator::TextGenerator;
use crate::types::{GenerationOutcome, GenerationRequest, ModelProfile, SubTopic};
use std::sync::Arc;
use tracing::{debug, warn};

/// Separator between sub-topic entries in the notes document.
pub const NOTES_SEPARATOR: &str = "\n---\n";

/// Assemble the notes document from sub-topics, in order.
///
/// Sub-topics without a summary contribute an empty summary section.
pub fn notes_document(sub_topics: &[SubTopic]) -> String {
    sub_topics
        .iter()
        .map(|sub| {
            format!(
                "Sub-Topic: {}\nResearch Summary:\n{}",
                sub.text,
                sub.summary.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join(NOTES_SEPARATOR)
}

pub fn synthesis_prompt(topic: &str, notes: &str) -> String {
    format!(
        "You are a research analyst. You have been provided with research on several sub-topics \
         related to a main topic. Synthesize all of it into a single, comprehensive, \
         well-structured report in Markdown format. Use # for the main title and ## for sections. \
         The report should have a clear introduction, body, and conclusion. Use lists and bold \
         text to organize the content.\nMain Topic: \"{topic}\"\n\n--- Research Data ---\n{notes}"
    )
}

/// Fallback document when synthesis fails: an error banner plus the raw notes.
pub fn degraded_report(topic: &str, notes: &str, error: &ResearchError) -> String {
    format!(
        "# Report Error\nCould not synthesize a report on \"{topic}\": {error}\n\n## Notes\n{notes}"
    )
}

/// Turns research notes into a Markdown report.
pub struct ReportSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl ReportSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// One synthesis-profile attempt; no retries.
    pub async fn synthesize(&self, topic: &str, notes: &str) -> Result<String, ResearchError> {
        let request = GenerationRequest::new(synthesis_prompt(topic, notes), ModelProfile::Synthesis);
        debug!(
            model = self.generator.model_name(ModelProfile::Synthesis),
            notes_len = notes.len(),
            "Synthesizing report"
        );
        match self.generator.generate(&request).await {
            GenerationOutcome::Success(report) => Ok(report),
            other => {
                let error = outcome_to_error(other);
                warn!(topic, error = %error, "Synthesis failed");
                Err(error)
            }
        }
    }
}
