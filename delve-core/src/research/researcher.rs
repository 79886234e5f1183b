//! Research of a single sub-topic.
//!
//! Drives one unit of work through tool negotiation, generation and backoff.
//! Never fails outward: an exhausted sub-topic yields a sentinel summary so
//! the pipeline can carry on with the rest.

use super::backoff::{BackoffAction, BackoffPolicy};
use super::negotiator::{CapabilityNegotiator, Negotiation, ToolHint};
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::generator::TextGenerator;
use crate::observer::{ResearchEvent, ResearchObserver};
use crate::types::{GenerationOutcome, GenerationRequest, ModelProfile, ToolVariant};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prompt asking for a grounded, factual summary of one sub-topic.
pub fn research_prompt(sub_topic: &str) -> String {
    format!(
        "You are a research assistant. Gather detailed information on the following topic and \
         provide a concise but comprehensive summary (around 200-300 words). Focus on key facts, \
         figures, and concepts. Cite sources if available.\nTopic: \"{sub_topic}\""
    )
}

/// Summary text recorded for a sub-topic that could not be researched.
pub fn failure_summary(sub_topic: &str, error: &ResearchError) -> String {
    format!("Could not research topic: {sub_topic}. Reason: {error}")
}

/// The result of researching one sub-topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// The summary, or the failure sentinel.
    pub summary: String,
    pub error: Option<ResearchError>,
    /// Tool variant that grounded the successful answer, if any.
    pub tool: Option<ToolVariant>,
    /// Retry-budget units consumed.
    pub attempts: u32,
}

impl Finding {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Researches one sub-topic with a bounded retry budget.
pub struct SubTopicResearcher {
    generator: Arc<dyn TextGenerator>,
    negotiator: CapabilityNegotiator,
    policy: BackoffPolicy,
}

impl SubTopicResearcher {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        negotiator: CapabilityNegotiator,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            generator,
            negotiator,
            policy,
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &ResearchConfig) -> Self {
        Self::new(
            generator,
            CapabilityNegotiator::new(config.tool_variants()),
            BackoffPolicy::from_config(config),
        )
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Research `sub_topic`, updating `hint` with the variant that worked.
    pub async fn research(
        &self,
        sub_topic: &str,
        hint: &mut ToolHint,
        observer: &dyn ResearchObserver,
    ) -> Finding {
        let prompt = research_prompt(sub_topic);
        let mut use_tools = !self.negotiator.is_empty();
        let mut attempt: u32 = 1;

        loop {
            let (outcome, tool) = if use_tools {
                match self
                    .negotiator
                    .negotiate(self.generator.as_ref(), &prompt, ModelProfile::Fast, hint)
                    .await
                {
                    Negotiation::Probed { variant, outcome } => (outcome, Some(variant)),
                    Negotiation::NoTool { rejected } => {
                        debug!(rejected = rejected.len(), "No search tool accepted");
                        hint.forget();
                        use_tools = false;
                        observer.on_event(ResearchEvent::status(
                            "Search tool not supported. Retrying without tools.",
                        ));
                        continue;
                    }
                }
            } else {
                let request = GenerationRequest::new(prompt.as_str(), ModelProfile::Fast);
                (self.generator.generate(&request).await, None)
            };

            let narration = self.narrate(&outcome, sub_topic, attempt);
            match self.policy.decide(outcome, attempt, tool.is_some()) {
                BackoffAction::Succeed(text) => {
                    if let Some(variant) = &tool {
                        hint.remember(variant.clone());
                    }
                    info!(sub_topic, attempt, tool = ?tool, "Sub-topic researched");
                    return Finding {
                        summary: text,
                        error: None,
                        tool,
                        attempts: attempt,
                    };
                }
                // Negotiation absorbs every rejection it sees, so this only
                // fires for a backend that accepts a variant on probing and
                // rejects it on a later call.
                BackoffAction::RetryWithoutTool => {
                    debug!(sub_topic, "Tool rejected mid-attempt; retrying without tools");
                    use_tools = false;
                    observer.on_event(ResearchEvent::status(
                        "Search tool not supported. Retrying without tools.",
                    ));
                }
                BackoffAction::Retry(delay) => {
                    warn!(
                        sub_topic,
                        attempt,
                        max = self.policy.max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        "Retrying sub-topic after backoff"
                    );
                    if let Some(text) = narration {
                        observer.on_event(ResearchEvent::status(format!(
                            "{text} Waiting {}s...",
                            format_secs(delay)
                        )));
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                BackoffAction::Abandon(error) => {
                    warn!(sub_topic, attempt, error = %error, "Giving up on sub-topic");
                    observer.on_event(ResearchEvent::status(format!(
                        "Failed to research \"{sub_topic}\": {error}"
                    )));
                    return Finding {
                        summary: failure_summary(sub_topic, &error),
                        error: Some(error),
                        tool: None,
                        attempts: attempt,
                    };
                }
            }
        }
    }

    fn narrate(&self, outcome: &GenerationOutcome, sub_topic: &str, attempt: u32) -> Option<String> {
        match outcome {
            GenerationOutcome::RateLimited(_) => Some("API rate limit hit.".to_string()),
            GenerationOutcome::TransientError(message) => Some(format!(
                "Attempt {attempt} failed for \"{sub_topic}\": {message}."
            )),
            _ => None,
        }
    }
}

fn format_secs(delay: Duration) -> String {
    let secs = delay.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", delay.as_secs())
    } else {
        format!("{secs:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;
    use crate::observer::RecordingObserver;
    use tokio::time::Instant;

    fn researcher(generator: Arc<MockGenerator>) -> SubTopicResearcher {
        SubTopicResearcher::from_config(generator, &ResearchConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_then_success() {
        let generator = Arc::new(MockGenerator::with_response("text").with_queue([
            GenerationOutcome::RateLimited(Some(Duration::from_secs(12))),
        ]));
        let observer = RecordingObserver::new();
        let mut hint = ToolHint::new();

        let started = Instant::now();
        let finding = researcher(generator).research("X", &mut hint, &observer).await;

        assert_eq!(finding.summary, "text");
        assert!(finding.is_complete());
        assert_eq!(finding.attempts, 2);
        assert!(started.elapsed() >= Duration::from_secs(12 + 5));
        assert!(
            observer
                .messages()
                .iter()
                .any(|m| m.contains("rate limit") && m.contains("17s"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_server_hint_is_waited_in_full() {
        let generator = Arc::new(MockGenerator::with_response("text").with_queue([
            GenerationOutcome::RateLimited(Some(Duration::from_secs(120))),
        ]));
        let observer = RecordingObserver::new();

        let started = Instant::now();
        let finding = researcher(generator.clone())
            .research("X", &mut ToolHint::new(), &observer)
            .await;

        assert_eq!(finding.summary, "text");
        assert_eq!(finding.attempts, 2);
        assert_eq!(generator.call_count(), 2);
        assert!(started.elapsed() >= Duration::from_secs(120 + 5));
        assert!(observer.messages().iter().any(|m| m.contains("125s")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_tools_unsupported_then_plain() {
        let generator = Arc::new(MockGenerator::from_fn(|req| match req.tool {
            Some(_) => GenerationOutcome::ToolUnsupported,
            None => GenerationOutcome::Success("plain".into()),
        }));
        let observer = RecordingObserver::new();
        let mut hint = ToolHint::from_variant(Some(ToolVariant::new("google_search")));

        let finding = researcher(generator.clone())
            .research("X", &mut hint, &observer)
            .await;

        assert_eq!(finding.summary, "plain");
        assert_eq!(finding.attempts, 1);
        assert_eq!(finding.tool, None);
        assert_eq!(hint.last_good(), None);
        // Three variants probed, then one plain call.
        assert_eq!(generator.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_remembers_variant() {
        let generator = Arc::new(MockGenerator::from_fn(|req| {
            match req.tool.as_ref().map(|t| t.as_str()) {
                Some("google_search_retrieval") => GenerationOutcome::Success("grounded".into()),
                Some(_) => GenerationOutcome::ToolUnsupported,
                None => GenerationOutcome::Success("plain".into()),
            }
        }));
        let mut hint = ToolHint::new();

        let finding = researcher(generator)
            .research("X", &mut hint, &RecordingObserver::new())
            .await;

        assert_eq!(finding.summary, "grounded");
        assert_eq!(
            hint.last_good(),
            Some(&ToolVariant::new("google_search_retrieval"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhaustion_returns_sentinel() {
        let generator = Arc::new(MockGenerator::from_fn(|_| {
            GenerationOutcome::TransientError("HTTP 503".into())
        }));
        let observer = RecordingObserver::new();

        let started = Instant::now();
        let finding = researcher(generator.clone())
            .research("Qubits", &mut ToolHint::new(), &observer)
            .await;

        assert!(!finding.is_complete());
        assert!(
            finding
                .summary
                .starts_with("Could not research topic: Qubits. Reason:")
        );
        assert_eq!(finding.attempts, 3);
        assert_eq!(generator.call_count(), 3);
        // Two fixed transient delays.
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let generator = Arc::new(MockGenerator::from_fn(|_| {
            GenerationOutcome::FatalError("API key not valid".into())
        }));

        let finding = researcher(generator.clone())
            .research("X", &mut ToolHint::new(), &RecordingObserver::new())
            .await;

        assert_eq!(
            finding.error,
            Some(ResearchError::FatalBackend {
                message: "API key not valid".into()
            })
        );
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_forever_is_bounded() {
        let generator = Arc::new(MockGenerator::from_fn(|_| GenerationOutcome::RateLimited(None)));
        let r = researcher(generator);
        let bound = r.policy().worst_case_wait();

        let started = Instant::now();
        let finding = r
            .research("X", &mut ToolHint::new(), &RecordingObserver::new())
            .await;

        assert!(matches!(
            finding.error,
            Some(ResearchError::RetryBudgetExhausted { attempts: 3, .. })
        ));
        // Exponential 5s then 10s.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert!(started.elapsed() <= bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_server_hint_forever_is_bounded() {
        let generator = Arc::new(MockGenerator::from_fn(|_| {
            GenerationOutcome::RateLimited(Some(Duration::from_secs(3600)))
        }));
        let r = researcher(generator);
        let bound = r.policy().worst_case_wait();

        let started = Instant::now();
        let finding = r
            .research("X", &mut ToolHint::new(), &RecordingObserver::new())
            .await;

        assert!(!finding.is_complete());
        // Two retries, each at the 600s ceiling plus margin.
        assert_eq!(started.elapsed(), Duration::from_secs(1210));
        assert!(started.elapsed() <= bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_configured_tools_goes_straight_to_plain() {
        let generator = Arc::new(MockGenerator::with_response("plain"));
        let config = ResearchConfig {
            tool_variants: Vec::new(),
            ..ResearchConfig::default()
        };
        let r = SubTopicResearcher::from_config(generator.clone(), &config);

        let finding = r
            .research("X", &mut ToolHint::new(), &RecordingObserver::new())
            .await;
        assert_eq!(finding.summary, "plain");
        assert_eq!(generator.requests()[0].tool, None);
    }

    #[test]
    fn test_prompt_mentions_topic_and_length() {
        let prompt = research_prompt("Superconducting qubits");
        assert!(prompt.contains("\"Superconducting qubits\""));
        assert!(prompt.contains("200-300 words"));
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(Duration::from_secs(17)), "17");
        assert_eq!(format_secs(Duration::from_millis(12500)), "12.5");
    }
}
