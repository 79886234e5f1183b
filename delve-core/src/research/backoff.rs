//! Backoff decisions for research generation attempts.
//!
//! Rate limits and tool mismatches are steady-state conditions against
//! shared free-tier quotas; they are retried (or downgraded), never treated
//! as plain failures.

use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::types::GenerationOutcome;
use std::time::Duration;

/// What the researcher should do after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffAction {
    Succeed(String),
    /// Sleep, then run the next attempt.
    Retry(Duration),
    /// Drop the search tool and repeat the same attempt.
    RetryWithoutTool,
    Abandon(ResearchError),
}

/// Retry budget and delay schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub rate_limit_margin: Duration,
    /// Ceiling on a server-suggested wait; independent of `max_backoff`.
    pub max_server_wait: Duration,
    pub transient_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&ResearchConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_secs(config.initial_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            rate_limit_margin: Duration::from_secs(config.rate_limit_margin_secs),
            max_server_wait: Duration::from_secs(config.max_server_wait_secs),
            transient_delay: Duration::from_secs(config.transient_delay_secs),
        }
    }

    /// `initial * 2^(attempt-1)`, capped at `max_backoff`. Attempts are 1-based.
    pub fn exponential(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Delay after a rate limit: the server hint plus margin, otherwise
    /// exponential backoff. Only hints beyond `max_server_wait` are cut.
    pub fn rate_limit_delay(&self, hint: Option<Duration>, attempt: u32) -> Duration {
        match hint {
            Some(wait) => wait.min(self.max_server_wait) + self.rate_limit_margin,
            None => self.exponential(attempt),
        }
    }

    /// Upper bound on total sleeping for one sub-topic.
    pub fn worst_case_wait(&self) -> Duration {
        let per_retry = (self.max_server_wait + self.rate_limit_margin)
            .max(self.max_backoff)
            .max(self.transient_delay);
        per_retry * self.max_attempts.saturating_sub(1)
    }

    /// Classify an attempt's outcome into the next action.
    ///
    /// `attempt` is 1-based; `tool_active` says whether the attempt carried a
    /// search tool.
    pub fn decide(&self, outcome: GenerationOutcome, attempt: u32, tool_active: bool) -> BackoffAction {
        let has_budget = attempt < self.max_attempts;
        match outcome {
            GenerationOutcome::Success(text) => BackoffAction::Succeed(text),
            GenerationOutcome::ToolUnsupported if tool_active => BackoffAction::RetryWithoutTool,
            GenerationOutcome::ToolUnsupported => {
                BackoffAction::Abandon(ResearchError::CapabilityUnsupported {
                    message: "backend rejected the request even without a search tool".into(),
                })
            }
            GenerationOutcome::RateLimited(hint) if has_budget => {
                BackoffAction::Retry(self.rate_limit_delay(hint, attempt))
            }
            GenerationOutcome::RateLimited(hint) => {
                BackoffAction::Abandon(ResearchError::RetryBudgetExhausted {
                    attempts: attempt,
                    last_error: ResearchError::RateLimited {
                        retry_after_secs: hint.map(|d| d.as_secs()),
                    }
                    .to_string(),
                })
            }
            GenerationOutcome::TransientError(_) if has_budget => {
                BackoffAction::Retry(self.transient_delay)
            }
            GenerationOutcome::TransientError(message) => {
                BackoffAction::Abandon(ResearchError::RetryBudgetExhausted {
                    attempts: attempt,
                    last_error: ResearchError::TransientBackend { message }.to_string(),
                })
            }
            GenerationOutcome::FatalError(message) => {
                BackoffAction::Abandon(ResearchError::FatalBackend { message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::default()
    }

    #[test]
    fn test_exponential_schedule_is_capped() {
        let p = policy();
        let secs: Vec<u64> = (1..=6).map(|a| p.exponential(a).as_secs()).collect();
        assert_eq!(secs, vec![5, 10, 20, 40, 60, 60]);
        assert_eq!(p.exponential(200), Duration::from_secs(60));
    }

    #[test]
    fn test_server_hint_gets_margin() {
        let p = policy();
        assert_eq!(
            p.decide(
                GenerationOutcome::RateLimited(Some(Duration::from_secs(12))),
                1,
                true
            ),
            BackoffAction::Retry(Duration::from_secs(17))
        );
    }

    #[test]
    fn test_server_hint_above_backoff_cap_is_honoured() {
        let p = policy();
        assert_eq!(
            p.decide(
                GenerationOutcome::RateLimited(Some(Duration::from_secs(120))),
                1,
                false
            ),
            BackoffAction::Retry(Duration::from_secs(125))
        );
    }

    #[test]
    fn test_huge_server_hint_is_capped() {
        let p = policy();
        assert_eq!(
            p.rate_limit_delay(Some(Duration::from_secs(3600)), 1),
            Duration::from_secs(605)
        );
    }

    #[test]
    fn test_rate_limit_without_hint_uses_exponential() {
        let p = policy();
        assert_eq!(
            p.decide(GenerationOutcome::RateLimited(None), 2, false),
            BackoffAction::Retry(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_tool_unsupported_downgrades_then_abandons() {
        let p = policy();
        assert_eq!(
            p.decide(GenerationOutcome::ToolUnsupported, 1, true),
            BackoffAction::RetryWithoutTool
        );
        assert!(matches!(
            p.decide(GenerationOutcome::ToolUnsupported, 1, false),
            BackoffAction::Abandon(ResearchError::CapabilityUnsupported { .. })
        ));
    }

    #[test]
    fn test_transient_uses_fixed_delay() {
        let p = policy();
        assert_eq!(
            p.decide(GenerationOutcome::TransientError("503".into()), 1, true),
            BackoffAction::Retry(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_budget_exhausted_on_last_attempt() {
        let p = policy();
        match p.decide(GenerationOutcome::TransientError("503".into()), 3, false) {
            BackoffAction::Abandon(ResearchError::RetryBudgetExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("Expected exhaustion, got {:?}", other),
        }
        assert!(matches!(
            p.decide(GenerationOutcome::RateLimited(None), 3, true),
            BackoffAction::Abandon(ResearchError::RetryBudgetExhausted { .. })
        ));
    }

    #[test]
    fn test_fatal_abandons_immediately() {
        let p = policy();
        assert_eq!(
            p.decide(GenerationOutcome::FatalError("bad key".into()), 1, true),
            BackoffAction::Abandon(ResearchError::FatalBackend {
                message: "bad key".into()
            })
        );
    }

    #[test]
    fn test_success_passes_text_through() {
        assert_eq!(
            policy().decide(GenerationOutcome::Success("done".into()), 2, true),
            BackoffAction::Succeed("done".into())
        );
    }

    #[test]
    fn test_worst_case_wait() {
        // Two retries at most, each no longer than the hint ceiling + margin.
        assert_eq!(policy().worst_case_wait(), Duration::from_secs(1210));
    }

    #[test]
    fn test_zero_attempts_in_config_still_allows_one() {
        let config = ResearchConfig {
            max_attempts: 0,
            ..ResearchConfig::default()
        };
        assert_eq!(BackoffPolicy::from_config(&config).max_attempts, 1);
    }
}
