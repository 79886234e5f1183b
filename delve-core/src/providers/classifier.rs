//! Boundary adapter mapping raw backend failures onto `GenerationOutcome`.
//!
//! Backends report quota exhaustion, unknown tool fields and outages as
//! free text. The pattern matching lives here, behind `ErrorClassifier`, so
//! orchestration only ever sees the closed outcome type.

use crate::error::GenerationError;
use crate::types::GenerationOutcome;
use regex::Regex;
use std::time::Duration;

/// Maps a raw backend failure to a classified outcome.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &GenerationError) -> GenerationOutcome;
}

const RATE_LIMIT_PHRASES: &[&str] = &[
    "quota",
    "you exceeded",
    "resource_exhausted",
    "rate limit",
    "too many requests",
    "429",
];

const UNSUPPORTED_PHRASES: &[&str] = &[
    "not supported",
    "unsupported",
    "unknown field",
    "unknown name",
];

/// Default classifier built from the error phrases Gemini-style APIs emit.
pub struct PatternClassifier {
    retry_hints: Vec<Regex>,
}

impl PatternClassifier {
    pub fn new() -> Self {
        let retry_hints = vec![
            // "Please retry in 12.5s."
            Regex::new(r"(?i)retry in (\d+(?:\.\d+)?)\s*s").unwrap(),
            // retry_delay {\n  seconds: 12\n}
            Regex::new(r"(?is)retry_delay.*?seconds:\s*(\d+(?:\.\d+)?)").unwrap(),
            // "retryDelay": "12s"
            Regex::new(r#"(?i)"retryDelay"\s*:\s*"(\d+(?:\.\d+)?)s""#).unwrap(),
        ];
        Self { retry_hints }
    }

    /// Extract a server-suggested wait from free text, if present.
    pub fn retry_hint(&self, text: &str) -> Option<Duration> {
        self.retry_hints.iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
        })
    }

    fn is_rate_limited(status: Option<u16>, lower: &str) -> bool {
        status == Some(429) || RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p))
    }

    fn is_unsupported(lower: &str) -> bool {
        UNSUPPORTED_PHRASES.iter().any(|p| lower.contains(p))
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier for PatternClassifier {
    fn classify(&self, error: &GenerationError) -> GenerationOutcome {
        let (status, text) = match error {
            GenerationError::Http { status, body } => (Some(*status), body.clone()),
            other => (None, other.to_string()),
        };
        let lower = text.to_lowercase();

        if Self::is_rate_limited(status, &lower) {
            return GenerationOutcome::RateLimited(self.retry_hint(&text));
        }
        if Self::is_unsupported(&lower) {
            return GenerationOutcome::ToolUnsupported;
        }

        match error {
            GenerationError::Http { status, .. } => match status {
                408 | 500 | 502 | 503 | 504 => GenerationOutcome::TransientError(error.to_string()),
                _ => GenerationOutcome::FatalError(error.to_string()),
            },
            GenerationError::Connection { .. }
            | GenerationError::Timeout { .. }
            | GenerationError::ResponseParse { .. } => {
                GenerationOutcome::TransientError(error.to_string())
            }
            GenerationError::AuthFailed { .. } | GenerationError::Blocked { .. } => {
                GenerationOutcome::FatalError(error.to_string())
            }
        }
    }
}
