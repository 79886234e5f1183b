//! Core data types shared across the research pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which model family a generation call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProfile {
    /// Cheap, fast model for brainstorming and per-sub-topic research.
    Fast,
    /// Stronger model for the final report.
    Synthesis,
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelProfile::Fast => write!(f, "fast"),
            ModelProfile::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// A named search-grounding tool variant offered to the backend
/// (e.g. `google_search`, `google_search_retrieval`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolVariant(String);

impl ToolVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolVariant {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A single request to the text-generation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub tool: Option<ToolVariant>,
    pub profile: ModelProfile,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, profile: ModelProfile) -> Self {
        Self {
            prompt: prompt.into(),
            tool: None,
            profile,
        }
    }

    pub fn with_tool(mut self, tool: ToolVariant) -> Self {
        self.tool = Some(tool);
        self
    }
}

/// The classified result of one generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Success(String),
    /// Quota or rate-limit rejection, with the backend's suggested wait if it gave one.
    RateLimited(Option<Duration>),
    /// The backend rejected the requested tool variant.
    ToolUnsupported,
    TransientError(String),
    FatalError(String),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationOutcome::Success(_) => "success",
            GenerationOutcome::RateLimited(_) => "rate_limited",
            GenerationOutcome::ToolUnsupported => "tool_unsupported",
            GenerationOutcome::TransientError(_) => "transient",
            GenerationOutcome::FatalError(_) => "fatal",
        }
    }
}

/// Progress of a single sub-topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubTopicStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl fmt::Display for SubTopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubTopicStatus::Pending => write!(f, "pending"),
            SubTopicStatus::InProgress => write!(f, "in-progress"),
            SubTopicStatus::Complete => write!(f, "complete"),
            SubTopicStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One decomposed facet of the main topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTopic {
    pub text: String,
    pub status: SubTopicStatus,
    pub summary: Option<String>,
}

impl SubTopic {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: SubTopicStatus::Pending,
            summary: None,
        }
    }
}

/// Current phase of a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    Brainstorming,
    Researching,
    Synthesizing,
    Done,
    Errored,
}

impl ResearchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResearchPhase::Done | ResearchPhase::Errored)
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResearchPhase::Brainstorming => write!(f, "brainstorming"),
            ResearchPhase::Researching => write!(f, "researching"),
            ResearchPhase::Synthesizing => write!(f, "synthesizing"),
            ResearchPhase::Done => write!(f, "done"),
            ResearchPhase::Errored => write!(f, "errored"),
        }
    }
}
