//! Research run state machine.
//!
//! A run moves forward through `Brainstorming → Researching → Synthesizing →
//! Done`, or to `Errored` from any non-terminal phase. Terminal runs reject
//! every mutation.

use crate::error::RunError;
use crate::observer::SubTopicSnapshot;
use crate::types::{ResearchPhase, SubTopic, SubTopicStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One execution of the pipeline for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRun {
    /// Unique run ID.
    pub id: Uuid,
    /// The topic as submitted.
    pub topic: String,
    sub_topics: Vec<SubTopic>,
    report: Option<String>,
    phase: ResearchPhase,
    error: Option<String>,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the run last changed.
    pub updated_at: DateTime<Utc>,
}

impl ResearchRun {
    /// Create a run in the brainstorming phase.
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), topic)
    }

    /// Create a run under an id chosen by the caller.
    pub fn with_id(id: Uuid, topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            topic: topic.into(),
            sub_topics: Vec::new(),
            report: None,
            phase: ResearchPhase::Brainstorming,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn phase(&self) -> ResearchPhase {
        self.phase
    }

    pub fn sub_topics(&self) -> &[SubTopic] {
        &self.sub_topics
    }

    /// The report; present only once the run is `Done`.
    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    /// Why the run ended `Errored`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn snapshots(&self) -> Vec<SubTopicSnapshot> {
        self.sub_topics.iter().map(SubTopicSnapshot::from).collect()
    }

    /// Record the brainstormed sub-topics. Allowed exactly once.
    pub fn set_sub_topics(&mut self, texts: Vec<String>) -> Result<(), RunError> {
        self.ensure_phase(ResearchPhase::Brainstorming)?;
        if !self.sub_topics.is_empty() {
            return Err(RunError::SubTopicsAlreadySet);
        }
        if texts.is_empty() {
            return Err(RunError::NoSubTopics);
        }
        self.sub_topics = texts.into_iter().map(SubTopic::new).collect();
        self.touch();
        Ok(())
    }

    /// Move to the next working phase.
    ///
    /// Only `Researching` and `Synthesizing` are reachable this way; use
    /// [`complete`](Self::complete) and [`fail`](Self::fail) for the
    /// terminal phases.
    pub fn transition(&mut self, to: ResearchPhase) -> Result<(), RunError> {
        self.ensure_not_terminal()?;
        let allowed = match (self.phase, to) {
            (ResearchPhase::Brainstorming, ResearchPhase::Researching) => {
                if self.sub_topics.is_empty() {
                    return Err(RunError::NoSubTopics);
                }
                true
            }
            (ResearchPhase::Researching, ResearchPhase::Synthesizing) => true,
            _ => false,
        };
        if !allowed {
            return Err(self.invalid(to));
        }
        self.phase = to;
        self.touch();
        Ok(())
    }

    /// Update a sub-topic's status, and its summary when given.
    pub fn mark_sub_topic(
        &mut self,
        index: usize,
        status: SubTopicStatus,
        summary: Option<String>,
    ) -> Result<(), RunError> {
        self.ensure_phase(ResearchPhase::Researching)?;
        let len = self.sub_topics.len();
        let sub = self
            .sub_topics
            .get_mut(index)
            .ok_or(RunError::UnknownSubTopic { index, len })?;
        sub.status = status;
        if summary.is_some() {
            sub.summary = summary;
        }
        self.touch();
        Ok(())
    }

    /// Finish the run with its report.
    pub fn complete(&mut self, report: impl Into<String>) -> Result<(), RunError> {
        self.ensure_not_terminal()?;
        if self.phase != ResearchPhase::Synthesizing {
            return Err(self.invalid(ResearchPhase::Done));
        }
        self.report = Some(report.into());
        self.phase = ResearchPhase::Done;
        self.touch();
        Ok(())
    }

    /// End the run as errored.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), RunError> {
        self.ensure_not_terminal()?;
        self.error = Some(reason.into());
        self.phase = ResearchPhase::Errored;
        self.touch();
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<(), RunError> {
        if self.phase.is_terminal() {
            return Err(RunError::Terminal {
                phase: self.phase.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_phase(&self, expected: ResearchPhase) -> Result<(), RunError> {
        self.ensure_not_terminal()?;
        if self.phase != expected {
            return Err(RunError::InvalidTransition {
                from: self.phase.to_string(),
                to: expected.to_string(),
            });
        }
        Ok(())
    }

    fn invalid(&self, to: ResearchPhase) -> RunError {
        RunError::InvalidTransition {
            from: self.phase.to_string(),
            to: to.to_string(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
