//! Fire-and-forget trigger for research runs.

use super::negotiator::ToolHint;
use super::pipeline::ResearchPipeline;
use super::run::ResearchRun;
use crate::observer::ResearchObserver;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// An inbound request to research a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
        }
    }

    /// The trimmed topic, if present and non-blank.
    pub fn topic(&self) -> Option<&str> {
        self.topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Spawns one background task per accepted request.
///
/// The last working tool variant is shared between runs as an advisory
/// hint: copied in when a run starts and copied back when it ends.
#[derive(Clone)]
pub struct ResearchService {
    pipeline: Arc<ResearchPipeline>,
    hint: Arc<Mutex<ToolHint>>,
}

impl ResearchService {
    pub fn new(pipeline: ResearchPipeline, hint: ToolHint) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            hint: Arc::new(Mutex::new(hint)),
        }
    }

    /// Current shared hint.
    pub fn hint(&self) -> ToolHint {
        self.hint.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Start a run for `request`. Missing or blank topics are ignored.
    pub fn trigger(
        &self,
        request: ResearchRequest,
        observer: Arc<dyn ResearchObserver>,
    ) -> Option<JoinHandle<ResearchRun>> {
        self.trigger_with_id(request, Uuid::new_v4(), observer)
    }

    /// Start a run under `run_id`, so the caller can correlate its events.
    pub fn trigger_with_id(
        &self,
        request: ResearchRequest,
        run_id: Uuid,
        observer: Arc<dyn ResearchObserver>,
    ) -> Option<JoinHandle<ResearchRun>> {
        let Some(topic) = request.topic().map(str::to_string) else {
            debug!("Ignoring research request without a topic");
            return None;
        };

        let pipeline = self.pipeline.clone();
        let shared = self.hint.clone();
        Some(tokio::spawn(async move {
            let mut hint = shared.lock().map(|h| h.clone()).unwrap_or_default();
            let run = ResearchRun::with_id(run_id, topic);
            let run = pipeline
                .run_prepared(run, &mut hint, observer.as_ref())
                .await;
            if let Ok(mut guard) = shared.lock() {
                *guard = hint;
            }
            run
        }))
    }
}
