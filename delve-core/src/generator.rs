//! The text-generation capability the pipeline runs against.
//!
//! `TextGenerator` is the only seam between orchestration and a concrete
//! backend. Implementations classify their own failures into
//! `GenerationOutcome` so that no error-string matching leaks into the
//! research logic.

use crate::types::{GenerationOutcome, GenerationRequest, ModelProfile};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Trait for text-generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Perform one generation attempt and classify the result.
    async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome;

    /// Return the model name used for a profile.
    fn model_name(&self, profile: ModelProfile) -> &str;
}

type Responder = Box<dyn Fn(&GenerationRequest) -> GenerationOutcome + Send + Sync>;

/// A scriptable generator for tests and dry runs.
///
/// Queued outcomes are returned first, in order. Once the queue is empty the
/// responder (if any) answers; otherwise every call fails fatally.
pub struct MockGenerator {
    model: String,
    queue: Mutex<VecDeque<GenerationOutcome>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A generator that always succeeds with the given text.
    pub fn with_response(text: &str) -> Self {
        let text = text.to_string();
        Self::from_fn(move |_| GenerationOutcome::Success(text.clone()))
    }

    /// A generator that answers every request through `responder`.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> GenerationOutcome + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Queue outcomes to be returned before the responder is consulted.
    pub fn with_queue(self, outcomes: impl IntoIterator<Item = GenerationOutcome>) -> Self {
        for outcome in outcomes {
            self.queue_outcome(outcome);
        }
        self
    }

    pub fn queue_outcome(&self, outcome: GenerationOutcome) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(outcome);
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        if let Some(outcome) = queued {
            return outcome;
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => GenerationOutcome::FatalError("mock generator has no scripted response".into()),
        }
    }

    fn model_name(&self, _profile: ModelProfile) -> &str {
        &self.model
    }
}
