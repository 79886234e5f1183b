//! Observer interface for research progress.
//!
//! The pipeline publishes every phase and sub-topic transition as a
//! `ResearchEvent` the moment it happens. Delivery is fire-and-forget:
//! observers never block or acknowledge.

use crate::types::{SubTopic, SubTopicStatus};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// The `{text, status}` view of a sub-topic published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTopicSnapshot {
    pub text: String,
    pub status: SubTopicStatus,
}

impl From<&SubTopic> for SubTopicSnapshot {
    fn from(sub: &SubTopic) -> Self {
        Self {
            text: sub.text.clone(),
            status: sub.status,
        }
    }
}

/// Events emitted while a research run progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// Free-form narration, including backoff waits.
    StatusMessage { text: String },
    /// Brainstorming finished; sub-topics in processing order.
    SubTopicsGenerated { sub_topics: Vec<SubTopicSnapshot> },
    /// A sub-topic changed status.
    SubTopicStatusChanged {
        index: usize,
        status: SubTopicStatus,
    },
    /// The final (possibly degraded) report.
    ReportReady { report: String },
    /// The run ended in the errored phase.
    RunFailed { reason: String },
}

impl ResearchEvent {
    pub fn status(text: impl Into<String>) -> Self {
        ResearchEvent::StatusMessage { text: text.into() }
    }
}

/// Receives research events. Implementations must not block.
pub trait ResearchObserver: Send + Sync {
    fn on_event(&self, event: ResearchEvent);
}

/// Discards every event.
pub struct NoOpObserver;

impl ResearchObserver for NoOpObserver {
    fn on_event(&self, _event: ResearchEvent) {}
}

/// Records every event in order. Used by tests and the CLI summary.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ResearchEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResearchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Only the `SubTopicStatusChanged` events, as `(index, status)` pairs.
    pub fn status_changes(&self) -> Vec<(usize, SubTopicStatus)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ResearchEvent::SubTopicStatusChanged { index, status } => Some((index, status)),
                _ => None,
            })
            .collect()
    }

    /// Only the narration text of `StatusMessage` events.
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ResearchEvent::StatusMessage { text } => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ResearchObserver for RecordingObserver {
    fn on_event(&self, event: ResearchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Forwards events into an unbounded tokio channel, e.g. toward a websocket.
///
/// A closed receiver is ignored; the run keeps going without an audience.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ResearchEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<ResearchEvent>) -> Self {
        Self { tx }
    }
}

impl ResearchObserver for ChannelObserver {
    fn on_event(&self, event: ResearchEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Research event receiver dropped");
        }
    }
}
