//! # Delve Core
//!
//! Core library for the Delve research agent.
//! Drives a fixed brainstorm -> research -> synthesize pipeline against a
//! rate-limited text-generation backend, with search-tool negotiation,
//! backoff, typed progress events, and layered configuration.

pub mod config;
pub mod error;
pub mod generator;
pub mod observer;
pub mod providers;
pub mod research;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{DelveConfig, LlmConfig, ResearchConfig, ServerConfig, load_config};
pub use error::{DelveError, GenerationError, ResearchError, Result, RunError};
pub use generator::{MockGenerator, TextGenerator};
pub use observer::{
    ChannelObserver, NoOpObserver, RecordingObserver, ResearchEvent, ResearchObserver,
    SubTopicSnapshot,
};
pub use research::{
    Finding, ResearchPipeline, ResearchRequest, ResearchRun, ResearchService, SubTopicResearcher,
    ToolHint,
};
pub use types::{
    GenerationOutcome, GenerationRequest, ModelProfile, ResearchPhase, SubTopic, SubTopicStatus,
    ToolVariant,
};
