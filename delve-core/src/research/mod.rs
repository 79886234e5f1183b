//! Research pipeline.
//!
//! Runs a fixed three-phase process for a topic:
//! 1. **Brainstorm**: split the topic into sub-topics
//! 2. **Research**: summarize each sub-topic in order, negotiating search
//!    tools and backing off under rate limits
//! 3. **Synthesize**: merge the notes into a Markdown report
//!
//! Failures are contained at the smallest unit; only an empty topic or a
//! state-machine violation ends a run as errored.

pub mod backoff;
pub mod brainstorm;
pub mod negotiator;
pub mod pipeline;
pub mod researcher;
pub mod run;
pub mod service;
pub mod synthesis;

pub use backoff::{BackoffAction, BackoffPolicy};
pub use brainstorm::{Brainstorm, Brainstormer};
pub use negotiator::{CapabilityNegotiator, Negotiation, ToolHint};
pub use pipeline::ResearchPipeline;
pub use researcher::{Finding, SubTopicResearcher};
pub use run::ResearchRun;
pub use service::{ResearchRequest, ResearchService};
pub use synthesis::ReportSynthesizer;
