//! Pipeline orchestrator: brainstorm, research each sub-topic, synthesize.

use super::brainstorm::Brainstormer;
use super::negotiator::ToolHint;
use super::researcher::SubTopicResearcher;
use super::run::ResearchRun;
use super::synthesis::{ReportSynthesizer, degraded_report, notes_document};
use crate::config::ResearchConfig;
use crate::error::RunError;
use crate::generator::TextGenerator;
use crate::observer::{ResearchEvent, ResearchObserver};
use crate::types::{ModelProfile, ResearchPhase, SubTopicStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs one topic end to end, strictly sequentially.
pub struct ResearchPipeline {
    generator: Arc<dyn TextGenerator>,
    brainstormer: Brainstormer,
    researcher: SubTopicResearcher,
    synthesizer: ReportSynthesizer,
    cooldown: Duration,
}

impl ResearchPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &ResearchConfig) -> Self {
        Self {
            brainstormer: Brainstormer::from_config(generator.clone(), config),
            researcher: SubTopicResearcher::from_config(generator.clone(), config),
            synthesizer: ReportSynthesizer::new(generator.clone()),
            cooldown: config.cooldown(),
            generator,
        }
    }

    /// Execute a run to a terminal phase.
    ///
    /// Never returns an error: failures end up in the returned run and in a
    /// `RunFailed` event.
    pub async fn run(
        &self,
        topic: &str,
        hint: &mut ToolHint,
        observer: &dyn ResearchObserver,
    ) -> ResearchRun {
        self.run_prepared(ResearchRun::new(topic), hint, observer).await
    }

    /// Like `run`, for a run created by the caller (e.g. under a known id).
    pub async fn run_prepared(
        &self,
        mut run: ResearchRun,
        hint: &mut ToolHint,
        observer: &dyn ResearchObserver,
    ) -> ResearchRun {
        info!(run_id = %run.id, topic = %run.topic, "Research run started");

        if let Err(e) = self.execute(&mut run, hint, observer).await {
            warn!(run_id = %run.id, error = %e, "Research run failed");
            if let Err(inner) = run.fail(e.to_string()) {
                warn!(run_id = %run.id, error = %inner, "Could not mark run as failed");
            }
            observer.on_event(ResearchEvent::RunFailed {
                reason: e.to_string(),
            });
        }
        run
    }

    async fn execute(
        &self,
        run: &mut ResearchRun,
        hint: &mut ToolHint,
        observer: &dyn ResearchObserver,
    ) -> Result<(), RunError> {
        let topic = run.topic.trim().to_string();
        if topic.is_empty() {
            return Err(RunError::EmptyTopic);
        }

        // Brainstorming
        observer.on_event(ResearchEvent::status(format!(
            "Brainstorming sub-topics using {}...",
            self.generator.model_name(ModelProfile::Fast)
        )));
        let brainstorm = self.brainstormer.brainstorm(&topic).await;
        if let Some(reason) = &brainstorm.fallback_reason {
            observer.on_event(ResearchEvent::status(format!(
                "Brainstorm fallback used: {reason}"
            )));
        }
        run.set_sub_topics(brainstorm.sub_topics)?;
        run.transition(ResearchPhase::Researching)?;
        info!(run_id = %run.id, count = run.sub_topics().len(), "Brainstorming complete");
        observer.on_event(ResearchEvent::SubTopicsGenerated {
            sub_topics: run.snapshots(),
        });

        // Researching
        for index in 0..run.sub_topics().len() {
            let text = run.sub_topics()[index].text.clone();
            if index > 0 && !self.cooldown.is_zero() {
                observer.on_event(ResearchEvent::status(format!(
                    "Resting API for {}s...",
                    self.cooldown.as_secs()
                )));
                tokio::time::sleep(self.cooldown).await;
            }

            observer.on_event(ResearchEvent::status(format!("Researching: {text}...")));
            self.set_status(run, observer, index, SubTopicStatus::InProgress, None)?;

            let finding = self.researcher.research(&text, hint, observer).await;
            let status = if finding.is_complete() {
                SubTopicStatus::Complete
            } else {
                SubTopicStatus::Failed
            };
            self.set_status(run, observer, index, status, Some(finding.summary))?;
        }

        // Synthesizing
        run.transition(ResearchPhase::Synthesizing)?;
        observer.on_event(ResearchEvent::status("Synthesizing report..."));
        let notes = notes_document(run.sub_topics());
        let report = match self.synthesizer.synthesize(&topic, &notes).await {
            Ok(report) => report,
            Err(e) => {
                observer.on_event(ResearchEvent::status(format!(
                    "Synthesis failed ({e}). Returning raw notes."
                )));
                degraded_report(&topic, &notes, &e)
            }
        };

        run.complete(report.clone())?;
        info!(run_id = %run.id, "Research run complete");
        observer.on_event(ResearchEvent::status("Research complete."));
        observer.on_event(ResearchEvent::ReportReady { report });
        Ok(())
    }

    fn set_status(
        &self,
        run: &mut ResearchRun,
        observer: &dyn ResearchObserver,
        index: usize,
        status: SubTopicStatus,
        summary: Option<String>,
    ) -> Result<(), RunError> {
        run.mark_sub_topic(index, status, summary)?;
        observer.on_event(ResearchEvent::SubTopicStatusChanged { index, status });
        Ok(())
    }
}
