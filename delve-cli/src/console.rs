//! Terminal narration of research progress.

use delve_core::{ResearchEvent, ResearchObserver, SubTopicStatus};
use std::sync::Mutex;

/// Prints research events as they arrive.
pub struct ConsoleObserver {
    quiet: bool,
    sub_topics: Mutex<Vec<String>>,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            sub_topics: Mutex::new(Vec::new()),
        }
    }

    /// Render an event as a line of terminal output, if it warrants one.
    pub fn render(&self, event: &ResearchEvent) -> Option<String> {
        match event {
            ResearchEvent::StatusMessage { text } => Some(format!("  {}", text)),
            ResearchEvent::SubTopicsGenerated { sub_topics } => {
                let names: Vec<String> = sub_topics.iter().map(|s| s.text.clone()).collect();
                let mut out = format!("Found {} sub-topics:", names.len());
                for (i, name) in names.iter().enumerate() {
                    out.push_str(&format!("\n  {}. {}", i + 1, name));
                }
                if let Ok(mut stored) = self.sub_topics.lock() {
                    *stored = names;
                }
                Some(out)
            }
            ResearchEvent::SubTopicStatusChanged { index, status } => {
                let name = self
                    .sub_topics
                    .lock()
                    .ok()
                    .and_then(|s| s.get(*index).cloned())
                    .unwrap_or_else(|| format!("#{}", index + 1));
                let marker = match status {
                    SubTopicStatus::Pending => "[ ]",
                    SubTopicStatus::InProgress => "[~]",
                    SubTopicStatus::Complete => "[x]",
                    SubTopicStatus::Failed => "[!]",
                };
                Some(format!("{} {} ({})", marker, name, status))
            }
            ResearchEvent::ReportReady { .. } => None,
            ResearchEvent::RunFailed { reason } => Some(format!("Research failed: {}", reason)),
        }
    }
}

impl ResearchObserver for ConsoleObserver {
    fn on_event(&self, event: ResearchEvent) {
        let failed = matches!(event, ResearchEvent::RunFailed { .. });
        if self.quiet && !failed {
            return;
        }
        if let Some(line) = self.render(&event) {
            if failed {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
            }
        }
    }
}
