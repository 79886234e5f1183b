//! Subcommand handlers for the Delve CLI.

use crate::ConfigAction;
use crate::console::ConsoleObserver;
use delve_core::providers::create_generator;
use delve_core::{DelveConfig, ResearchPhase, ResearchPipeline, ResearchService, ToolHint};
use std::path::Path;

pub fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config: &DelveConfig,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".delve");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&DelveConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            for warning in config.research.validate() {
                eprintln!("warning: {}", warning);
            }
            Ok(())
        }
    }
}

/// Build the pipeline described by `config`, rejecting unusable settings.
async fn build_pipeline(config: &DelveConfig) -> anyhow::Result<ResearchPipeline> {
    config.research.check()?;
    for warning in config.research.validate() {
        tracing::warn!("{}", warning);
    }
    let generator = create_generator(&config.llm).await?;
    Ok(ResearchPipeline::new(generator, &config.research))
}

/// Research one topic in the foreground and print the report.
pub async fn run_topic(topic: &str, config: DelveConfig, quiet: bool) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let observer = ConsoleObserver::new(quiet);
    let mut hint = ToolHint::from_variant(config.research.preferred_tool());

    if !quiet {
        println!("{}", "-".repeat(50));
        println!("Starting research for: \"{}\"", topic.trim());
        println!("{}", "-".repeat(50));
    }

    let run = pipeline.run(topic, &mut hint, &observer).await;
    match (run.phase(), run.report()) {
        (ResearchPhase::Done, Some(report)) => {
            println!("\n# Report on: {}\n", run.topic.trim());
            println!("{}", report);
            Ok(())
        }
        _ => anyhow::bail!(
            "Research failed: {}",
            run.error().unwrap_or("run did not complete")
        ),
    }
}

/// Run the websocket trigger server until interrupted.
pub async fn serve(config: DelveConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let service = ResearchService::new(
        pipeline,
        ToolHint::from_variant(config.research.preferred_tool()),
    );
    crate::server::run(service, &config.server).await?;
    Ok(())
}
