//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use anyhow::Context;
use ragwise_core::config::{RagwiseConfig, load_config, resolve_path, workspace_config_path};
use ragwise_core::event_log::{LoggedEvent, read_events};
use ragwise_core::{
    AnswerResult, GenerationBackend, InMemoryIndex, JsonlEventLog, OllamaClient, QueryPipeline,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest answer preview shown by `ragwise log`.
const LOG_ANSWER_PREVIEW: usize = 80;

pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Ask {
            query,
            index,
            model,
            json,
        } => {
            let mut config = load_workspace_config(workspace)?;
            if let Some(model) = model {
                config.generation.model = model;
            }
            let backend = Arc::new(OllamaClient::new(&config.generation)?);
            let result = run_ask(&config, workspace, &query, index.as_deref(), backend).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", format_answer(&result));
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace),
        Commands::Log { limit } => {
            let config = load_workspace_config(workspace)?;
            let path = resolve_path(workspace, &config.event_log.path);
            let events = read_events(&path)
                .with_context(|| format!("Failed to read event log {}", path.display()))?;
            if events.is_empty() {
                println!("No queries logged yet at {}", path.display());
                return Ok(());
            }
            let skip = events.len().saturating_sub(limit);
            for event in &events[skip..] {
                println!("{}", format_event(event));
            }
            Ok(())
        }
    }
}

fn load_workspace_config(workspace: &Path) -> anyhow::Result<RagwiseConfig> {
    load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

/// Load the index, wire the pipeline, and answer one query.
pub async fn run_ask(
    config: &RagwiseConfig,
    workspace: &Path,
    query: &str,
    index: Option<&Path>,
    backend: Arc<dyn GenerationBackend>,
) -> anyhow::Result<AnswerResult> {
    let index_path: PathBuf = resolve_path(workspace, index.unwrap_or(config.index.path.as_path()));
    let store = InMemoryIndex::load(
        &index_path,
        config.retrieval.embedding_dimensions,
        config.retrieval.mmr_lambda,
    )?;
    let events = JsonlEventLog::new(resolve_path(workspace, &config.event_log.path));

    let pipeline =
        QueryPipeline::from_config(config, Arc::new(store), backend, Arc::new(events));
    Ok(pipeline.answer(query).await?)
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml_str = toml::to_string_pretty(&RagwiseConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_workspace_config(workspace)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

pub fn format_answer(result: &AnswerResult) -> String {
    let mut out = format!("{}\n", result.answer);
    if !result.sources.is_empty() {
        out.push_str("\nSources:\n");
        for meta in &result.sources {
            let label = match meta.get("source").and_then(|v| v.as_str()) {
                Some(source) => match meta.get("page") {
                    Some(page) => format!("{source} (page {page})"),
                    None => source.to_string(),
                },
                None => serde_json::Value::Object(meta.clone()).to_string(),
            };
            out.push_str(&format!("  - {label}\n"));
        }
    }
    out
}

pub fn format_event(event: &LoggedEvent) -> String {
    let record = &event.record;
    let mut answer: String = record.answer.chars().take(LOG_ANSWER_PREVIEW).collect();
    if record.answer.chars().count() > LOG_ANSWER_PREVIEW {
        answer.push_str("...");
    }
    let mut line = format!(
        "[{}] {:<9} {} -> {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.outcome().to_string(),
        record.query,
        answer
    );
    if let Some(rule) = &record.rule_hit {
        line.push_str(&format!(" (rule: {rule})"));
    }
    if let Some(error) = &record.error {
        line.push_str(&format!(" (error: {error})"));
    }
    line
}
