//! Configuration system for ragwise.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/ragwise/config.toml` and/or `.ragwise/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagwiseConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

/// Generation backend (Ollama-compatible `/api/generate`) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the backend, without the `/api/generate` path.
    pub base_url: String,
    /// Model name sent with every request and recorded in the event log.
    pub model: String,
    /// Hard bound on a single generation call, in seconds.
    pub timeout_secs: u64,
    /// JSON field carrying the answer text in backend responses.
    pub answer_field: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 120,
            answer_field: "response".to_string(),
        }
    }
}

/// Retrieval widths and the reference index's embedding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Primary result width, also the final candidate count after rerank.
    pub top_k: usize,
    /// Candidate pool for diversity search.
    pub fetch_k: usize,
    /// Width of each supplemental phrase search.
    pub phrase_k: usize,
    /// Relevance/diversity trade-off for MMR (1.0 = pure relevance).
    pub mmr_lambda: f32,
    /// Dimensionality of the hashed bag-of-words embeddings.
    pub embedding_dimensions: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            fetch_k: 50,
            phrase_k: 3,
            mmr_lambda: 0.5,
            embedding_dimensions: 256,
        }
    }
}

/// Heuristic tables for query normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Lowercase name tokens mapped to the canonical entity they stand for.
    #[serde(default)]
    pub fallback_names: Vec<FallbackName>,
}

/// A soft entity: when `token` appears in the lowercased query, `canonical`
/// becomes the query's entity without grounding enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackName {
    pub token: String,
    pub canonical: String,
}

/// Event log location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    pub path: PathBuf,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".ragwise/logs/rag_queries.jsonl"),
        }
    }
}

/// Reference index snapshot location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".ragwise/index.json"),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "ragwise", "ragwise")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".ragwise").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RAGWISE_`)
/// 3. Workspace-local config (`.ragwise/config.toml`)
/// 4. User config (`~/.config/ragwise/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&RagwiseConfig>,
) -> Result<RagwiseConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(RagwiseConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RAGWISE_GENERATION__MODEL, RAGWISE_RETRIEVAL__TOP_K, ...
    figment = figment.merge(Env::prefixed("RAGWISE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any ragwise configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Resolve a configured path against the workspace when it is relative.
pub fn resolve_path(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}
