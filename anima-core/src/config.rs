//! Configuration for the Anima memory engine and turn loop.
//!
//! Maps directly to `anima.toml`.  Every field has a default so an empty
//! file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::IndexKind;

/// Top-level Anima configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimaConfig {
    /// On-disk locations.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Embedding service settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Retrieval ranking settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Memory write and tiering settings.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Reflection trigger and fact-creation settings.
    #[serde(default)]
    pub reflection: ReflectionConfig,
    /// Completion service settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Prompt assembly limits.
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl AnimaConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `AnimaError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::AnimaError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Where indices, metadata logs, and documents live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `<index>.index` files.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    /// Directory holding `<index>_meta.jsonl` files.
    #[serde(default = "default_meta_dir")]
    pub meta_dir: PathBuf,
    /// SQLite document-store path.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Enable WAL journaling on the document store.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            meta_dir: default_meta_dir(),
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

impl StorageConfig {
    /// Both storage directories rooted under `root` (handy for tests).
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            index_dir: root.join("indices"),
            meta_dir: root.join("meta"),
            database_path: root.join("anima.db"),
            wal_mode: true,
        }
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name sent to the embedding endpoint.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Expected vector width; also the width of every index.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Maximum texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Total attempts per request, including the first.
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// First backoff delay.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Per-request timeout.
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            max_attempts: default_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

/// Retrieval ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Hits requested from each index when the NPC sets no override.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Multiplier applied to every persona-fact hit.
    #[serde(default = "default_fact_weight")]
    pub persona_fact_base_weight: f32,
    /// Additive boost for facts whose dimension matches the query.
    #[serde(default = "default_dimension_boost")]
    pub dimension_match_boost: f32,
    /// Indices searched on every retrieval.
    #[serde(default = "default_indices")]
    pub indices: Vec<IndexKind>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            persona_fact_base_weight: default_fact_weight(),
            dimension_match_boost: default_dimension_boost(),
            indices: default_indices(),
        }
    }
}

/// Memory write and tiering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Importance at or above which a memory is durable.
    #[serde(default = "default_long_term_threshold")]
    pub long_term_threshold: f32,
    /// Fixed importance given to raw observation memories.
    #[serde(default = "default_observation_importance")]
    pub observation_importance: f32,
    /// Recent utterances folded into the retrieval query.
    #[serde(default = "default_conversation_window")]
    pub recent_conversation_window: usize,
    /// Recent ephemeral memories scanned for conversation context.
    #[serde(default = "default_recent_scan")]
    pub recent_memory_scan: usize,
    /// Characters kept in a metadata summary.
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            long_term_threshold: default_long_term_threshold(),
            observation_importance: default_observation_importance(),
            recent_conversation_window: default_conversation_window(),
            recent_memory_scan: default_recent_scan(),
            summary_chars: default_summary_chars(),
        }
    }
}

/// Reflection trigger and fact-creation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Predicted importance at or above which a turn reflects.
    #[serde(default = "default_reflection_threshold")]
    pub importance_threshold: f32,
    /// Stated importance a candidate fact needs to be stored.
    #[serde(default = "default_fact_threshold")]
    pub fact_importance_threshold: f32,
    /// Minimum emotional-valence swing that forces reflection.
    #[serde(default = "default_emotion_delta")]
    pub emotion_delta_threshold: f32,
    /// Retrieved memory summaries handed to the reflection prompt.
    #[serde(default = "default_reflection_memories")]
    pub max_memories: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            importance_threshold: default_reflection_threshold(),
            fact_importance_threshold: default_fact_threshold(),
            emotion_delta_threshold: default_emotion_delta(),
            max_memories: default_reflection_memories(),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible endpoint.
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    /// API key; normally injected from the environment.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Chat model used for planning, reflection, and scoring.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout.
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
    /// Planning-call timeout; elapsing resolves to a wait action.
    #[serde(default = "default_plan_timeout_ms")]
    pub plan_timeout_ms: u64,
    /// Total attempts per request, including the first.
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// First backoff delay.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            api_key: None,
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_llm_timeout_ms(),
            plan_timeout_ms: default_plan_timeout_ms(),
            max_attempts: default_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Prompt assembly limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Retrieved memories rendered into the planning prompt.
    #[serde(default = "default_prompt_memories")]
    pub max_memories: usize,
    /// Characters kept per rendered memory.
    #[serde(default = "default_snippet_chars")]
    pub memory_snippet_chars: usize,
    /// Directory of TOML prompt overrides; built-in templates otherwise.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_memories: default_prompt_memories(),
            memory_snippet_chars: default_snippet_chars(),
            template_dir: None,
        }
    }
}

fn default_true() -> bool { true }
fn default_index_dir() -> PathBuf { PathBuf::from("storage/vectors/indices") }
fn default_meta_dir() -> PathBuf { PathBuf::from("storage/vectors/meta") }
fn default_database_path() -> PathBuf { PathBuf::from("storage/anima.db") }
fn default_embedding_model() -> String { "text-embedding-3-large".to_string() }
fn default_dimensions() -> usize { 3072 }
fn default_batch_size() -> usize { 100 }
fn default_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 4_000 }
fn default_max_backoff_ms() -> u64 { 10_000 }
fn default_embedding_timeout_ms() -> u64 { 30_000 }
fn default_top_k() -> usize { 5 }
fn default_fact_weight() -> f32 { 1.2 }
fn default_dimension_boost() -> f32 { 0.3 }
fn default_indices() -> Vec<IndexKind> { IndexKind::ALL.to_vec() }
fn default_long_term_threshold() -> f32 { 0.7 }
fn default_observation_importance() -> f32 { 0.3 }
fn default_conversation_window() -> usize { 5 }
fn default_recent_scan() -> usize { 10 }
fn default_summary_chars() -> usize { 200 }
fn default_reflection_threshold() -> f32 { 0.7 }
fn default_fact_threshold() -> f32 { 0.8 }
fn default_emotion_delta() -> f32 { 0.3 }
fn default_reflection_memories() -> usize { 5 }
fn default_llm_url() -> String { "https://api.openai.com".to_string() }
fn default_chat_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> u32 { 2000 }
fn default_llm_timeout_ms() -> u64 { 60_000 }
fn default_plan_timeout_ms() -> u64 { 90_000 }
fn default_prompt_memories() -> usize { 5 }
fn default_snippet_chars() -> usize { 150 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = AnimaConfig::from_toml("").expect("empty config parses");
        assert_eq!(cfg.embedding.dimensions, 3072);
        assert_eq!(cfg.retrieval.default_top_k, 5);
        assert!((cfg.memory.long_term_threshold - 0.7).abs() < f32::EPSILON);
        assert!((cfg.reflection.fact_importance_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(cfg.retrieval.indices, IndexKind::ALL.to_vec());
    }

    #[test]
    fn partial_override() {
        let cfg = AnimaConfig::from_toml(
            r#"
            [embedding]
            dimensions = 8

            [retrieval]
            indices = ["episodic", "world"]
            "#,
        )
        .expect("valid config");
        assert_eq!(cfg.embedding.dimensions, 8);
        assert_eq!(cfg.embedding.batch_size, 100);
        assert_eq!(cfg.retrieval.indices, vec![IndexKind::Episodic, IndexKind::World]);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = AnimaConfig::from_toml("[embedding\n").expect_err("should fail");
        assert!(matches!(err, crate::AnimaError::Config(_)));
    }
}
