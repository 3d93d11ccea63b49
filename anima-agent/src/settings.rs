//! Layered settings: TOML file, then `ANIMA__` environment variables.
//!
//! `ANIMA__LLM__API_KEY=sk-...` sets `llm.api_key`;
//! `ANIMA__RETRIEVAL__DEFAULT_TOP_K=8` sets `retrieval.default_top_k`.
//! Keep secrets in the environment, not in the file.

use std::path::Path;

use anima_core::{AnimaConfig, AnimaError};
use config::{Config, Environment, File};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ANIMA";

/// Settings loader.
pub struct Settings;

impl Settings {
    /// Load `path` (optional) overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Config`] if a source cannot be read or a value
    /// has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<AnimaConfig, AnimaError> {
        Self::from_sources(path, Self::environment())
    }

    /// The `ANIMA__`-prefixed environment source.
    #[must_use]
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    /// Load `path` (optional) overlaid with `env`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn from_sources(path: Option<&Path>, env: Environment) -> Result<AnimaConfig, AnimaError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(AnimaError::Config(format!(
                    "settings file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(env)
            .build()
            .and_then(Config::try_deserialize::<AnimaConfig>)
            .map_err(|e| AnimaError::Config(e.to_string()))
    }
}
