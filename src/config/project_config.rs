//! Project-level configuration support
//!
//! Loads per-project settings from `probsem.toml` in the working directory.
//! Every field is optional; command-line flags override whatever is set here.
//!
//! # Configuration Format
//!
//! ```toml
//! # probsem.toml
//!
//! [model]
//! id = "code-davinci-002"
//! backend = "openai"        # or "local"
//! base_url = "http://localhost:8000/v1"
//! norm = false
//! temperature = 1.0
//! max_retries = 8
//! retry_after_secs = 10
//!
//! [paths]
//! inputs = "inputs"
//! outputs = "outputs"
//! cache = "~/.cache/probsem"
//!
//! [norms]
//! permutations = 10000
//! seed = 0
//! alpha = 0.05
//! theta_step = 10
//! theta_pattern = '(\d+(?:\.\d+)?)\D*$'
//! ```

use crate::cache::{default_cache_dir, expand_home};
use crate::model::{Backend, ModelConfig};
use crate::norms::NormsOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "probsem.toml";
pub const DEFAULT_MODEL: &str = "code-davinci-002";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub model: ModelSection,

    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub norms: NormsSection,
}

/// `[model]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelSection {
    #[serde(default)]
    pub id: Option<String>,

    /// "openai" or "local"
    #[serde(default)]
    pub backend: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Divide log-probabilities by the number of scored tokens
    #[serde(default)]
    pub norm: Option<bool>,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub retry_after_secs: Option<u64>,
}

/// `[paths]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PathsSection {
    #[serde(default)]
    pub inputs: Option<PathBuf>,

    #[serde(default)]
    pub outputs: Option<PathBuf>,

    #[serde(default)]
    pub cache: Option<PathBuf>,
}

/// `[norms]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NormsSection {
    #[serde(default)]
    pub permutations: Option<usize>,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub alpha: Option<f64>,

    #[serde(default)]
    pub theta_step: Option<f64>,

    #[serde(default)]
    pub theta_pattern: Option<String>,
}

impl ProjectConfig {
    pub fn model_id(&self) -> &str {
        self.model.id.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Configured backend, falling back to OpenAI on an unknown name
    pub fn backend(&self) -> Backend {
        match self.model.backend.as_deref() {
            None => Backend::default(),
            Some(name) => name.parse().unwrap_or_else(|e| {
                warn!("{}; using openai", e);
                Backend::default()
            }),
        }
    }

    pub fn norm(&self) -> bool {
        self.model.norm.unwrap_or(false)
    }

    pub fn temperature(&self) -> f64 {
        self.model.temperature.unwrap_or(1.0)
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.paths
            .inputs
            .clone()
            .unwrap_or_else(|| PathBuf::from("inputs"))
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.paths
            .outputs
            .clone()
            .unwrap_or_else(|| PathBuf::from("outputs"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        match &self.paths.cache {
            Some(dir) => expand_home(dir),
            None => default_cache_dir(),
        }
    }

    /// Client settings for `model_id` on `backend`, with retry knobs applied
    pub fn model_config(&self, model_id: &str, backend: Backend) -> ModelConfig {
        let mut config = ModelConfig::new(model_id, backend);
        config.base_url = self.model.base_url.clone();
        if let Some(retries) = self.model.max_retries {
            config.max_retries = retries;
        }
        if let Some(secs) = self.model.retry_after_secs {
            config.retry_after = Duration::from_secs(secs);
        }
        config
    }

    pub fn norms_options(&self) -> NormsOptions {
        let defaults = NormsOptions::default();
        NormsOptions {
            permutations: self.norms.permutations.unwrap_or(defaults.permutations),
            seed: self.norms.seed.unwrap_or(defaults.seed),
            alpha: self.norms.alpha.unwrap_or(defaults.alpha),
            theta_step: self.norms.theta_step.unwrap_or(defaults.theta_step),
            theta_pattern: self
                .norms
                .theta_pattern
                .clone()
                .unwrap_or(defaults.theta_pattern),
        }
    }
}

/// Load `probsem.toml` from `dir`; defaults when absent or unparsable
pub fn load_project_config(dir: &Path) -> ProjectConfig {
    let toml_path = dir.join(CONFIG_FILE);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}
