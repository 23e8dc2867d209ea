//! User-level configuration for probsem
//!
//! Supports loading config from:
//! - Environment variables
//! - ~/.config/probsem/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    /// OpenAI API key for the completions endpoint
    pub openai_api_key: Option<String>,

    /// Key for a local OpenAI-compatible server, if it wants one
    pub local_api_key: Option<String>,
}

impl UserConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. User config (~/.config/probsem/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = UserConfig::default();

        if let Some(user_config) = Self::user_config_path()
            .filter(|p| p.exists())
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|content| toml::from_str::<UserConfig>(&content).ok())
        {
            config.merge(user_config);
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.api.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("PROBSEM_LOCAL_API_KEY") {
            config.api.local_api_key = Some(key);
        }

        Ok(config)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("probsem").join("config.toml"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: UserConfig) {
        if other.api.openai_api_key.is_some() {
            self.api.openai_api_key = other.api.openai_api_key;
        }
        if other.api.local_api_key.is_some() {
            self.api.local_api_key = other.api.local_api_key;
        }
    }

    /// Key for `backend`, if configured
    pub fn api_key(&self, backend: crate::model::Backend) -> Option<&str> {
        match backend {
            crate::model::Backend::OpenAi => self.api.openai_api_key.as_deref(),
            crate::model::Backend::Local => self.api.local_api_key.as_deref(),
        }
    }
}
