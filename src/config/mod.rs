//! Configuration module for probsem
//!
//! This module handles:
//! - Project-level configuration (probsem.toml)
//! - User-level API keys (~/.config/probsem/config.toml + env)

mod project_config;
mod user_config;

pub use project_config::{
    load_project_config, ModelSection, NormsSection, PathsSection, ProjectConfig, CONFIG_FILE,
    DEFAULT_MODEL,
};
pub use user_config::{ApiConfig, UserConfig};
