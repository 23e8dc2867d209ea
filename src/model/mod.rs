//! Language-model scoring
//!
//! Scoring a program means asking a causal LM for the summed
//! log-probability of the program tokens given everything before them.
//! Backends implement [`LogProbScorer`]; [`Model`] layers caching, length
//! normalisation and the softmax temperature on top.
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY`: Required for the OpenAI backend
//!
//! # Example
//!
//! ```rust,ignore
//! use probsem::model::{Backend, CompletionsScorer, Model, ModelConfig};
//!
//! let scorer = CompletionsScorer::connect(
//!     ModelConfig::new("code-davinci-002", Backend::OpenAi),
//!     None, // falls back to OPENAI_API_KEY
//! )?;
//! let model = Model::new(Box::new(scorer), false, 1.0, ScoreCache::in_memory())?;
//! let weight = model.score(&full_text, "(define theta 80)")?;
//! ```

mod client;

pub use client::{Backend, CompletionsScorer, ModelConfig};

use crate::cache::{cache_key, CachedScore, ScoreCache};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while scoring
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Missing API key: {env_var} not set. Get your key at {signup_url}")]
    MissingApiKey { env_var: String, signup_url: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Rate limited after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Temperature must be positive, got {0}")]
    InvalidTemperature(f64),

    #[error("Score cache error: {0}")]
    Cache(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Summed log-probability of the last `num_eval` tokens of a text
pub type TokenScore = CachedScore;

/// A backend able to score text under a causal language model
pub trait LogProbScorer {
    /// Model identifier, part of the cache key
    fn id(&self) -> &str;

    /// Log-probability of the trailing `eval_text` tokens of `full_text`.
    fn score(&self, full_text: &str, eval_text: &str) -> ModelResult<TokenScore>;
}

/// Scorer with caching, optional length normalisation and temperature
pub struct Model {
    scorer: Box<dyn LogProbScorer>,
    norm: bool,
    temperature: f64,
    cache: ScoreCache,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.scorer.id())
            .field("norm", &self.norm)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Model {
    pub fn new(
        scorer: Box<dyn LogProbScorer>,
        norm: bool,
        temperature: f64,
        cache: ScoreCache,
    ) -> ModelResult<Self> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(ModelError::InvalidTemperature(temperature));
        }
        Ok(Self {
            scorer,
            norm,
            temperature,
            cache,
        })
    }

    pub fn id(&self) -> &str {
        self.scorer.id()
    }

    /// Unnormalised log-weight of `eval_text` at the end of `full_text`
    pub fn score(&self, full_text: &str, eval_text: &str) -> ModelResult<f64> {
        let key = cache_key(self.scorer.id(), full_text, eval_text);
        let cached = self
            .cache
            .get(&key)
            .map_err(|e| ModelError::Cache(format!("{:#}", e)))?;

        let raw = match cached {
            Some(hit) => {
                debug!("Cache hit for {}", &key[..12]);
                hit
            }
            None => {
                let fresh = self.scorer.score(full_text, eval_text)?;
                self.cache
                    .insert(&key, fresh)
                    .map_err(|e| ModelError::Cache(format!("{:#}", e)))?;
                fresh
            }
        };

        let mut logp = raw.logp;
        if self.norm && raw.num_eval > 0 {
            logp /= raw.num_eval as f64;
        }
        Ok(logp / self.temperature)
    }
}
