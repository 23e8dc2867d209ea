//! Prompt and test-suite loading
//!
//! A run is defined by two files in the inputs directory:
//!
//! - `<prompt>.txt` - the few-shot prompt prepended to every scored text
//! - `<prompt>_<suite>.json` - the test suite:
//!
//! ```json
//! {
//!   "premise": ";; There is a tug-of-war tournament.",
//!   "query": ";; Which program matches?",
//!   "context": [{ "text": ";; Most players are strong.", "expected": 2 }],
//!   "programs": ["(define theta 0)", "(define theta 50)", "(define theta 80)"]
//! }
//! ```
//!
//! Lines of the natural-language parts are Lisp comments (`;;`) and every
//! program is a parenthesised s-expression.

mod suite;

pub use suite::{Sample, TestSuite};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading prompts and test suites
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid test suite {path}: {message}")]
    Schema { path: PathBuf, message: String },
}

pub type BenchmarkResult<T> = Result<T, BenchmarkError>;

/// Few-shot prompt text
#[derive(Debug, Clone)]
pub struct Prompt {
    name: String,
    text: String,
}

impl Prompt {
    /// Load `<inputs>/<name>.txt`
    pub fn load(inputs: &Path, name: &str) -> BenchmarkResult<Self> {
        let path = inputs.join(format!("{}.txt", name));
        let text = std::fs::read_to_string(&path)
            .map_err(|source| BenchmarkError::Io { path, source })?;
        Ok(Self::new(name, text))
    }

    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
