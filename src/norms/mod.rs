//! Temperature calibration and model-vs-human distribution comparison
//!
//! Pipeline:
//!
//! 1. [`load_model_data`]: results tables from `probsem score`, θ parsed out
//!    of each program
//! 2. [`load_human_data`]: wide response table, one column per sentence,
//!    counted over the θ grid and normalised
//! 3. [`fit_temperatures`]: leave-one-sentence-out softmax temperature that
//!    minimises the summed Jensen-Shannon distance on the other sentences
//! 4. [`compare_distributions`]: observed distance vs. a permutation null,
//!    Benjamini-Hochberg across sentences
//! 5. [`merge_data`]: long table for plotting

mod calibrate;
mod compare;
mod data;

pub use calibrate::{fit_temperatures, CalibratedSentence};
pub use compare::{compare_distributions, merge_data, DataRow, SentenceScore};
pub use data::{
    calc_human_probs, format_sentence, load_human_data, load_model_data, parse_human_responses,
    theta_grid, HumanSentence, ModelSentence, ThetaParser,
};

use crate::stats::StatsError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or analysing judgment data
#[derive(Error, Debug)]
pub enum NormsError {
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid theta pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("No theta value found in program: {0}")]
    NoTheta(String),

    #[error("Sentence {text:?} has theta {theta} twice")]
    DuplicateTheta { text: String, theta: f64 },

    #[error("Human data is missing column subject_id")]
    MissingSubjectColumn,

    #[error("Sentence {0:?} has model scores but no human responses")]
    MissingSentence(String),

    #[error("Theta grids differ for {text:?}: model {model:?} vs human {human:?}")]
    GridMismatch {
        text: String,
        model: Vec<f64>,
        human: Vec<f64>,
    },

    #[error("Fitted temperature for {text:?} is not positive: {temperature}")]
    InvalidTemperature { text: String, temperature: f64 },

    #[error("No model data to analyse")]
    Empty,

    #[error("Statistics error for {text:?}: {source}")]
    Stats {
        text: String,
        #[source]
        source: StatsError,
    },
}

pub type NormsResult<T> = Result<T, NormsError>;

/// Knobs for the comparison stage
#[derive(Debug, Clone)]
pub struct NormsOptions {
    pub permutations: usize,
    pub seed: u64,
    pub alpha: f64,
    /// Spacing of the θ grid over `[0, 100]`
    pub theta_step: f64,
    /// Regex whose first capture group is θ inside a program
    pub theta_pattern: String,
}

impl Default for NormsOptions {
    fn default() -> Self {
        Self {
            permutations: 10_000,
            seed: 0,
            alpha: 0.05,
            theta_step: 10.0,
            theta_pattern: data::DEFAULT_THETA_PATTERN.to_string(),
        }
    }
}

/// Output of a full norms run
#[derive(Debug, Clone)]
pub struct NormsReport {
    pub calibrated: Vec<CalibratedSentence>,
    pub human: Vec<HumanSentence>,
    pub scores: Vec<SentenceScore>,
    pub merged: Vec<DataRow>,
}

/// Load both tables, calibrate and compare
pub fn run(
    model_results: &[PathBuf],
    human_results: &std::path::Path,
    opts: &NormsOptions,
) -> NormsResult<NormsReport> {
    let parser = ThetaParser::new(&opts.theta_pattern)?;
    let model = load_model_data(model_results, &parser)?;
    let grid = theta_grid(opts.theta_step);
    let human = load_human_data(human_results, &grid)?;

    let calibrated = fit_temperatures(&model, &human)?;
    let scores = compare_distributions(&calibrated, &human, opts)?;
    let merged = merge_data(&calibrated, &human);

    Ok(NormsReport {
        calibrated,
        human,
        scores,
        merged,
    })
}
