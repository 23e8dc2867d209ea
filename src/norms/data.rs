//! Loading model scores and human responses onto a shared θ grid

use super::{NormsError, NormsResult};
use crate::scoring::read_results;
use crate::stats::normalize_counts;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Last number in the program: `(define theta 30)` -> 30
pub(super) const DEFAULT_THETA_PATTERN: &str = r"(\d+(?:\.\d+)?)\D*$";

const SUBJECT_COLUMN: &str = "subject_id";
const GRID_EPS: f64 = 1e-9;

/// Model log-weights of one sentence, sorted by θ
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSentence {
    pub text: String,
    pub theta: Vec<f64>,
    pub weights: Vec<f64>,
}

/// Human response counts of one sentence over the θ grid
#[derive(Debug, Clone, PartialEq)]
pub struct HumanSentence {
    pub text: String,
    pub theta: Vec<f64>,
    pub counts: Vec<f64>,
    pub probs: Vec<f64>,
}

/// Extracts θ from program text
#[derive(Debug, Clone)]
pub struct ThetaParser {
    pattern: Regex,
}

impl ThetaParser {
    pub fn new(pattern: &str) -> NormsResult<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn parse(&self, program: &str) -> NormsResult<f64> {
        self.pattern
            .captures(program)
            .and_then(|c| c.get(1).or_else(|| c.get(0)))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .ok_or_else(|| NormsError::NoTheta(program.to_string()))
    }
}

impl Default for ThetaParser {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_THETA_PATTERN)
                .expect("default theta pattern is valid"),
        }
    }
}

/// `0, step, 2*step, ..., 100`
pub fn theta_grid(step: f64) -> Vec<f64> {
    if !(step > 0.0) {
        return vec![0.0];
    }
    let n = (100.0 / step + GRID_EPS).floor() as usize;
    (0..=n).map(|i| i as f64 * step).collect()
}

/// Turn a bare column header into the comment form used in test suites:
/// `most players are strong` -> `;; Most players are strong.`
pub fn format_sentence(sentence: &str) -> String {
    let lower = sentence.trim().to_lowercase();
    let mut chars = lower.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!(";; {}.", capitalized)
}

/// Read one or more `*_results.csv` tables and group rows by sentence.
///
/// Sentences keep first-appearance order; θ within a sentence is sorted.
pub fn load_model_data(
    paths: &[PathBuf],
    parser: &ThetaParser,
) -> NormsResult<Vec<ModelSentence>> {
    let mut sentences: Vec<ModelSentence> = Vec::new();

    for path in paths {
        let rows = read_results(path).map_err(|e| NormsError::Read {
            path: path.clone(),
            message: format!("{:#}", e),
        })?;
        debug!("Loaded {} model rows from {}", rows.len(), path.display());

        for row in rows {
            let theta = parser.parse(&row.program)?;
            let idx = match sentences.iter().position(|s| s.text == row.text) {
                Some(i) => i,
                None => {
                    sentences.push(ModelSentence {
                        text: row.text.clone(),
                        theta: Vec::new(),
                        weights: Vec::new(),
                    });
                    sentences.len() - 1
                }
            };
            let sentence = &mut sentences[idx];
            if sentence.theta.iter().any(|t| (t - theta).abs() < GRID_EPS) {
                return Err(NormsError::DuplicateTheta {
                    text: row.text,
                    theta,
                });
            }
            sentence.theta.push(theta);
            sentence.weights.push(row.weight);
        }
    }

    for sentence in &mut sentences {
        sort_by_theta(&mut sentence.theta, &mut sentence.weights);
    }
    Ok(sentences)
}

fn sort_by_theta(theta: &mut Vec<f64>, values: &mut Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = theta.iter().copied().zip(values.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    *theta = pairs.iter().map(|p| p.0).collect();
    *values = pairs.iter().map(|p| p.1).collect();
}

/// Response frequencies for one sentence
pub fn calc_human_probs(text: &str, counts: &[f64]) -> NormsResult<Vec<f64>> {
    normalize_counts(counts).map_err(|source| NormsError::Stats {
        text: text.to_string(),
        source,
    })
}

/// Read the wide human table from disk
pub fn load_human_data(path: &Path, grid: &[f64]) -> NormsResult<Vec<HumanSentence>> {
    let content = std::fs::read_to_string(path).map_err(|e| NormsError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_human_responses(&content, grid).map_err(|e| match e {
        NormsError::Read { message, .. } => NormsError::Read {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Count responses per sentence column over `grid` and normalise.
///
/// Blank cells are skipped; responses off the grid are ignored with a warning.
/// Columns left without any response are dropped.
pub fn parse_human_responses(content: &str, grid: &[f64]) -> NormsResult<Vec<HumanSentence>> {
    let read_err = |e: csv::Error| NormsError::Read {
        path: PathBuf::from("<human responses>"),
        message: e.to_string(),
    };

    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers().map_err(read_err)?.clone();
    let subject_idx = headers
        .iter()
        .position(|h| h.trim() == SUBJECT_COLUMN)
        .ok_or(NormsError::MissingSubjectColumn)?;

    let columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != subject_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();
    let mut counts = vec![vec![0.0; grid.len()]; columns.len()];
    let mut off_grid = 0usize;

    for record in reader.records() {
        let record = record.map_err(read_err)?;
        for (col, (i, _)) in columns.iter().enumerate() {
            let cell = record.get(*i).unwrap_or("").trim();
            if cell.is_empty() {
                continue;
            }
            let value = match cell.parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    off_grid += 1;
                    continue;
                }
            };
            match grid.iter().position(|g| (g - value).abs() < GRID_EPS) {
                Some(bin) => counts[col][bin] += 1.0,
                None => off_grid += 1,
            }
        }
    }
    if off_grid > 0 {
        warn!("Ignored {} human responses outside the theta grid", off_grid);
    }

    let mut sentences = Vec::with_capacity(columns.len());
    for ((_, header), counts) in columns.into_iter().zip(counts) {
        let text = format_sentence(&header);
        // a sentence without data only matters if the model scored it
        if counts.iter().all(|c| *c == 0.0) {
            warn!("Skipping {:?}: no responses on the theta grid", text);
            continue;
        }
        let probs = calc_human_probs(&text, &counts)?;
        sentences.push(HumanSentence {
            text,
            theta: grid.to_vec(),
            counts,
            probs,
        });
    }
    Ok(sentences)
}
