//! Results table I/O

use super::ScoredSample;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of a `*_results.csv` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub text: String,
    pub program: String,
    pub weight: f64,
    pub score: f64,
}

/// Write one row per (sample, program), creating parent directories
pub fn write_results(path: &Path, samples: &[ScoredSample]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for sample in samples {
        for ((program, weight), score) in sample
            .programs
            .iter()
            .zip(&sample.weights)
            .zip(&sample.scores)
        {
            writer.serialize(ResultRow {
                text: sample.text.clone(),
                program: program.clone(),
                weight: *weight,
                score: *score,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<ResultRow>, csv::Error>>()
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(rows)
}
