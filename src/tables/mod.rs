//! Tabular outputs of the norms analysis
//!
//! - `<name>_data.csv`: long model/human probability table
//! - `<name>_stats.csv`: per-sentence distance and significance
//! - `<name>_stats.tex`: the stats as a booktabs table
//!
//! [`merge_stats`] stitches several stats tables into one LaTeX table.

mod latex;

pub use latex::{escape, render_latex};

use crate::norms::{DataRow, SentenceScore};
use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const STATS_HEADERS: [&str; 3] = ["Sentence", "Jensen-Shannon Distance", "FDR p-value"];
pub const MERGED_HEADERS: [&str; 3] = ["Sentence", "JSD", "p-value"];

const STATS_SUFFIX: &str = "_stats.csv";

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_data_csv(path: &Path, rows: &[DataRow]) -> Result<()> {
    write_csv(path, rows)
}

pub fn write_stats_csv(path: &Path, scores: &[SentenceScore]) -> Result<()> {
    write_csv(path, scores)
}

pub fn read_stats_csv(path: &Path) -> Result<Vec<SentenceScore>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<SentenceScore>, csv::Error>>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Display form of one stats row: sentence, distance, FDR p-value (starred
/// when significant)
pub fn stats_row(score: &SentenceScore) -> Vec<String> {
    let text = score.text.strip_prefix(";; ").unwrap_or(&score.text);
    let mut pval = format!("{:.3}", score.pval_fdr);
    if score.significant {
        pval.push_str(" *");
    }
    vec![text.to_string(), format!("{:.3}", score.js_distance), pval]
}

pub fn render_stats_latex(scores: &[SentenceScore], headers: &[&str]) -> String {
    let rows: Vec<Vec<String>> = scores.iter().map(stats_row).collect();
    render_latex(headers, &rows)
}

pub fn write_stats_latex(path: &Path, scores: &[SentenceScore]) -> Result<()> {
    std::fs::write(path, render_stats_latex(scores, &STATS_HEADERS))
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Write the three norms outputs for `name` under `outputs`, returning their paths
pub fn export_norms(
    outputs: &Path,
    name: &str,
    data: &[DataRow],
    scores: &[SentenceScore],
) -> Result<Vec<PathBuf>> {
    let data_path = outputs.join(format!("{}_data.csv", name));
    let stats_path = outputs.join(format!("{}{}", name, STATS_SUFFIX));
    let tex_path = outputs.join(format!("{}_stats.tex", name));

    write_data_csv(&data_path, data)?;
    write_stats_csv(&stats_path, scores)?;
    write_stats_latex(&tex_path, scores)?;

    Ok(vec![data_path, stats_path, tex_path])
}

/// First two `_`-separated parts of `out_name`, e.g. `quant_strength_all.tex`
/// -> `quant_strength`
fn stats_prefix(out_name: &str) -> String {
    let stem = Path::new(out_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(out_name);
    stem.split('_').take(2).collect::<Vec<_>>().join("_")
}

/// Stats tables under `outputs` sharing the prefix of `out_name`, sorted by path
pub fn find_stats_files(outputs: &Path, out_name: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}*{}", stats_prefix(out_name), STATS_SUFFIX);
    let matcher = Glob::new(&pattern)
        .with_context(|| format!("Invalid pattern {}", pattern))?
        .compile_matcher();

    let entries = std::fs::read_dir(outputs)
        .with_context(|| format!("Failed to read {}", outputs.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matched = path
            .file_name()
            .map(|name| matcher.is_match(Path::new(name)))
            .unwrap_or(false);
        if matched && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Concatenate matching stats tables into `<outputs>/<out_name>`
pub fn merge_stats(outputs: &Path, out_name: &str) -> Result<PathBuf> {
    let files = find_stats_files(outputs, out_name)?;
    if files.is_empty() {
        bail!(
            "No {}*{} files in {}",
            stats_prefix(out_name),
            STATS_SUFFIX,
            outputs.display()
        );
    }

    let mut scores = Vec::new();
    for file in &files {
        let rows = read_stats_csv(file)?;
        debug!("{}: {} sentences", file.display(), rows.len());
        scores.extend(rows);
    }

    let out_path = outputs.join(out_name);
    std::fs::write(&out_path, render_stats_latex(&scores, &MERGED_HEADERS))
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    info!(
        "Merged {} tables ({} sentences) into {}",
        files.len(),
        scores.len(),
        out_path.display()
    );
    Ok(out_path)
}
