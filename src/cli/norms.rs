//! Norms command - calibrate and compare against human judgments

use anyhow::Result;
use console::style;
use probsem::config::ProjectConfig;
use probsem::norms::{self, NormsOptions};
use probsem::tables::export_norms;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(
    config: &ProjectConfig,
    name: &str,
    model_results: &[PathBuf],
    human: &Path,
    opts: &NormsOptions,
) -> Result<()> {
    info!(
        "Comparing {} model tables against {} ({} permutations, seed {})",
        model_results.len(),
        human.display(),
        opts.permutations,
        opts.seed
    );
    let report = norms::run(model_results, human, opts)?;

    let outputs = config.outputs_dir();
    let written = export_norms(&outputs, name, &report.merged, &report.scores)?;

    println!("\n{}", style(format!("Norms: {}", name)).bold());
    for score in &report.scores {
        let marker = if score.significant {
            style("*").green().bold()
        } else {
            style(" ").dim()
        };
        println!(
            "  {} T={:<7.3} JSD={:.3}  p_fdr={:.3}  {}",
            marker,
            score.temperature,
            score.js_distance,
            score.pval_fdr,
            score.text.trim_start_matches(";; ")
        );
    }
    for path in &written {
        println!("  {}", style(path.display()).dim());
    }
    Ok(())
}
