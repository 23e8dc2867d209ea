//! Tables command - merge stats tables into one LaTeX file

use anyhow::Result;
use probsem::config::ProjectConfig;
use probsem::tables::merge_stats;

pub fn run(config: &ProjectConfig, out_name: &str) -> Result<()> {
    let path = merge_stats(&config.outputs_dir(), out_name)?;
    println!("Wrote {}", path.display());
    Ok(())
}
