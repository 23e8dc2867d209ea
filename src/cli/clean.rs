//! Clean command - remove the score cache

use anyhow::Result;
use probsem::cache;
use std::path::Path;

pub fn run(cache_dir: &Path, dry_run: bool) -> Result<()> {
    let Some(db_file) = cache::clear(cache_dir, dry_run)? else {
        println!("No score cache found in {}.", cache_dir.display());
        return Ok(());
    };

    if dry_run {
        println!("Found score cache: {}", db_file.display());
        println!("\nDry run - nothing removed. Run without --dry-run to delete.");
    } else {
        println!("Removed: {}", db_file.display());
    }
    Ok(())
}
