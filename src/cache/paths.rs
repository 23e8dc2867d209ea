//! Cache path utilities - uses ~/.cache/probsem/ for scored completions

use std::path::{Path, PathBuf};

const DB_FILE: &str = "scores.redb";

/// Default cache directory.
/// Uses ~/.cache/probsem/ on Unix, %LOCALAPPDATA%/probsem/ on Windows.
pub fn default_cache_dir() -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            // Fallback to ~/.cache
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("probsem")
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Get the score database path inside a cache directory.
pub fn get_score_db_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(DB_FILE)
}

/// Ensure the cache directory exists.
pub fn ensure_cache_dir(cache_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(cache_dir)?;
    Ok(cache_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir_format() {
        let cache = default_cache_dir();
        assert!(cache.ends_with("probsem"));
    }

    #[test]
    fn test_score_db_path() {
        let db = get_score_db_path(Path::new("/tmp/probsem-cache"));
        assert_eq!(db, PathBuf::from("/tmp/probsem-cache/scores.redb"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/abs/dir")), PathBuf::from("/abs/dir"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/x")), home.join("x"));
        }
    }

    #[test]
    fn test_ensure_cache_dir() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let nested = dir.path().join("a").join("b");
        let created = ensure_cache_dir(&nested).expect("create nested dir");
        assert!(created.is_dir());
    }
}
