//! Persistent cache of raw model scores
//!
//! Every API completion costs money and rate-limit budget, so raw
//! `(logp, num_eval)` pairs are stored in a redb database keyed by a SHA-256
//! of `model_id _ full_text _ eval_text`. Length normalisation and the
//! temperature are applied after lookup, so one cache entry serves every
//! `--norm`/`--temp` combination.

pub mod paths;

pub use paths::{default_cache_dir, ensure_cache_dir, expand_home, get_score_db_path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

// redb table definition
const SCORES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("scores");

/// Raw score as returned by a backend, before normalisation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedScore {
    pub logp: f64,
    pub num_eval: usize,
}

/// Cache key for a scoring request
pub fn cache_key(model_id: &str, full_text: &str, eval_text: &str) -> String {
    let key_id = [model_id, full_text, eval_text].join("_");
    format!("{:x}", Sha256::digest(key_id.as_bytes()))
}

/// Score cache backed by redb, or by a plain map when persistence is off
pub struct ScoreCache {
    /// Persistence layer (optional)
    db: Option<redb::Database>,
    db_path: Option<PathBuf>,
    memory: RwLock<HashMap<String, CachedScore>>,
}

impl ScoreCache {
    /// Create or open the cache database inside `cache_dir`
    pub fn open(cache_dir: &Path) -> Result<Self> {
        ensure_cache_dir(cache_dir)
            .with_context(|| format!("Failed to create cache dir {}", cache_dir.display()))?;

        // redb uses a single file, not a directory
        let db_file = get_score_db_path(cache_dir);
        let db = redb::Database::create(&db_file).context("Failed to open redb database")?;
        debug!("Opened score cache at {}", db_file.display());

        Ok(Self {
            db: Some(db),
            db_path: Some(db_file),
            memory: RwLock::new(HashMap::new()),
        })
    }

    /// Create an in-memory only cache (no persistence)
    pub fn in_memory() -> Self {
        Self {
            db: None,
            db_path: None,
            memory: RwLock::new(HashMap::new()),
        }
    }

    /// Database file, `None` for an in-memory cache
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn get(&self, key: &str) -> Result<Option<CachedScore>> {
        if let Some(hit) = self.read_memory().get(key) {
            return Ok(Some(*hit));
        }

        let db = match &self.db {
            Some(db) => db,
            None => return Ok(None),
        };

        let read_txn = db.begin_read()?;
        // Fresh database: table is created on first insert
        let table = match read_txn.open_table(SCORES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match table.get(key)? {
            Some(entry) => {
                let score: CachedScore = serde_json::from_slice(entry.value())?;
                self.write_memory().insert(key.to_string(), score);
                Ok(Some(score))
            }
            None => Ok(None),
        }
    }

    pub fn insert(&self, key: &str, score: CachedScore) -> Result<()> {
        self.write_memory().insert(key.to_string(), score);

        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };

        let value = serde_json::to_vec(&score)?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(SCORES_TABLE)?;
            table.insert(key, value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn read_memory(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CachedScore>> {
        self.memory.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_memory(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CachedScore>> {
        self.memory.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Remove the score database in `cache_dir`. Returns the removed path, if any.
pub fn clear(cache_dir: &Path, dry_run: bool) -> Result<Option<PathBuf>> {
    let db_file = get_score_db_path(cache_dir);
    if !db_file.exists() {
        return Ok(None);
    }
    if !dry_run {
        std::fs::remove_file(&db_file)
            .with_context(|| format!("Failed to remove {}", db_file.display()))?;
    }
    Ok(Some(db_file))
}
