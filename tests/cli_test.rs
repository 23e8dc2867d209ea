//! Integration tests for the probsem CLI
//!
//! These tests run the actual binary inside isolated temp directories:
//! - `norms` end-to-end on synthetic results and the human fixture
//! - `tables` merging of stats tables
//! - `clean` on an empty and a populated cache
//! - `score` failing cleanly without an API key
//!
//! HOME and XDG_CONFIG_HOME point into the temp dir so no user config leaks in.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn probsem_bin() -> &'static str {
    env!("CARGO_BIN_EXE_probsem")
}

/// Temp workspace with a probsem.toml pointing the cache inside it
fn create_workspace() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let cache = dir.path().join("cache");
    std::fs::write(
        dir.path().join("probsem.toml"),
        format!(
            "[paths]\ncache = \"{}\"\n\n[norms]\npermutations = 200\n",
            cache.display()
        ),
    )
    .expect("write probsem.toml");
    dir
}

fn run_probsem(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(probsem_bin())
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run probsem");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Results table whose program distributions peak at `targets`
fn write_results(path: &Path, sentences: &[(&str, f64)]) {
    let mut csv = String::from("text,program,weight,score\n");
    for (text, target) in sentences {
        for theta in (0..=100).step_by(10) {
            let z = (theta as f64 - target) / 15.0;
            csv.push_str(&format!(
                "{},(define theta {}),{},0.0\n",
                text,
                theta,
                -z * z
            ));
        }
    }
    std::fs::write(path, csv).expect("write results");
}

#[test]
fn test_help_lists_commands() {
    let dir = create_workspace();
    let (stdout, _, code) = run_probsem(dir.path(), &["--help"]);
    assert_eq!(code, 0);
    for cmd in ["score", "norms", "tables", "clean"] {
        assert!(stdout.contains(cmd), "help is missing {}", cmd);
    }
}

#[test]
fn test_norms_then_tables() {
    let dir = create_workspace();
    let a = dir.path().join("a_results.csv");
    let b = dir.path().join("b_results.csv");
    write_results(&a, &[(";; Most players are strong.", 80.0)]);
    write_results(
        &b,
        &[
            (";; Few players are strong.", 20.0),
            (";; Half of the players are strong.", 50.0),
        ],
    );
    let human = fixtures_path().join("human/strength.csv");

    let (stdout, stderr, code) = run_probsem(
        dir.path(),
        &[
            "norms",
            "--name",
            "quant_strength",
            "--model-results",
            a.to_str().expect("utf8 path"),
            b.to_str().expect("utf8 path"),
            "--human",
            human.to_str().expect("utf8 path"),
            "--seed",
            "4",
        ],
    );
    assert_eq!(code, 0, "stdout: {}\nstderr: {}", stdout, stderr);

    let outputs = dir.path().join("outputs");
    for file in [
        "quant_strength_data.csv",
        "quant_strength_stats.csv",
        "quant_strength_stats.tex",
    ] {
        assert!(outputs.join(file).exists(), "{} missing", file);
    }

    let stats = std::fs::read_to_string(outputs.join("quant_strength_stats.csv"))
        .expect("read stats");
    let mut lines = stats.lines();
    assert_eq!(
        lines.next(),
        Some("text,temperature,js_distance,pval,pval_fdr,significant")
    );
    assert_eq!(lines.count(), 3);

    let data = std::fs::read_to_string(outputs.join("quant_strength_data.csv"))
        .expect("read data");
    assert_eq!(data.lines().count(), 1 + 2 * 3 * 11);

    let (stdout, stderr, code) = run_probsem(dir.path(), &["tables", "quant_strength_all.tex"]);
    assert_eq!(code, 0, "stdout: {}\nstderr: {}", stdout, stderr);
    let tex = std::fs::read_to_string(outputs.join("quant_strength_all.tex")).expect("read tex");
    assert!(tex.contains("Sentence & JSD & p-value"));
    assert!(tex.contains("Half of the players are strong."));
}

#[test]
fn test_norms_missing_human_sentence_fails() {
    let dir = create_workspace();
    let a = dir.path().join("a_results.csv");
    write_results(&a, &[(";; Nobody is strong.", 0.0)]);
    let human = fixtures_path().join("human/strength.csv");

    let (_, stderr, code) = run_probsem(
        dir.path(),
        &[
            "norms",
            "--name",
            "broken",
            "--model-results",
            a.to_str().expect("utf8 path"),
            "--human",
            human.to_str().expect("utf8 path"),
        ],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("Nobody is strong"), "stderr: {}", stderr);
}

#[test]
fn test_tables_without_stats_fails() {
    let dir = create_workspace();
    std::fs::create_dir_all(dir.path().join("outputs")).expect("create outputs");
    let (_, stderr, code) = run_probsem(dir.path(), &["tables", "nothing_here.tex"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("nothing_here"), "stderr: {}", stderr);
}

#[test]
fn test_clean_dry_run_keeps_cache() {
    let dir = create_workspace();
    let (stdout, _, code) = run_probsem(dir.path(), &["clean", "--dry-run"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No score cache found"));

    let cache = dir.path().join("cache");
    std::fs::create_dir_all(&cache).expect("create cache dir");
    let db = cache.join("scores.redb");
    std::fs::write(&db, b"").expect("touch db");

    let (stdout, _, code) = run_probsem(dir.path(), &["clean", "--dry-run"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Dry run"));
    assert!(db.exists());

    let (stdout, _, code) = run_probsem(dir.path(), &["clean"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Removed"));
    assert!(!db.exists());
}

#[test]
fn test_score_without_api_key_fails() {
    let dir = create_workspace();
    let (_, stderr, code) = run_probsem(
        dir.path(),
        &["score", "--prompt", "tug-of-war", "--test", "quantifiers"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_score_rejects_bad_temperature() {
    let dir = create_workspace();
    let (_, stderr, code) = run_probsem(
        dir.path(),
        &["score", "--prompt", "p", "--test", "t", "--temp", "0"],
    );
    assert_eq!(code, 2);
    assert!(stderr.contains("temperature must be positive"));
}
