//! CLI command definitions and handlers

mod clean;
mod norms;
mod score;
mod tables;

use anyhow::Result;
use clap::{Parser, Subcommand};
use probsem::config::load_project_config;
use std::path::PathBuf;

/// Parse a probability threshold in (0, 1)
fn parse_alpha(s: &str) -> Result<f64, String> {
    let a: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if a > 0.0 && a < 1.0 {
        Ok(a)
    } else {
        Err("alpha must be between 0 and 1".to_string())
    }
}

/// Parse a strictly positive temperature
fn parse_temperature(s: &str) -> Result<f64, String> {
    let t: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if t > 0.0 && t.is_finite() {
        Ok(t)
    } else {
        Err("temperature must be positive".to_string())
    }
}

/// ProbSem - probabilistic semantic parsing with language models
#[derive(Parser, Debug)]
#[command(name = "probsem")]
#[command(
    version,
    about = "Score candidate programs with a language model and compare the resulting distributions to human judgments",
    after_help = "\
Examples:
  probsem score --prompt tug-of-war --test quantifiers
  probsem score --prompt tug-of-war --test quantifiers --backend local --base-url http://localhost:8000/v1
  probsem norms --name strength --model-results outputs/a_results.csv --human data/strength.csv
  probsem tables quant_strength_all.tex
  probsem clean --dry-run"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score every candidate program of a test suite under a language model
    #[command(after_help = "\
Reads <inputs>/<prompt>.txt and <inputs>/<prompt>_<test>.json and writes
<outputs>/<prompt>_<test>_<model>_results.csv.")]
    Score {
        /// Prompt file name (without .txt)
        #[arg(long)]
        prompt: String,

        /// Test suite name: <inputs>/<prompt>_<test>.json
        #[arg(long)]
        test: String,

        /// Model id sent to the completions endpoint
        #[arg(long)]
        model: Option<String>,

        /// Completions backend: openai or local
        #[arg(long, value_parser = ["openai", "local", "vllm", "ollama"])]
        backend: Option<String>,

        /// Base URL of an OpenAI-compatible server
        #[arg(long)]
        base_url: Option<String>,

        /// Divide program log-probabilities by their token count
        #[arg(long)]
        norm: bool,

        /// Temperature applied to program log-weights
        #[arg(long, value_parser = parse_temperature)]
        temp: Option<f64>,

        /// Do not read or write the score cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Calibrate temperatures and test model distributions against human data
    Norms {
        /// Output name: writes <name>_data.csv, <name>_stats.csv, <name>_stats.tex
        #[arg(long)]
        name: String,

        /// Results tables written by `probsem score`
        #[arg(long, required = true, num_args = 1..)]
        model_results: Vec<PathBuf>,

        /// Human responses: subject_id plus one column per sentence
        #[arg(long)]
        human: PathBuf,

        /// Permutations for the null distribution
        #[arg(long)]
        permutations: Option<usize>,

        /// RNG seed for the permutations
        #[arg(long)]
        seed: Option<u64>,

        /// Significance level after FDR correction
        #[arg(long, value_parser = parse_alpha)]
        alpha: Option<f64>,
    },

    /// Merge <prefix>*_stats.csv tables into one LaTeX table
    Tables {
        /// Output file name under the outputs directory; its first two
        /// `_`-separated parts select the stats tables
        out_name: String,
    },

    /// Remove the score cache
    Clean {
        /// Show what would be removed without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_project_config(&cwd);

    match cli.command {
        Commands::Score {
            prompt,
            test,
            model,
            backend,
            base_url,
            norm,
            temp,
            no_cache,
        } => score::run(
            &config,
            score::ScoreArgs {
                prompt,
                test,
                model,
                backend,
                base_url,
                norm,
                temperature: temp,
                no_cache,
            },
        ),

        Commands::Norms {
            name,
            model_results,
            human,
            permutations,
            seed,
            alpha,
        } => {
            let mut opts = config.norms_options();
            if let Some(k) = permutations {
                opts.permutations = k;
            }
            if let Some(s) = seed {
                opts.seed = s;
            }
            if let Some(a) = alpha {
                opts.alpha = a;
            }
            norms::run(&config, &name, &model_results, &human, &opts)
        }

        Commands::Tables { out_name } => tables::run(&config, &out_name),

        Commands::Clean { dry_run } => clean::run(&config.cache_dir(), dry_run),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alpha() {
        assert_eq!(parse_alpha("0.05"), Ok(0.05));
        assert!(parse_alpha("0").is_err());
        assert!(parse_alpha("1.5").is_err());
        assert!(parse_alpha("abc").is_err());
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature("2"), Ok(2.0));
        assert!(parse_temperature("0").is_err());
        assert!(parse_temperature("-1").is_err());
        assert!(parse_temperature("inf").is_err());
    }

    #[test]
    fn test_score_args() {
        let cli = Cli::try_parse_from([
            "probsem", "score", "--prompt", "tug", "--test", "quant", "--norm", "--temp", "0.5",
        ])
        .expect("valid args");
        match cli.command {
            Commands::Score {
                prompt,
                test,
                model,
                norm,
                temp,
                no_cache,
                ..
            } => {
                assert_eq!(prompt, "tug");
                assert_eq!(test, "quant");
                assert!(model.is_none());
                assert!(norm);
                assert_eq!(temp, Some(0.5));
                assert!(!no_cache);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_norms_requires_model_results() {
        let err = Cli::try_parse_from(["probsem", "norms", "--name", "n", "--human", "h.csv"]);
        assert!(err.is_err());

        let cli = Cli::try_parse_from([
            "probsem",
            "norms",
            "--name",
            "n",
            "--model-results",
            "a.csv",
            "b.csv",
            "--human",
            "h.csv",
            "--seed",
            "3",
        ])
        .expect("valid args");
        match cli.command {
            Commands::Norms {
                model_results,
                seed,
                ..
            } => {
                assert_eq!(model_results.len(), 2);
                assert_eq!(seed, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_log_level_is_global() {
        let cli = Cli::try_parse_from(["probsem", "clean", "--log-level", "debug"])
            .expect("valid args");
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Clean { dry_run: false }));
    }
}
