//! Program scoring loop
//!
//! For every context sentence of a test suite, each candidate program is
//! scored under the language model and the resulting log-weights are
//! softmax-normalised into a distribution over programs.
//!
//! # Scored text
//!
//! ```text
//! <prompt>
//! <premise>
//! <context sentence>
//! [<query>]
//! <program>        <- only these tokens are scored
//! ```
//!
//! Results go to `<outputs>/<prompt>_<suite>_<model>_results.csv` with one
//! row per (sentence, program): `text,program,weight,score`.

mod export;

pub use export::{read_results, write_results, ResultRow};

use crate::benchmark::{BenchmarkError, Prompt, Sample, TestSuite};
use crate::model::{Model, ModelError};
use crate::stats::{argmax, softmax};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ProbSemError {
    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Candidates of one sample disagree on their context text: {0}")]
    InconsistentSample(String),

    #[error("Duplicate program in sample: {0}")]
    DuplicateProgram(String),

    #[error("Failed to write results to {path}: {message}")]
    Export { path: PathBuf, message: String },
}

pub type ProbSemResult<T> = Result<T, ProbSemError>;

/// One context sentence after scoring
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSample {
    /// Context sentence, the key shared with human judgments
    pub text: String,
    /// Everything above the program line (premise, sentence, query)
    pub context: String,
    pub programs: Vec<String>,
    pub expected: usize,
    /// Unnormalised log-weights, one per program
    pub weights: Vec<f64>,
    /// Softmax of `weights`
    pub scores: Vec<f64>,
}

impl ScoredSample {
    pub fn predicted(&self) -> Option<usize> {
        argmax(&self.scores)
    }

    pub fn is_correct(&self) -> bool {
        self.predicted() == Some(self.expected)
    }

    /// Multi-line log rendering, expected program marked with `*`
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("Text:\t{}", self.text.trim_start_matches(";; "))];
        for (i, (program, prob)) in self.programs.iter().zip(&self.scores).enumerate() {
            let marker = if i == self.expected { "*" } else { " " };
            lines.push(format!("{} {:.4}\t{}", marker, prob, program));
        }
        lines.join("\n")
    }
}

/// Aggregate over a finished run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub n_examples: usize,
    /// Share of sentences whose most probable program is the expected one
    pub accuracy: f64,
    /// Mean probability given to the expected program
    pub mean_expected_prob: f64,
}

impl RunSummary {
    pub fn from_samples(samples: &[ScoredSample]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self {
                n_examples: 0,
                accuracy: 0.0,
                mean_expected_prob: 0.0,
            };
        }
        let correct = samples.iter().filter(|s| s.is_correct()).count();
        let expected_mass: f64 = samples
            .iter()
            .map(|s| s.scores.get(s.expected).copied().unwrap_or(0.0))
            .sum();
        Self {
            n_examples: n,
            accuracy: correct as f64 / n as f64,
            mean_expected_prob: expected_mass / n as f64,
        }
    }
}

/// Everything a caller may want after [`ProbSem::run`]
#[derive(Debug, Clone)]
pub struct RunReport {
    pub samples: Vec<ScoredSample>,
    pub summary: RunSummary,
    pub results_path: PathBuf,
}

/// Replace anything outside `[A-Za-z0-9._-]` with `-` (model ids contain `/`)
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Scoring run over one prompt, one test suite and one model
#[derive(Debug)]
pub struct ProbSem {
    run_id: String,
    prompt: Prompt,
    suite: TestSuite,
    model: Model,
    outputs: PathBuf,
    show_progress: bool,
}

impl ProbSem {
    pub fn new(prompt: Prompt, suite: TestSuite, model: Model, outputs: &Path) -> Self {
        let run_id = sanitize_filename(&format!(
            "{}_{}_{}",
            prompt.name(),
            suite.name(),
            model.id()
        ));
        Self {
            run_id,
            prompt,
            suite,
            model,
            outputs: outputs.to_path_buf(),
            show_progress: true,
        }
    }

    /// Load prompt and suite from `inputs` and build a run
    pub fn load(
        inputs: &Path,
        prompt: &str,
        suite: &str,
        model: Model,
        outputs: &Path,
    ) -> ProbSemResult<Self> {
        let prompt = Prompt::load(inputs, prompt)?;
        let suite = TestSuite::load(inputs, prompt.name(), suite)?;
        Ok(Self::new(prompt, suite, model, outputs))
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn results_path(&self) -> PathBuf {
        self.outputs.join(format!("{}_results.csv", self.run_id))
    }

    pub fn run(&self) -> ProbSemResult<RunReport> {
        let bar = if self.show_progress {
            ProgressBar::new(self.suite.n_examples() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar.set_message("Scoring programs...");

        let mut samples = Vec::with_capacity(self.suite.n_examples());
        for sample in self.suite.samples() {
            let scored = self.score_sample(&sample)?;
            bar.suspend(|| info!("{}", scored.describe()));
            samples.push(scored);
            bar.inc(1);
        }
        bar.finish_and_clear();

        let summary = RunSummary::from_samples(&samples);
        info!(
            "{} examples, accuracy {:.3}, mean expected probability {:.3}",
            summary.n_examples, summary.accuracy, summary.mean_expected_prob
        );

        let results_path = self.results_path();
        write_results(&results_path, &samples).map_err(|e| ProbSemError::Export {
            path: results_path.clone(),
            message: format!("{:#}", e),
        })?;
        info!("Wrote {}", results_path.display());

        Ok(RunReport {
            samples,
            summary,
            results_path,
        })
    }

    fn score_sample(&self, sample: &Sample) -> ProbSemResult<ScoredSample> {
        let (context, programs) = split_candidates(&sample.candidates)?;

        let weights = programs
            .iter()
            .map(|program| {
                let full_text =
                    [self.prompt.text(), context.as_str(), program.as_str()].join("\n");
                self.model.score(&full_text, program)
            })
            .collect::<Result<Vec<f64>, ModelError>>()?;
        let scores = softmax(&weights, 1.0);

        Ok(ScoredSample {
            text: sample.text.clone(),
            context,
            programs,
            expected: sample.expected,
            weights,
            scores,
        })
    }
}

/// Split candidates into the shared context text and per-candidate programs
fn split_candidates(candidates: &[String]) -> ProbSemResult<(String, Vec<String>)> {
    let mut text: Option<&str> = None;
    let mut programs = Vec::with_capacity(candidates.len());
    let mut seen = HashSet::new();

    for candidate in candidates {
        let (head, program) = candidate.rsplit_once('\n').unwrap_or(("", candidate));
        match text {
            None => text = Some(head),
            Some(t) if t != head => {
                return Err(ProbSemError::InconsistentSample(head.to_string()));
            }
            Some(_) => {}
        }
        if !seen.insert(program) {
            return Err(ProbSemError::DuplicateProgram(program.to_string()));
        }
        programs.push(program.to_string());
    }

    Ok((text.unwrap_or_default().to_string(), programs))
}
