//! Test-suite schema, validation and sample expansion

use super::{BenchmarkError, BenchmarkResult};
use serde::Deserialize;
use std::path::Path;

const COMMENT: &str = ";;";

#[derive(Debug, Clone, Deserialize)]
struct ContextEntry {
    text: String,
    expected: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSuite {
    premise: String,
    query: String,
    context: Vec<ContextEntry>,
    programs: Vec<String>,
}

/// One context sentence with every candidate program spelled out
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The context sentence itself, e.g. `;; Most players are strong.`
    pub text: String,
    /// Index of the program the sentence is expected to mean
    pub expected: usize,
    /// `premise \n text [\n query] \n program`, one per program
    pub candidates: Vec<String>,
}

/// Validated test suite
#[derive(Debug, Clone)]
pub struct TestSuite {
    name: String,
    suite: RawSuite,
}

impl TestSuite {
    /// Load and validate `<inputs>/<prompt>_<suite>.json`
    pub fn load(inputs: &Path, prompt: &str, suite: &str) -> BenchmarkResult<Self> {
        let path = inputs.join(format!("{}_{}.json", prompt, suite));
        let content = std::fs::read_to_string(&path).map_err(|source| BenchmarkError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_json(suite, &content, &path)
    }

    /// Parse and validate suite JSON; `origin` is only used in error messages
    pub fn from_json(name: &str, content: &str, origin: &Path) -> BenchmarkResult<Self> {
        let suite: RawSuite =
            serde_json::from_str(content).map_err(|source| BenchmarkError::Json {
                path: origin.to_path_buf(),
                source,
            })?;
        validate(&suite).map_err(|message| BenchmarkError::Schema {
            path: origin.to_path_buf(),
            message,
        })?;
        Ok(Self {
            name: name.to_string(),
            suite,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_examples(&self) -> usize {
        self.suite.context.len()
    }

    pub fn n_programs(&self) -> usize {
        self.suite.programs.len()
    }

    /// Expand every context sentence into its scored candidates.
    ///
    /// A bare `;;` query means "no query line".
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.suite.context.iter().map(move |entry| {
            let candidates = self
                .suite
                .programs
                .iter()
                .map(|program| {
                    let mut parts = vec![self.suite.premise.as_str(), entry.text.as_str()];
                    if self.suite.query != COMMENT {
                        parts.push(self.suite.query.as_str());
                    }
                    parts.push(program.as_str());
                    parts.join("\n")
                })
                .collect();
            Sample {
                text: entry.text.clone(),
                expected: entry.expected,
                candidates,
            }
        })
    }
}

fn validate(suite: &RawSuite) -> Result<(), String> {
    if !suite.premise.starts_with(COMMENT) {
        return Err("premise must start with ';;'".to_string());
    }
    if !suite.query.starts_with(COMMENT) {
        return Err("query must start with ';;'".to_string());
    }
    if suite.programs.is_empty() {
        return Err("programs must not be empty".to_string());
    }
    if let Some(bad) = suite
        .programs
        .iter()
        .find(|p| !(p.starts_with('(') && p.ends_with(')')))
    {
        return Err(format!("program is not parenthesised: {}", bad));
    }
    if suite.context.is_empty() {
        return Err("context must not be empty".to_string());
    }
    for (i, entry) in suite.context.iter().enumerate() {
        if !entry.text.starts_with(COMMENT) {
            return Err(format!("context[{}].text must start with ';;'", i));
        }
        if entry.expected >= suite.programs.len() {
            return Err(format!(
                "context[{}].expected = {} but there are only {} programs",
                i,
                entry.expected,
                suite.programs.len()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"{
        "premise": ";; There is a tug-of-war tournament.",
        "query": ";; Program:",
        "context": [
            {"text": ";; Most players are strong.", "expected": 1},
            {"text": ";; Few players are strong.", "expected": 0}
        ],
        "programs": ["(define theta 20)", "(define theta 80)"]
    }"#;

    fn parse(json: &str) -> BenchmarkResult<TestSuite> {
        TestSuite::from_json("A", json, Path::new("test_A.json"))
    }

    #[test]
    fn test_samples_include_query() {
        let suite = parse(SUITE).expect("valid suite");
        assert_eq!(suite.n_examples(), 2);
        assert_eq!(suite.n_programs(), 2);

        let samples: Vec<Sample> = suite.samples().collect();
        assert_eq!(samples[0].expected, 1);
        assert_eq!(samples[0].text, ";; Most players are strong.");
        assert_eq!(
            samples[0].candidates[1],
            ";; There is a tug-of-war tournament.\n;; Most players are strong.\n;; Program:\n(define theta 80)"
        );
        assert_eq!(samples[1].candidates.len(), 2);
    }

    #[test]
    fn test_bare_query_is_omitted() {
        let json = SUITE.replace(";; Program:", ";;");
        let suite = parse(&json).expect("valid suite");
        let sample = suite.samples().next().expect("one sample");
        assert_eq!(sample.candidates[0].lines().count(), 3);
        assert!(sample.candidates[0].ends_with("(define theta 20)"));
    }

    #[test]
    fn test_rejects_uncommented_premise() {
        let json = SUITE.replace(";; There is", "There is");
        let err = parse(&json).unwrap_err();
        assert!(matches!(err, BenchmarkError::Schema { .. }));
        assert!(err.to_string().contains("premise"));
    }

    #[test]
    fn test_rejects_bad_program() {
        let json = SUITE.replace("(define theta 80)", "define theta 80");
        let err = parse(&json).unwrap_err();
        assert!(err.to_string().contains("not parenthesised"));
    }

    #[test]
    fn test_rejects_out_of_range_expected() {
        let json = SUITE.replace("\"expected\": 1", "\"expected\": 5");
        let err = parse(&json).unwrap_err();
        assert!(err.to_string().contains("expected = 5"));
    }

    #[test]
    fn test_rejects_missing_field() {
        let err = parse(r#"{"premise": ";; x", "query": ";;", "context": []}"#).unwrap_err();
        assert!(matches!(err, BenchmarkError::Json { .. }));
    }

    #[test]
    fn test_rejects_empty_context() {
        let json = r#"{"premise": ";; x", "query": ";;", "context": [], "programs": ["(a)"]}"#;
        let err = parse(json).unwrap_err();
        assert!(err.to_string().contains("context"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("tow_A.json"), SUITE).expect("write suite");
        let suite = TestSuite::load(dir.path(), "tow", "A").expect("load suite");
        assert_eq!(suite.name(), "A");
        assert_eq!(suite.n_programs(), 2);
    }
}
