//! Observed vs. permutation-null distances, FDR across sentences

use super::{CalibratedSentence, HumanSentence, NormsError, NormsOptions, NormsResult};
use crate::stats::{benjamini_hochberg, jensen_shannon, null_distances, permutation_pvalue};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One row of `<name>_stats.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceScore {
    pub text: String,
    pub temperature: f64,
    pub js_distance: f64,
    pub pval: f64,
    pub pval_fdr: f64,
    #[serde(with = "flag")]
    pub significant: bool,
}

/// `significant` is stored as 0/1
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(d)?;
        match raw.trim() {
            "1" | "true" | "True" => Ok(true),
            "0" | "false" | "False" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid significance flag: {}",
                other
            ))),
        }
    }
}

/// One row of `<name>_data.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub source: String,
    pub text: String,
    pub theta: f64,
    pub prob: f64,
}

/// Test each calibrated sentence against its human distribution.
///
/// A single RNG seeded from `opts.seed` is shared across sentences in order.
pub fn compare_distributions(
    calibrated: &[CalibratedSentence],
    human: &[HumanSentence],
    opts: &NormsOptions,
) -> NormsResult<Vec<SentenceScore>> {
    let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);
    let mut observed = Vec::with_capacity(calibrated.len());
    let mut pvals = Vec::with_capacity(calibrated.len());

    for sentence in calibrated {
        let h = human
            .iter()
            .find(|h| h.text == sentence.text)
            .ok_or_else(|| NormsError::MissingSentence(sentence.text.clone()))?;
        let stats_err = |source| NormsError::Stats {
            text: sentence.text.clone(),
            source,
        };

        let distance = jensen_shannon(&h.probs, &sentence.probs).map_err(stats_err)?;
        let null = null_distances(&h.probs, &sentence.probs, opts.permutations, &mut rng)
            .map_err(stats_err)?;
        let pval = permutation_pvalue(distance, &null);
        debug!(
            "{:?}: JSD={:.4} p={:.4} over {} permutations",
            sentence.text,
            distance,
            pval,
            null.len()
        );
        observed.push(distance);
        pvals.push(pval);
    }

    let adjusted = benjamini_hochberg(&pvals);
    let scores: Vec<SentenceScore> = calibrated
        .iter()
        .zip(observed)
        .zip(pvals)
        .zip(adjusted)
        .map(|(((sentence, js_distance), pval), pval_fdr)| SentenceScore {
            text: sentence.text.clone(),
            temperature: sentence.temperature,
            js_distance,
            pval,
            pval_fdr,
            significant: pval_fdr < opts.alpha,
        })
        .collect();

    info!(
        "{} of {} sentences match human judgments at alpha={}",
        scores.iter().filter(|s| s.significant).count(),
        scores.len(),
        opts.alpha
    );
    Ok(scores)
}

/// Long table: every model row, then every human row
pub fn merge_data(calibrated: &[CalibratedSentence], human: &[HumanSentence]) -> Vec<DataRow> {
    let model_rows = calibrated.iter().flat_map(|s| {
        s.theta.iter().zip(&s.probs).map(move |(theta, prob)| DataRow {
            source: "model".to_string(),
            text: s.text.clone(),
            theta: *theta,
            prob: *prob,
        })
    });
    let human_rows = human.iter().flat_map(|s| {
        s.theta.iter().zip(&s.probs).map(move |(theta, prob)| DataRow {
            source: "human".to_string(),
            text: s.text.clone(),
            theta: *theta,
            prob: *prob,
        })
    });
    model_rows.chain(human_rows).collect()
}
