//! Leave-one-sentence-out temperature fitting

use super::{HumanSentence, ModelSentence, NormsError, NormsResult};
use crate::stats::{jensen_shannon, nelder_mead, softmax, NelderMeadOptions};
use tracing::{debug, info, warn};

const GRID_EPS: f64 = 1e-9;
const INITIAL_TEMPERATURE: f64 = 1.0;

/// Model distribution of one sentence after temperature scaling
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedSentence {
    pub text: String,
    pub theta: Vec<f64>,
    pub weights: Vec<f64>,
    pub temperature: f64,
    pub probs: Vec<f64>,
}

/// A model sentence paired with its human distribution
struct Pair<'a> {
    model: &'a ModelSentence,
    human: &'a HumanSentence,
}

fn pair_up<'a>(
    model: &'a [ModelSentence],
    human: &'a [HumanSentence],
) -> NormsResult<Vec<Pair<'a>>> {
    model
        .iter()
        .map(|m| {
            let h = human
                .iter()
                .find(|h| h.text == m.text)
                .ok_or_else(|| NormsError::MissingSentence(m.text.clone()))?;
            let same_grid = m.theta.len() == h.theta.len()
                && m
                    .theta
                    .iter()
                    .zip(&h.theta)
                    .all(|(a, b)| (a - b).abs() < GRID_EPS);
            if !same_grid {
                return Err(NormsError::GridMismatch {
                    text: m.text.clone(),
                    model: m.theta.clone(),
                    human: h.theta.clone(),
                });
            }
            Ok(Pair { model: m, human: h })
        })
        .collect()
}

/// Summed distance over `pairs` at temperature `t`, `+inf` outside `t > 0`
fn training_loss(pairs: &[&Pair<'_>], t: f64) -> f64 {
    if !(t > 0.0) {
        return f64::INFINITY;
    }
    pairs
        .iter()
        .map(|p| {
            let probs = softmax(&p.model.weights, t);
            jensen_shannon(&p.human.probs, &probs).unwrap_or(f64::INFINITY)
        })
        .sum()
}

/// Fit one temperature per sentence on all the other sentences.
///
/// Output order follows `model`.
pub fn fit_temperatures(
    model: &[ModelSentence],
    human: &[HumanSentence],
) -> NormsResult<Vec<CalibratedSentence>> {
    if model.is_empty() {
        return Err(NormsError::Empty);
    }
    let pairs = pair_up(model, human)?;

    if pairs.len() == 1 {
        warn!(
            "Only one sentence; using temperature {} without calibration",
            INITIAL_TEMPERATURE
        );
    }

    let mut calibrated = Vec::with_capacity(pairs.len());
    for (held_out, pair) in pairs.iter().enumerate() {
        let text = &pair.model.text;
        let temperature = if pairs.len() == 1 {
            INITIAL_TEMPERATURE
        } else {
            let training: Vec<&Pair<'_>> = pairs
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != held_out)
                .map(|(_, p)| p)
                .collect();
            let result = nelder_mead(
                |x| training_loss(&training, x[0]),
                &[INITIAL_TEMPERATURE],
                NelderMeadOptions::default(),
            );
            if !result.converged {
                warn!(
                    "Temperature fit for {:?} stopped after {} iterations without converging",
                    text, result.iterations
                );
            }
            debug!(
                "Fit {:?}: T={:.4} loss={:.4} ({} evaluations)",
                text, result.x[0], result.fun, result.evaluations
            );
            result.x[0]
        };

        if !(temperature > 0.0) || !temperature.is_finite() {
            return Err(NormsError::InvalidTemperature {
                text: text.clone(),
                temperature,
            });
        }

        calibrated.push(CalibratedSentence {
            text: text.clone(),
            theta: pair.model.theta.clone(),
            weights: pair.model.weights.clone(),
            temperature,
            probs: softmax(&pair.model.weights, temperature),
        });
    }

    info!("Calibrated temperatures for {} sentences", calibrated.len());
    Ok(calibrated)
}
