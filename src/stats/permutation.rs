//! Permutation null distributions and multiple-comparison correction

use super::divergence::distance;
use super::{jensen_shannon, StatsResult};
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;

/// Jensen-Shannon distances between independently shuffled copies of `p`
/// and `q`, one per permutation.
///
/// Shuffling both vectors destroys their alignment over the value grid while
/// keeping each marginal shape, which is the null hypothesis for
/// "the two distributions agree about *where* the mass is".
pub fn null_distances<R: Rng + ?Sized>(
    p: &[f64],
    q: &[f64],
    permutations: usize,
    rng: &mut R,
) -> StatsResult<Vec<f64>> {
    // validates lengths and mass once
    jensen_shannon(p, q)?;
    let p_total: f64 = p.iter().sum();
    let q_total: f64 = q.iter().sum();

    let mut p_perm = p.to_vec();
    let mut q_perm = q.to_vec();
    let mut null = Vec::with_capacity(permutations);
    for _ in 0..permutations {
        p_perm.copy_from_slice(p);
        q_perm.copy_from_slice(q);
        p_perm.shuffle(rng);
        q_perm.shuffle(rng);
        null.push(distance(&p_perm, &q_perm, p_total, q_total));
    }
    Ok(null)
}

/// Lower-tail permutation p-value: the share of null distances at or below
/// the observed one. Small distances mean similar distributions, so a small
/// p-value says the observed agreement is unlikely by chance.
pub fn permutation_pvalue(observed: f64, null_values: &[f64]) -> f64 {
    if null_values.is_empty() {
        return 1.0;
    }
    let le = null_values.iter().filter(|&&v| v <= observed).count() as f64;
    le / null_values.len() as f64
}

/// Benjamini-Hochberg adjusted p-values, returned in input order.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    if pvalues.is_empty() {
        return Vec::new();
    }
    let m = pvalues.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&i, &j| {
        pvalues[i]
            .partial_cmp(&pvalues[j])
            .unwrap_or(Ordering::Equal)
            .then(i.cmp(&j))
    });

    let mut q = vec![1.0; m];
    let mut prev = 1.0_f64;
    for (rank0, &idx) in order.iter().enumerate().rev() {
        let rank = rank0 + 1;
        let adj = (pvalues[idx] * m as f64 / rank as f64).min(1.0);
        prev = prev.min(adj);
        q[idx] = prev;
    }
    q
}
