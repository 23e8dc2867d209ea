//! Jensen-Shannon distance

use super::{StatsError, StatsResult};

/// Jensen-Shannon distance (natural log) between two discrete distributions.
///
/// Both inputs are renormalised to sum to one first, so raw counts are
/// accepted. The result is the square root of the divergence and lies in
/// `[0, sqrt(ln 2)]`.
pub fn jensen_shannon(p: &[f64], q: &[f64]) -> StatsResult<f64> {
    if p.len() != q.len() {
        return Err(StatsError::LengthMismatch {
            left: p.len(),
            right: q.len(),
        });
    }
    let p_total = checked_total(p)?;
    let q_total = checked_total(q)?;
    Ok(distance(p, q, p_total, q_total))
}

fn checked_total(values: &[f64]) -> StatsResult<f64> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(StatsError::InvalidEntry(*bad));
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return Err(StatsError::EmptyDistribution);
    }
    Ok(total)
}

/// Unchecked core; callers guarantee equal lengths and positive totals.
pub(super) fn distance(p: &[f64], q: &[f64], p_total: f64, q_total: f64) -> f64 {
    let mut divergence = 0.0;
    for (&pi, &qi) in p.iter().zip(q) {
        let pi = pi / p_total;
        let qi = qi / q_total;
        let mi = 0.5 * (pi + qi);
        divergence += rel_entr(pi, mi) + rel_entr(qi, mi);
    }
    (divergence / 2.0).max(0.0).sqrt()
}

// x * ln(x / y) with 0 * ln(0) = 0
fn rel_entr(x: f64, y: f64) -> f64 {
    if x > 0.0 && y > 0.0 {
        x * (x / y).ln()
    } else if x == 0.0 && y >= 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_distributions() {
        let p = [0.2, 0.3, 0.5];
        let d = jensen_shannon(&p, &p).expect("same length");
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_support_is_maximal() {
        let d = jensen_shannon(&[1.0, 0.0], &[0.0, 1.0]).expect("same length");
        assert!((d - std::f64::consts::LN_2.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric() {
        let p = [0.1, 0.6, 0.3];
        let q = [0.4, 0.4, 0.2];
        let a = jensen_shannon(&p, &q).expect("valid");
        let b = jensen_shannon(&q, &p).expect("valid");
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_counts_are_renormalised() {
        let a = jensen_shannon(&[1.0, 3.0], &[0.5, 0.5]).expect("valid");
        let b = jensen_shannon(&[0.25, 0.75], &[10.0, 10.0]).expect("valid");
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_known_value() {
        // m = [0.75, 0.25]; sqrt((ln(4/3) + 0.5 ln(2/3) + 0.5 ln 2) / 2)
        let d = jensen_shannon(&[1.0, 0.0], &[0.5, 0.5]).expect("valid");
        assert!((d - 0.464_501_404).abs() < 1e-8);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            jensen_shannon(&[1.0], &[0.5, 0.5]),
            Err(StatsError::LengthMismatch { left: 1, right: 2 })
        );
        assert_eq!(
            jensen_shannon(&[0.0, 0.0], &[0.5, 0.5]),
            Err(StatsError::EmptyDistribution)
        );
        assert!(jensen_shannon(&[f64::NAN, 1.0], &[0.5, 0.5]).is_err());
    }
}
