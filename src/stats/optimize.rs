//! Derivative-free minimisation (downhill simplex)
//!
//! Mirrors the classic Nelder-Mead variant used by most scientific stacks:
//! standard coefficients, a 5% initial simplex, and termination once both the
//! simplex diameter and the spread of function values fall under tolerance.

use std::cell::Cell;

/// Tuning knobs for [`nelder_mead`]
#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    /// Absolute tolerance on the simplex vertices
    pub xtol: f64,
    /// Absolute tolerance on the function values
    pub ftol: f64,
    /// Iteration cap (default: 200 * dimensions)
    pub max_iter: Option<usize>,
    /// Function evaluation cap (default: 200 * dimensions)
    pub max_evals: Option<usize>,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            xtol: 1e-4,
            ftol: 1e-4,
            max_iter: None,
            max_evals: None,
        }
    }
}

/// Outcome of a minimisation run
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
    /// False when a cap was hit before the tolerances were met
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;
const NONZERO_DELTA: f64 = 0.05;
const ZERO_DELTA: f64 = 0.000_25;

/// Minimise `f` starting from `x0`.
///
/// NaN objective values are treated as `+inf` so the simplex moves away from
/// undefined regions instead of getting stuck on unordered comparisons.
pub fn nelder_mead<F>(mut f: F, x0: &[f64], opts: NelderMeadOptions) -> OptimizeResult
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x0.len();
    let max_iter = opts.max_iter.unwrap_or(200 * n.max(1));
    let max_evals = opts.max_evals.unwrap_or(200 * n.max(1));

    let evaluations = Cell::new(0usize);
    let mut eval = |x: &[f64]| {
        evaluations.set(evaluations.get() + 1);
        let v = f(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    if n == 0 {
        let fun = eval(x0);
        return OptimizeResult {
            x: Vec::new(),
            fun,
            iterations: 0,
            evaluations: 1,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for k in 0..n {
        let mut y = x0.to_vec();
        y[k] = if y[k] != 0.0 {
            (1.0 + NONZERO_DELTA) * y[k]
        } else {
            ZERO_DELTA
        };
        simplex.push(y);
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();
    sort_simplex(&mut simplex, &mut values);

    let mut iterations = 1usize;
    let mut converged = false;

    loop {
        if within_tolerance(&simplex, &values, opts.xtol, opts.ftol) {
            converged = true;
            break;
        }
        if evaluations.get() >= max_evals || iterations >= max_iter {
            break;
        }

        let centroid = centroid(&simplex[..n]);
        let worst = simplex[n].clone();

        let xr = affine(&centroid, &worst, 1.0 + REFLECT, -REFLECT);
        let fxr = eval(&xr);
        let mut shrink = false;

        if fxr < values[0] {
            let xe = affine(&centroid, &worst, 1.0 + REFLECT * EXPAND, -REFLECT * EXPAND);
            let fxe = eval(&xe);
            if fxe < fxr {
                simplex[n] = xe;
                values[n] = fxe;
            } else {
                simplex[n] = xr;
                values[n] = fxr;
            }
        } else if fxr < values[n - 1] {
            simplex[n] = xr;
            values[n] = fxr;
        } else if fxr < values[n] {
            // outside contraction
            let xc = affine(&centroid, &worst, 1.0 + CONTRACT * REFLECT, -CONTRACT * REFLECT);
            let fxc = eval(&xc);
            if fxc <= fxr {
                simplex[n] = xc;
                values[n] = fxc;
            } else {
                shrink = true;
            }
        } else {
            // inside contraction
            let xcc = affine(&centroid, &worst, 1.0 - CONTRACT, CONTRACT);
            let fxcc = eval(&xcc);
            if fxcc < values[n] {
                simplex[n] = xcc;
                values[n] = fxcc;
            } else {
                shrink = true;
            }
        }

        if shrink {
            let best = simplex[0].clone();
            for j in 1..=n {
                let shrunk = affine(&best, &simplex[j], 1.0 - SHRINK, SHRINK);
                values[j] = eval(&shrunk);
                simplex[j] = shrunk;
            }
        }

        iterations += 1;
        sort_simplex(&mut simplex, &mut values);
    }

    OptimizeResult {
        x: simplex.swap_remove(0),
        fun: values[0],
        iterations,
        evaluations: evaluations.get(),
        converged,
    }
}

// a * x + b * y, elementwise
fn affine(x: &[f64], y: &[f64], a: f64, b: f64) -> Vec<f64> {
    x.iter().zip(y).map(|(xi, yi)| a * xi + b * yi).collect()
}

fn centroid(points: &[Vec<f64>]) -> Vec<f64> {
    let dims = points[0].len();
    let count = points.len() as f64;
    (0..dims)
        .map(|d| points.iter().map(|p| p[d]).sum::<f64>() / count)
        .collect()
}

fn sort_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}

fn within_tolerance(simplex: &[Vec<f64>], values: &[f64], xtol: f64, ftol: f64) -> bool {
    let best = &simplex[0];
    let x_spread = simplex[1..]
        .iter()
        .flat_map(|v| v.iter().zip(best).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max);
    let f_spread = values[1..]
        .iter()
        .map(|v| (v - values[0]).abs())
        .fold(0.0, f64::max);
    x_spread <= xtol && f_spread <= ftol
}
