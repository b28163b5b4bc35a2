//! Box-constrained quasi-Newton minimisation
//!
//! Projected L-BFGS: the two-loop recursion gives a search direction from the
//! projected gradient, components that would leave an active bound are
//! dropped, and a backtracking Armijo search runs along the projected path.
//! The history is discarded whenever the direction stops being a descent
//! direction.

use std::collections::VecDeque;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Sufficient-decrease constant of the Armijo condition
const ARMIJO_C1: f64 = 1e-4;

/// Maximum step halvings per line search
const MAX_BACKTRACKS: usize = 40;

/// L-BFGS settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbfgsConfig {
    /// Iteration limit per start
    pub max_iterations: usize,
    /// Stored correction pairs
    pub history: usize,
    /// Stop when the largest projected gradient component is below this
    pub gradient_tolerance: f64,
    /// Stop when the relative decrease of the objective is below this
    pub function_tolerance: f64,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            history: 10,
            gradient_tolerance: 1e-5,
            function_tolerance: 2.220_446_049_250_313e-9,
        }
    }
}

/// Result of one minimisation
#[derive(Clone, Debug)]
pub struct Minimum {
    /// Final point
    pub theta: DVector<f64>,
    /// Objective at `theta`
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether a tolerance was met
    pub converged: bool,
}

/// Minimise `objective` inside `bounds`, starting from `start`.
///
/// `objective` returns the value and gradient at a point. A non-finite value
/// is treated as infeasible by the line search; if the start itself is
/// non-finite the start is returned unchanged.
pub fn minimize<F>(
    objective: F,
    start: &DVector<f64>,
    bounds: &[(f64, f64)],
    config: &LbfgsConfig,
) -> Minimum
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    let mut x = project(start, bounds);
    let (mut f, mut g) = objective(&x);
    let mut history: VecDeque<(DVector<f64>, DVector<f64>, f64)> = VecDeque::new();

    if !f.is_finite() {
        return Minimum { theta: x, value: f, iterations: 0, converged: false };
    }

    for iteration in 0..config.max_iterations {
        let pg = projected_gradient(&x, &g, bounds);
        if pg.amax() < config.gradient_tolerance {
            return Minimum { theta: x, value: f, iterations: iteration, converged: true };
        }

        let mut direction = two_loop(&pg, &history);
        clip_direction(&mut direction, &x, bounds);
        if direction.dot(&g) >= 0.0 {
            history.clear();
            direction = -pg.clone();
            clip_direction(&mut direction, &x, bounds);
            if direction.dot(&g) >= 0.0 {
                return Minimum { theta: x, value: f, iterations: iteration, converged: true };
            }
        }

        // Without curvature information, keep the first step short
        let mut step = if history.is_empty() { (1.0 / direction.amax()).min(1.0) } else { 1.0 };

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = project(&(&x + &direction * step), bounds);
            let (f_new, g_new) = objective(&candidate);
            let decrease = g.dot(&(&candidate - &x));
            if f_new.is_finite() && f_new <= f + ARMIJO_C1 * decrease {
                accepted = Some((candidate, f_new, g_new));
                break;
            }
            step *= 0.5;
        }

        let Some((x_new, f_new, g_new)) = accepted else {
            tracing::trace!(iteration, value = f, "Line search failed");
            return Minimum { theta: x, value: f, iterations: iteration, converged: false };
        };

        let s = &x_new - &x;
        let y = &g_new - &g;
        let sy = s.dot(&y);
        if sy > f64::EPSILON * y.dot(&y) {
            if history.len() == config.history {
                history.pop_front();
            }
            history.push_back((s, y, 1.0 / sy));
        }

        let relative = (f - f_new) / f.abs().max(f_new.abs()).max(1.0);
        x = x_new;
        f = f_new;
        g = g_new;

        if relative <= config.function_tolerance {
            return Minimum { theta: x, value: f, iterations: iteration + 1, converged: true };
        }
    }

    Minimum { theta: x, value: f, iterations: config.max_iterations, converged: false }
}

/// Clamp every component into its bounds
fn project(x: &DVector<f64>, bounds: &[(f64, f64)]) -> DVector<f64> {
    DVector::from_fn(x.len(), |i, _| x[i].clamp(bounds[i].0, bounds[i].1))
}

/// Gradient with components pushing against an active bound zeroed
fn projected_gradient(x: &DVector<f64>, g: &DVector<f64>, bounds: &[(f64, f64)]) -> DVector<f64> {
    DVector::from_fn(x.len(), |i, _| {
        let (lo, hi) = bounds[i];
        if (x[i] <= lo && g[i] > 0.0) || (x[i] >= hi && g[i] < 0.0) {
            0.0
        } else {
            g[i]
        }
    })
}

/// Drop direction components that leave an active bound
fn clip_direction(direction: &mut DVector<f64>, x: &DVector<f64>, bounds: &[(f64, f64)]) {
    for (i, d) in direction.iter_mut().enumerate() {
        let (lo, hi) = bounds[i];
        if (x[i] <= lo && *d < 0.0) || (x[i] >= hi && *d > 0.0) {
            *d = 0.0;
        }
    }
}

/// L-BFGS two-loop recursion: `-H q`
fn two_loop(q: &DVector<f64>, history: &VecDeque<(DVector<f64>, DVector<f64>, f64)>) -> DVector<f64> {
    let mut r = q.clone();
    let mut alphas = Vec::with_capacity(history.len());

    for (s, y, rho) in history.iter().rev() {
        let alpha = rho * s.dot(&r);
        r.axpy(-alpha, y, 1.0);
        alphas.push(alpha);
    }

    if let Some((s, y, _)) = history.back() {
        r *= s.dot(y) / y.dot(y);
    }

    for ((s, y, rho), alpha) in history.iter().zip(alphas.into_iter().rev()) {
        let beta = rho * y.dot(&r);
        r.axpy(alpha - beta, s, 1.0);
    }

    -r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unbounded(n: usize) -> Vec<(f64, f64)> {
        vec![(-1e6, 1e6); n]
    }

    fn rosenbrock(x: &DVector<f64>) -> (f64, DVector<f64>) {
        let (a, b) = (x[0], x[1]);
        let value = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
        let gradient = DVector::from_vec(vec![
            -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
            200.0 * (b - a * a),
        ]);
        (value, gradient)
    }

    #[test]
    fn test_quadratic_minimum() {
        let center = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let scales = DVector::from_vec(vec![1.0, 10.0, 0.1]);
        let objective = |x: &DVector<f64>| {
            let diff = x - &center;
            let value = diff.component_mul(&diff).dot(&scales);
            (value, 2.0 * diff.component_mul(&scales))
        };

        let start = DVector::zeros(3);
        let min = minimize(objective, &start, &unbounded(3), &LbfgsConfig::default());
        assert!(min.converged);
        assert!((&min.theta - &center).amax() < 1e-3, "{:?}", min.theta);
    }

    #[test]
    fn test_rosenbrock() {
        let config = LbfgsConfig {
            max_iterations: 500,
            function_tolerance: 0.0,
            gradient_tolerance: 1e-8,
            ..Default::default()
        };
        let start = DVector::from_vec(vec![-1.2, 1.0]);
        let min = minimize(rosenbrock, &start, &unbounded(2), &config);
        assert!((min.theta[0] - 1.0).abs() < 1e-3, "{:?}", min.theta);
        assert!((min.theta[1] - 1.0).abs() < 1e-3, "{:?}", min.theta);
    }

    #[test]
    fn test_active_bound() {
        // Unconstrained minimum at (3, -1), box [0, 2] x [0, 2]
        let objective = |x: &DVector<f64>| {
            let value = (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2);
            (value, DVector::from_vec(vec![2.0 * (x[0] - 3.0), 2.0 * (x[1] + 1.0)]))
        };
        let bounds = [(0.0, 2.0), (0.0, 2.0)];
        let start = DVector::from_vec(vec![1.0, 1.0]);
        let min = minimize(objective, &start, &bounds, &LbfgsConfig::default());
        assert!(min.converged);
        assert!((min.theta[0] - 2.0).abs() < 1e-12);
        assert!(min.theta[1].abs() < 1e-12);
    }

    #[test]
    fn test_start_is_projected() {
        let objective = |x: &DVector<f64>| (x[0] * x[0], DVector::from_vec(vec![2.0 * x[0]]));
        let start = DVector::from_vec(vec![10.0]);
        let min = minimize(objective, &start, &[(1.0, 5.0)], &LbfgsConfig::default());
        assert!((min.theta[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_start_returned() {
        let objective = |x: &DVector<f64>| (f64::NAN, x.clone());
        let start = DVector::from_vec(vec![0.5]);
        let min = minimize(objective, &start, &unbounded(1), &LbfgsConfig::default());
        assert!(!min.converged);
        assert_eq!(min.iterations, 0);
        assert_eq!(min.theta[0], 0.5);
    }
}
