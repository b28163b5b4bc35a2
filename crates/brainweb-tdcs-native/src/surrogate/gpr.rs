//! Multi-output Gaussian process regression
//!
//! One process models every output column with a shared kernel. The
//! hyperparameters maximise the log marginal likelihood summed over columns:
//!
//! ```text
//! log p(Y | X, θ) = -½ Σ_k y_kᵀ K⁻¹ y_k - m Σ_i ln L_ii - m n/2 ln 2π
//! ∂/∂θ_p         = ½ tr((A Aᵀ - m K⁻¹) ∂K/∂θ_p),   A = K⁻¹ Y
//! ```
//!
//! with `K = k(X, X) + α I` and `L` its Cholesky factor. The optimiser starts
//! from the initial hyperparameters and from `restarts` log-uniform draws
//! inside the bounds; starts run in parallel and the best finite optimum wins,
//! earliest start first on ties.

use brainweb_tdcs_core::ConfigError;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::kernel::MaternKernel;
use super::optimizer::{minimize, LbfgsConfig, Minimum};
use crate::error::{RegressionError, RegressionResult};

/// ln(2π)
const LN_2PI: f64 = 1.837_877_066_409_345_5;

// ============================================================================
// Configuration
// ============================================================================

/// Gaussian process settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GprConfig {
    /// Randomised optimizer restarts after the initial start
    pub restarts: usize,
    /// Diagonal noise added to the kernel matrix
    pub noise: f64,
    /// Initial kernel amplitude
    pub initial_amplitude: f64,
    /// Initial length scale, every dimension
    pub initial_length_scale: f64,
    /// Lower bound of amplitude and length scales
    pub lower_bound: f64,
    /// Upper bound of amplitude and length scales
    pub upper_bound: f64,
    /// Seed of the restart draws
    pub seed: u64,
    /// Optimizer settings
    pub optimizer: LbfgsConfig,
}

impl Default for GprConfig {
    fn default() -> Self {
        Self {
            restarts: 10,
            noise: 1e-10,
            initial_amplitude: 1.0,
            initial_length_scale: 1.0,
            lower_bound: 1e-5,
            upper_bound: 1e5,
            seed: 0,
            optimizer: LbfgsConfig::default(),
        }
    }
}

impl GprConfig {
    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |parameter: &'static str, reason: &str| {
            Err(ConfigError::InvalidParameter { parameter, reason: reason.to_string() })
        };

        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return invalid("gpr.noise", "must be finite and non-negative");
        }
        if !(self.lower_bound.is_finite() && self.lower_bound > 0.0) {
            return invalid("gpr.lower_bound", "must be finite and positive");
        }
        if !(self.upper_bound.is_finite() && self.upper_bound > self.lower_bound) {
            return invalid("gpr.upper_bound", "must be finite and above the lower bound");
        }
        let inside = |v: f64| v >= self.lower_bound && v <= self.upper_bound;
        if !inside(self.initial_amplitude) {
            return invalid("gpr.initial_amplitude", "must lie within the bounds");
        }
        if !inside(self.initial_length_scale) {
            return invalid("gpr.initial_length_scale", "must lie within the bounds");
        }
        if self.optimizer.max_iterations == 0 {
            return invalid("gpr.optimizer.max_iterations", "must be positive");
        }
        if self.optimizer.history == 0 {
            return invalid("gpr.optimizer.history", "must be positive");
        }
        Ok(())
    }
}

// ============================================================================
// Model
// ============================================================================

/// Fitted Gaussian process
#[derive(Clone, Debug)]
pub struct GaussianProcess {
    kernel: MaternKernel,
    noise: f64,
    x_train: DMatrix<f64>,
    cholesky: Cholesky<f64, Dyn>,
    /// `K⁻¹ Y`
    alpha: DMatrix<f64>,
    log_marginal_likelihood: f64,
}

impl GaussianProcess {
    /// Fit on inputs `x` (`n × d`) and outputs `y` (`n × m`).
    ///
    /// # Errors
    ///
    /// Returns a [`RegressionError`] for empty, mismatched or non-finite
    /// training data, when no start reaches a finite likelihood, or when the
    /// kernel matrix at the optimum cannot be factorised.
    pub fn fit(x: &DMatrix<f64>, y: &DMatrix<f64>, config: &GprConfig) -> RegressionResult<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(RegressionError::EmptyTrainingSet);
        }
        if x.nrows() != y.nrows() {
            return Err(RegressionError::RowMismatch { inputs: x.nrows(), outputs: y.nrows() });
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(RegressionError::NonFiniteTrainingData);
        }

        let dims = x.ncols();
        let bounds = vec![(config.lower_bound.ln(), config.upper_bound.ln()); dims + 1];
        let starts = restart_points(dims, config, &bounds);

        let objective = |theta: &DVector<f64>| negative_lml(theta, x, y, config.noise);
        let minima: Vec<Minimum> = starts
            .par_iter()
            .map(|start| minimize(&objective, start, &bounds, &config.optimizer))
            .collect();

        let mut best: Option<&Minimum> = None;
        for minimum in minima.iter().filter(|m| m.value.is_finite()) {
            if best.map_or(true, |b| minimum.value < b.value) {
                best = Some(minimum);
            }
        }
        let Some(best) = best else {
            return Err(RegressionError::NoFiniteOptimum { starts: starts.len() });
        };

        let theta: Vec<f64> = best.theta.iter().copied().collect();
        let kernel = MaternKernel::from_theta(&theta);
        let cholesky = factorize(&kernel, x, config.noise)
            .ok_or_else(|| RegressionError::CholeskyFailed { theta: theta.clone() })?;
        let alpha = cholesky.solve(y);
        let log_marginal_likelihood = lml_from_parts(&cholesky, &alpha, y);

        tracing::debug!(
            amplitude = kernel.amplitude(),
            length_scales = ?kernel.length_scales(),
            log_marginal_likelihood,
            starts = starts.len(),
            converged = minima.iter().filter(|m| m.converged).count(),
            "Fitted Gaussian process"
        );

        Ok(Self {
            kernel,
            noise: config.noise,
            x_train: x.clone(),
            cholesky,
            alpha,
            log_marginal_likelihood,
        })
    }

    /// Fitted kernel
    pub fn kernel(&self) -> &MaternKernel {
        &self.kernel
    }

    /// Diagonal noise used at fit time
    pub fn noise(&self) -> f64 {
        self.noise
    }

    /// Log marginal likelihood at the fitted hyperparameters
    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }

    /// Posterior mean at `x_new` (`p × d`), shape `p × m`.
    ///
    /// # Errors
    ///
    /// Returns [`RegressionError::DimensionMismatch`] for inputs of the wrong
    /// width and [`RegressionError::NonFinitePrediction`] if any prediction is
    /// NaN or infinite.
    pub fn predict(&self, x_new: &DMatrix<f64>) -> RegressionResult<DMatrix<f64>> {
        let k_star = self.cross_covariance(x_new)?;
        let mean = &k_star * &self.alpha;

        for (column, values) in mean.column_iter().enumerate() {
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(RegressionError::NonFinitePrediction { row, column });
            }
        }

        Ok(mean)
    }

    /// Posterior mean and per-point standard deviation at `x_new`.
    ///
    /// The deviation is shared by every output column.
    ///
    /// # Errors
    ///
    /// As for [`GaussianProcess::predict`].
    pub fn predict_with_std(
        &self,
        x_new: &DMatrix<f64>,
    ) -> RegressionResult<(DMatrix<f64>, DVector<f64>)> {
        let mean = self.predict(x_new)?;
        let k_star = self.cross_covariance(x_new)?;
        let v = self.cholesky.solve(&k_star.transpose());

        let std = DVector::from_fn(k_star.nrows(), |i, _| {
            let variance = self.kernel.amplitude() - k_star.row(i).transpose().dot(&v.column(i));
            variance.max(0.0).sqrt()
        });

        Ok((mean, std))
    }

    fn cross_covariance(&self, x_new: &DMatrix<f64>) -> RegressionResult<DMatrix<f64>> {
        if x_new.ncols() != self.x_train.ncols() {
            return Err(RegressionError::DimensionMismatch {
                expected: self.x_train.ncols(),
                got: x_new.ncols(),
            });
        }
        Ok(self.kernel.cross_covariance(x_new, &self.x_train))
    }
}

// ============================================================================
// Likelihood
// ============================================================================

/// Optimizer starts: the initial hyperparameters, then seeded log-uniform draws
fn restart_points(dims: usize, config: &GprConfig, bounds: &[(f64, f64)]) -> Vec<DVector<f64>> {
    let initial = MaternKernel::isotropic(dims, config.initial_amplitude, config.initial_length_scale);
    let mut starts = vec![DVector::from_vec(initial.theta())];

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    starts.extend((0..config.restarts).map(|_| {
        DVector::from_iterator(bounds.len(), bounds.iter().map(|&(lo, hi)| rng.gen_range(lo..hi)))
    }));

    starts
}

fn factorize(kernel: &MaternKernel, x: &DMatrix<f64>, noise: f64) -> Option<Cholesky<f64, Dyn>> {
    let mut k = kernel.covariance(x);
    for i in 0..k.nrows() {
        k[(i, i)] += noise;
    }
    k.cholesky()
}

fn lml_from_parts(cholesky: &Cholesky<f64, Dyn>, alpha: &DMatrix<f64>, y: &DMatrix<f64>) -> f64 {
    let (n, m) = y.shape();
    let log_det: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    -0.5 * y.component_mul(alpha).sum() - m as f64 * log_det - 0.5 * (m * n) as f64 * LN_2PI
}

/// Negative log marginal likelihood and its gradient in log space.
///
/// An indefinite kernel matrix gives `+∞` so the line search backs off.
fn negative_lml(
    theta: &DVector<f64>,
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    noise: f64,
) -> (f64, DVector<f64>) {
    let theta: Vec<f64> = theta.iter().copied().collect();
    let kernel = MaternKernel::from_theta(&theta);
    let (mut k, gradient) = kernel.covariance_with_gradient(x);
    for i in 0..k.nrows() {
        k[(i, i)] += noise;
    }

    let Some(cholesky) = k.cholesky() else {
        return (f64::INFINITY, DVector::zeros(theta.len()));
    };

    let alpha = cholesky.solve(y);
    let lml = lml_from_parts(&cholesky, &alpha, y);

    let weights = &alpha * alpha.transpose() - cholesky.inverse() * y.ncols() as f64;
    let grad = DVector::from_iterator(
        gradient.len(),
        gradient.iter().map(|dk| -0.5 * weights.component_mul(dk).sum()),
    );

    (-lml, grad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> GprConfig {
        GprConfig { restarts: 2, ..Default::default() }
    }

    /// 12 points of a smooth 2-D function with two outputs
    fn smooth_data() -> (DMatrix<f64>, DMatrix<f64>) {
        let x = DMatrix::from_fn(12, 2, |i, j| {
            let t = i as f64 / 11.0;
            if j == 0 { t } else { (3.0 * t).sin().abs() }
        });
        let y = DMatrix::from_fn(12, 2, |i, j| {
            let (a, b) = (x[(i, 0)], x[(i, 1)]);
            if j == 0 { a + 2.0 * b } else { (a * 2.0).cos() - b }
        });
        (x, y)
    }

    #[test]
    fn test_default_config_valid() {
        assert!(GprConfig::default().validate().is_ok());
        let bad = GprConfig { lower_bound: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = GprConfig { initial_length_scale: 1e6, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = GprConfig { noise: -1.0, ..Default::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_restart_points_deterministic_and_bounded() {
        let config = GprConfig { restarts: 5, seed: 7, ..Default::default() };
        let bounds = vec![(config.lower_bound.ln(), config.upper_bound.ln()); 3];
        let a = restart_points(2, &config, &bounds);
        let b = restart_points(2, &config, &bounds);
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        assert!(a[0].iter().all(|&t| t == 0.0));
        for start in &a[1..] {
            assert!(start.iter().zip(&bounds).all(|(&t, &(lo, hi))| t >= lo && t < hi));
        }
    }

    #[test]
    fn test_lml_gradient_matches_finite_differences() {
        let (x, y) = smooth_data();
        let theta = DVector::from_vec(vec![0.4, -0.5, 0.2]);
        let (_, grad) = negative_lml(&theta, &x, &y, 1e-6);

        let h = 1e-5;
        for p in 0..theta.len() {
            let mut plus = theta.clone();
            let mut minus = theta.clone();
            plus[p] += h;
            minus[p] -= h;
            let numeric = (negative_lml(&plus, &x, &y, 1e-6).0 - negative_lml(&minus, &x, &y, 1e-6).0)
                / (2.0 * h);
            let tol = 1e-4 * numeric.abs().max(1.0);
            assert!((numeric - grad[p]).abs() < tol, "p {p}: {numeric} vs {}", grad[p]);
        }
    }

    #[test]
    fn test_interpolates_training_points() {
        let (x, y) = smooth_data();
        let gp = GaussianProcess::fit(&x, &y, &quick_config()).unwrap();
        let prediction = gp.predict(&x).unwrap();
        assert_eq!(prediction.shape(), (12, 2));
        assert!((prediction - &y).amax() < 1e-3);
        assert!(gp.log_marginal_likelihood().is_finite());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = smooth_data();
        let a = GaussianProcess::fit(&x, &y, &quick_config()).unwrap();
        let b = GaussianProcess::fit(&x, &y, &quick_config()).unwrap();
        assert_eq!(a.kernel(), b.kernel());
    }

    #[test]
    fn test_std_small_at_training_points() {
        let (x, y) = smooth_data();
        let gp = GaussianProcess::fit(&x, &y, &quick_config()).unwrap();
        let (_, std_train) = gp.predict_with_std(&x).unwrap();
        assert!(std_train.amax() < 1e-2);

        let far = DMatrix::from_row_slice(1, 2, &[50.0, -50.0]);
        let (_, std_far) = gp.predict_with_std(&far).unwrap();
        assert!(std_far[0] > std_train.amax());
    }

    #[test]
    fn test_rejects_bad_training_data() {
        let x = DMatrix::<f64>::zeros(0, 2);
        let y = DMatrix::<f64>::zeros(0, 1);
        assert_eq!(
            GaussianProcess::fit(&x, &y, &quick_config()).unwrap_err(),
            RegressionError::EmptyTrainingSet
        );

        let x = DMatrix::from_element(3, 2, 0.5);
        let y = DMatrix::from_element(2, 1, 1.0);
        assert!(matches!(
            GaussianProcess::fit(&x, &y, &quick_config()),
            Err(RegressionError::RowMismatch { inputs: 3, outputs: 2 })
        ));

        let mut y = DMatrix::from_element(3, 1, 1.0);
        y[(1, 0)] = f64::NAN;
        assert_eq!(
            GaussianProcess::fit(&x, &y, &quick_config()).unwrap_err(),
            RegressionError::NonFiniteTrainingData
        );
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = smooth_data();
        let gp = GaussianProcess::fit(&x, &y, &quick_config()).unwrap();
        let wrong = DMatrix::from_element(2, 3, 0.1);
        assert!(matches!(
            gp.predict(&wrong),
            Err(RegressionError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }
}
