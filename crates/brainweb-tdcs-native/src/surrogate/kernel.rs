//! Constant-scaled Matérn 5/2 covariance with ARD length scales
//!
//! `k(x, x') = c (1 + √5 r + 5/3 r²) exp(-√5 r)`,
//! `r = sqrt(Σ_d ((x_d - x'_d) / l_d)²)`
//!
//! Hyperparameters are handled in log space as
//! `θ = [ln c, ln l_1, ..., ln l_d]`.

use nalgebra::DMatrix;

/// √5
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Matérn ν = 5/2 correlation at scaled distance `r`
#[inline]
fn matern52(r: f64) -> f64 {
    let sqrt5_r = SQRT_5 * r;
    (1.0 + sqrt5_r + 5.0 / 3.0 * r * r) * (-sqrt5_r).exp()
}

/// Amplitude × Matérn 5/2 kernel
#[derive(Clone, Debug, PartialEq)]
pub struct MaternKernel {
    amplitude: f64,
    length_scales: Vec<f64>,
}

impl MaternKernel {
    /// Create a kernel from its natural-scale hyperparameters
    pub fn new(amplitude: f64, length_scales: Vec<f64>) -> Self {
        Self { amplitude, length_scales }
    }

    /// Kernel with the same length scale in every dimension
    pub fn isotropic(dimensions: usize, amplitude: f64, length_scale: f64) -> Self {
        Self::new(amplitude, vec![length_scale; dimensions])
    }

    /// Kernel from log hyperparameters `[ln c, ln l_1, ..., ln l_d]`
    pub fn from_theta(theta: &[f64]) -> Self {
        Self {
            amplitude: theta[0].exp(),
            length_scales: theta[1..].iter().map(|t| t.exp()).collect(),
        }
    }

    /// Log hyperparameters `[ln c, ln l_1, ..., ln l_d]`
    pub fn theta(&self) -> Vec<f64> {
        std::iter::once(self.amplitude.ln())
            .chain(self.length_scales.iter().map(|l| l.ln()))
            .collect()
    }

    /// Signal amplitude `c`
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Per-dimension length scales
    pub fn length_scales(&self) -> &[f64] {
        &self.length_scales
    }

    /// Input dimensionality
    pub fn dimensions(&self) -> usize {
        self.length_scales.len()
    }

    /// Inputs divided column-wise by the length scales
    fn scale(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut scaled = x.clone();
        for (mut column, &l) in scaled.column_iter_mut().zip(&self.length_scales) {
            column /= l;
        }
        scaled
    }

    /// Covariance `K(x, x)` (no noise term)
    pub fn covariance(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let scaled = self.scale(x);
        let n = scaled.nrows();
        let mut k = DMatrix::zeros(n, n);

        for i in 0..n {
            k[(i, i)] = self.amplitude;
            for j in 0..i {
                let r = (scaled.row(i) - scaled.row(j)).norm();
                let value = self.amplitude * matern52(r);
                k[(i, j)] = value;
                k[(j, i)] = value;
            }
        }

        k
    }

    /// Cross covariance `K(x_new, x_train)`, shape `m × n`
    pub fn cross_covariance(&self, x_new: &DMatrix<f64>, x_train: &DMatrix<f64>) -> DMatrix<f64> {
        let a = self.scale(x_new);
        let b = self.scale(x_train);
        DMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
            let r = (a.row(i) - b.row(j)).norm();
            self.amplitude * matern52(r)
        })
    }

    /// Covariance together with its derivative with respect to each log
    /// hyperparameter, in [`MaternKernel::theta`] order.
    pub fn covariance_with_gradient(&self, x: &DMatrix<f64>) -> (DMatrix<f64>, Vec<DMatrix<f64>>) {
        let scaled = self.scale(x);
        let n = scaled.nrows();
        let d = self.dimensions();

        let k = self.covariance(x);
        let mut gradient = Vec::with_capacity(d + 1);
        // ∂K/∂ln c = K
        gradient.push(k.clone());
        gradient.extend((0..d).map(|_| DMatrix::zeros(n, n)));

        for i in 0..n {
            for j in 0..i {
                let diff = scaled.row(i) - scaled.row(j);
                let r = diff.norm();
                // ∂k/∂ln l_d = c · 5/3 · D_d · (1 + √5 r) · exp(-√5 r)
                let common =
                    self.amplitude * 5.0 / 3.0 * (1.0 + SQRT_5 * r) * (-SQRT_5 * r).exp();
                for (dim, g) in gradient[1..].iter_mut().enumerate() {
                    let value = common * diff[dim] * diff[dim];
                    g[(i, j)] = value;
                    g[(j, i)] = value;
                }
            }
        }

        (k, gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inputs() -> DMatrix<f64> {
        DMatrix::from_row_slice(4, 2, &[
            0.0, 0.0, //
            0.3, 0.1, //
            0.9, 0.4, //
            0.5, 1.2,
        ])
    }

    #[test]
    fn test_matern_at_zero_and_far() {
        assert_eq!(matern52(0.0), 1.0);
        assert!(matern52(50.0) < 1e-40);
        assert!(matern52(0.5) < matern52(0.2));
    }

    #[test]
    fn test_covariance_symmetric_with_amplitude_diagonal() {
        let kernel = MaternKernel::new(2.5, vec![0.7, 1.3]);
        let k = kernel.covariance(&sample_inputs());
        for i in 0..4 {
            assert_eq!(k[(i, i)], 2.5);
            for j in 0..4 {
                assert_eq!(k[(i, j)], k[(j, i)]);
                assert!(k[(i, j)] <= 2.5);
            }
        }
    }

    #[test]
    fn test_cross_covariance_matches_covariance() {
        let kernel = MaternKernel::new(1.7, vec![0.4, 2.0]);
        let x = sample_inputs();
        let k = kernel.covariance(&x);
        let cross = kernel.cross_covariance(&x, &x);
        assert!((k - cross).amax() < 1e-14);
    }

    #[test]
    fn test_theta_round_trip() {
        let kernel = MaternKernel::new(3.0, vec![0.5, 4.0, 1.0]);
        let back = MaternKernel::from_theta(&kernel.theta());
        assert!((back.amplitude() - 3.0).abs() < 1e-12);
        for (a, b) in back.length_scales().iter().zip(kernel.length_scales()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let x = sample_inputs();
        let theta = vec![0.3, -0.2, 0.4];
        let (_, gradient) = MaternKernel::from_theta(&theta).covariance_with_gradient(&x);

        let h = 1e-6;
        for p in 0..theta.len() {
            let mut plus = theta.clone();
            let mut minus = theta.clone();
            plus[p] += h;
            minus[p] -= h;
            let numeric = (MaternKernel::from_theta(&plus).covariance(&x)
                - MaternKernel::from_theta(&minus).covariance(&x))
                / (2.0 * h);
            assert!((numeric - &gradient[p]).amax() < 1e-6, "parameter {p}");
        }
    }
}
