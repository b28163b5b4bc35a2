//! Truncated-normal conductivity priors
//!
//! Each tissue's conductivity follows a normal distribution restricted to
//! `[k_min, k_max]`. The untruncated CDF is rescaled onto the support with
//!
//! ```text
//! resize(v) = (v - Φ(k_min)) / (Φ(k_max) - Φ(k_min))
//! ```
//!
//! so that `resize(Φ(x))` is the truncated CDF.

use brainweb_tdcs_core::{ConfigError, Tissue};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Smallest normal mass on the support that still resizes meaningfully
const MIN_SUPPORT_MASS: f64 = 1e-12;

/// Conductivity prior of one tissue
#[derive(Clone, Debug)]
pub struct ConductivityPrior {
    tissue: Tissue,
    normal: Normal,
    /// Φ(k_min)
    cdf_min: f64,
    /// Φ(k_max) - Φ(k_min)
    cdf_span: f64,
}

impl ConductivityPrior {
    /// Build the prior of `tissue`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for degenerate bounds, a non-positive
    /// standard deviation, or a support carrying no measurable normal mass.
    pub fn new(tissue: &Tissue) -> Result<Self, ConfigError> {
        tissue.validate()?;

        let normal = Normal::new(tissue.k_mean, tissue.k_std).map_err(|_| {
            ConfigError::NonPositiveStd { tissue: tissue.id, k_std: tissue.k_std }
        })?;

        let cdf_min = normal.cdf(tissue.k_min);
        let cdf_span = normal.cdf(tissue.k_max) - cdf_min;
        if !(cdf_span > MIN_SUPPORT_MASS) {
            return Err(ConfigError::VanishingSupport { tissue: tissue.id, span: cdf_span });
        }

        if !tissue.mean_in_support() {
            tracing::warn!(
                tissue = %tissue.id,
                k_mean = tissue.k_mean,
                k_min = tissue.k_min,
                k_max = tissue.k_max,
                "Prior mean lies outside the conductivity support"
            );
        }

        Ok(Self { tissue: *tissue, normal, cdf_min, cdf_span })
    }

    /// Tissue this prior belongs to
    pub fn tissue(&self) -> &Tissue {
        &self.tissue
    }

    /// Untruncated normal CDF
    #[inline]
    pub fn cdf(&self, x: f64) -> f64 {
        self.normal.cdf(x)
    }

    /// Untruncated normal PDF
    #[inline]
    pub fn pdf(&self, x: f64) -> f64 {
        self.normal.pdf(x)
    }

    /// Rescale an untruncated CDF (or PDF) value onto the support
    #[inline]
    pub fn resize(&self, value: f64) -> f64 {
        (value - self.cdf_min) / self.cdf_span
    }

    /// Truncated CDF: `resize(cdf(x))`
    #[inline]
    pub fn truncated_cdf(&self, x: f64) -> f64 {
        self.resize(self.cdf(x))
    }

    /// Likelihood weight of a conductivity: `resize(pdf(x))`
    #[inline]
    pub fn likelihood_weight(&self, x: f64) -> f64 {
        self.resize(self.pdf(x))
    }
}

#[cfg(test)]
mod tests {
    use brainweb_tdcs_core::{TissueId, TISSUES};

    use super::*;

    #[test]
    fn test_resize_normalizes_support() {
        for tissue in &TISSUES {
            let prior = ConductivityPrior::new(tissue).unwrap();
            assert!(prior.truncated_cdf(tissue.k_min).abs() < 1e-12, "{}", tissue.id);
            assert!((prior.truncated_cdf(tissue.k_max) - 1.0).abs() < 1e-12, "{}", tissue.id);
        }
    }

    #[test]
    fn test_truncated_cdf_is_monotonic() {
        let prior = ConductivityPrior::new(&TISSUES[TissueId::Gm.index()]).unwrap();
        let t = prior.tissue();
        let mut previous = prior.truncated_cdf(t.k_min);
        for i in 1..=100 {
            let x = t.k_min + t.span() * f64::from(i) / 100.0;
            let current = prior.truncated_cdf(x);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_symmetric_prior_median() {
        let tissue = Tissue::new(TissueId::Wm, "test", 0.0, 1.0, 0.5, 0.2);
        let prior = ConductivityPrior::new(&tissue).unwrap();
        assert!((prior.truncated_cdf(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_skull_prior_accepted() {
        // Mean sits below k_min but the support still carries mass
        let prior = ConductivityPrior::new(&TISSUES[TissueId::Skl.index()]).unwrap();
        assert!(prior.truncated_cdf(0.05) > 0.5);
    }

    #[test]
    fn test_degenerate_bounds_fail() {
        let tissue = Tissue::new(TissueId::Csf, "flat", 1.0, 1.0, 1.0, 0.3);
        assert!(matches!(
            ConductivityPrior::new(&tissue),
            Err(ConfigError::DegenerateBounds { .. })
        ));
    }

    #[test]
    fn test_vanishing_support_fails() {
        let tissue = Tissue::new(TissueId::Sft, "far tail", 100.0, 101.0, 0.0, 0.1);
        assert!(matches!(
            ConductivityPrior::new(&tissue),
            Err(ConfigError::VanishingSupport { .. })
        ));
    }

    #[test]
    fn test_likelihood_weight_peaks_at_mean() {
        let tissue = Tissue::new(TissueId::Wm, "test", 0.0, 1.0, 0.5, 0.2);
        let prior = ConductivityPrior::new(&tissue).unwrap();
        assert!(prior.likelihood_weight(0.5) > prior.likelihood_weight(0.2));
        assert!(prior.likelihood_weight(0.5) > prior.likelihood_weight(0.8));
    }
}
