//! Conductivity resampling by CDF inversion
//!
//! Each tissue's truncated CDF is tabulated on a uniform grid over
//! `[k_min, k_max]`. A target level `u` maps to the grid knot whose CDF value
//! is nearest to `u`; ties go to the lower knot. The table is monotonic, so
//! the lookup is a binary search rather than a scan.

use brainweb_tdcs_core::{
    Conductivities, ConductivitySample, ConfigError, SampleId, Tissue, TissueId, TISSUE_COUNT,
};
use nalgebra::DMatrix;
use rayon::prelude::*;

use super::distribution::ConductivityPrior;

/// Tabulated truncated CDF of one tissue
#[derive(Clone, Debug)]
pub struct InversionGrid {
    k_min: f64,
    k_max: f64,
    step: f64,
    /// Truncated CDF at each knot, non-decreasing
    levels: Vec<f64>,
}

impl InversionGrid {
    /// Tabulate `prior` on `resolution` evenly spaced knots, both bounds
    /// included.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidGridResolution`] below two knots.
    pub fn new(prior: &ConductivityPrior, resolution: usize) -> Result<Self, ConfigError> {
        if resolution < 2 {
            return Err(ConfigError::InvalidGridResolution { resolution });
        }

        let tissue = prior.tissue();
        let (k_min, k_max) = (tissue.k_min, tissue.k_max);
        let step = tissue.span() / (resolution - 1) as f64;

        let raw: Vec<f64> = (0..resolution)
            .into_par_iter()
            .map(|i| prior.truncated_cdf(knot_at(k_min, k_max, step, resolution, i)))
            .collect();

        // Rounding in the CDF tails can dip by an ulp; the search needs order
        let mut running = f64::NEG_INFINITY;
        let levels = raw
            .into_iter()
            .map(|level| {
                running = running.max(level);
                running
            })
            .collect();

        Ok(Self { k_min, k_max, step, levels })
    }

    /// Number of knots
    pub fn resolution(&self) -> usize {
        self.levels.len()
    }

    /// Knot spacing
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Conductivity at knot `i`
    #[inline]
    pub fn knot(&self, i: usize) -> f64 {
        knot_at(self.k_min, self.k_max, self.step, self.resolution(), i)
    }

    /// Tabulated truncated CDF
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Index of the first knot whose level is nearest to `u`
    pub fn nearest_index(&self, u: f64) -> usize {
        let levels = &self.levels;
        let upper = levels.partition_point(|&level| level < u);

        let nearest = if upper == 0 {
            levels[0]
        } else if upper == levels.len() {
            levels[levels.len() - 1]
        } else {
            let below = levels[upper - 1];
            let above = levels[upper];
            if u - below <= above - u {
                below
            } else {
                above
            }
        };

        levels.partition_point(|&level| level < nearest)
    }

    /// Conductivity whose truncated CDF is nearest to `u`
    pub fn invert(&self, u: f64) -> f64 {
        self.knot(self.nearest_index(u))
    }
}

/// Knot `i` of a `resolution`-point grid; the last knot is exactly `k_max`
#[inline]
fn knot_at(k_min: f64, k_max: f64, step: f64, resolution: usize, i: usize) -> f64 {
    if i + 1 == resolution {
        k_max
    } else {
        k_min + i as f64 * step
    }
}

/// Maps quantile levels onto conductivity profiles, one grid per tissue
#[derive(Clone, Debug)]
pub struct ConductivityResampler {
    grids: Vec<InversionGrid>,
}

impl ConductivityResampler {
    /// Build priors and inversion grids for `tissues` (in design-matrix order).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the tissue list has the wrong length, a
    /// tissue prior is degenerate, or the resolution is below two.
    pub fn new(tissues: &[Tissue], resolution: usize) -> Result<Self, ConfigError> {
        if tissues.len() != TISSUE_COUNT {
            return Err(ConfigError::TissueMismatch {
                expected: TISSUE_COUNT,
                got: tissues.len(),
            });
        }

        let grids = tissues
            .par_iter()
            .map(|tissue| {
                let prior = ConductivityPrior::new(tissue)?;
                InversionGrid::new(&prior, resolution)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(resolution, tissues = grids.len(), "Built CDF inversion grids");
        Ok(Self { grids })
    }

    /// Inversion grid of one tissue
    pub fn grid(&self, tissue: TissueId) -> &InversionGrid {
        &self.grids[tissue.index()]
    }

    /// Turn a `n × 5` matrix of quantile levels into conductivity samples.
    ///
    /// The output starts with `reference`, unchanged, followed by samples
    /// `1..=n` in row order. An empty level matrix yields the reference only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TissueMismatch`] if `levels` does not have one
    /// column per tissue.
    pub fn resample(
        &self,
        reference: &ConductivitySample,
        levels: &DMatrix<f64>,
    ) -> Result<Vec<ConductivitySample>, ConfigError> {
        if levels.nrows() > 0 && levels.ncols() != self.grids.len() {
            return Err(ConfigError::TissueMismatch {
                expected: self.grids.len(),
                got: levels.ncols(),
            });
        }

        let mut samples = Vec::with_capacity(levels.nrows() + 1);
        samples.push(*reference);

        for (row, quantiles) in levels.row_iter().enumerate() {
            let mut conductivities = Conductivities::default();
            for tissue in TissueId::ALL {
                let u = quantiles[tissue.index()];
                conductivities.set(tissue, self.grid(tissue).invert(u));
            }
            samples.push(ConductivitySample::new((row + 1) as SampleId, conductivities));
        }

        Ok(samples)
    }
}
