//! Surrogate pipeline
//!
//! One run covers one (ROI, electrode pair) table.
//!
//! ```text
//! records → training set ─────────────────────────┐
//!                                                 ↓
//! Halton levels → CDF inversion → new design → fit + predict (per quantity)
//!                                                 ↓
//!                                            reassembly → SurrogateRun
//! ```
//!
//! Stages run strictly in order. Within a stage the work is spread over
//! tissues or quantities with `rayon`. A quantity whose regression fails is
//! recorded in [`SurrogateRun::failures`] and does not affect the others.

use std::collections::BTreeMap;

use brainweb_tdcs_core::{ConductivitySample, FieldQuantity, Record, Tissue, TISSUE_COUNT};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::config::SurrogateConfig;
use crate::error::{SurrogateError, SurrogateResult};
use crate::surrogate::{
    build_training_set, reassemble, ColumnLayout, ConductivityResampler, GaussianProcess,
    HaltonDesign, SurrogateRecord,
};

/// Result of one pipeline run
#[derive(Debug)]
pub struct SurrogateRun {
    /// Design the predictions were made at: the reference, then the new points
    pub samples: Vec<ConductivitySample>,
    /// Column enumeration of the training table
    pub layout: ColumnLayout,
    /// Reassembled predictions of every successfully fitted quantity
    pub records: Vec<SurrogateRecord>,
    /// Quantities whose regression succeeded, in configuration order
    pub quantities: Vec<FieldQuantity>,
    /// Quantities whose regression failed
    pub failures: BTreeMap<FieldQuantity, SurrogateError>,
}

impl SurrogateRun {
    /// Whether every requested quantity was predicted
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Configured surrogate pipeline
#[derive(Clone, Debug)]
pub struct SurrogatePipeline {
    config: SurrogateConfig,
    resampler: ConductivityResampler,
    design: HaltonDesign,
}

impl SurrogatePipeline {
    /// Validate `config` and build the per-tissue priors and inversion grids.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::Config`] for invalid settings or tissue
    /// priors. Nothing is computed in that case.
    pub fn new(config: SurrogateConfig, tissues: &[Tissue]) -> SurrogateResult<Self> {
        config.validate()?;
        let resampler = ConductivityResampler::new(tissues, config.grid_resolution)?;
        let design = HaltonDesign::new(TISSUE_COUNT, config.design_seed)?;

        Ok(Self { config, resampler, design })
    }

    /// Configuration in use
    pub fn config(&self) -> &SurrogateConfig {
        &self.config
    }

    /// Conductivity design: the reference sample, then one resampled sample
    /// per Halton point.
    ///
    /// # Errors
    ///
    /// Returns [`SurrogateError::Config`] if the design cannot be drawn.
    pub fn design(&self, reference: &ConductivitySample) -> SurrogateResult<Vec<ConductivitySample>> {
        let levels = self.design.sample(self.config.new_samples)?;
        Ok(self.resampler.resample(reference, &levels)?)
    }

    /// Run every stage on one record table.
    ///
    /// # Errors
    ///
    /// Data-consistency problems in `records` abort the run. Regression
    /// failures do not; they are reported per quantity in the result.
    pub fn run(&self, records: &[Record]) -> SurrogateResult<SurrogateRun> {
        let training = build_training_set(records, &self.config.vois)?;
        let samples = self.design(training.reference())?;
        let new_design = design_matrix(&samples);

        tracing::info!(
            observed = training.samples.len(),
            predicted = samples.len(),
            columns = training.layout.len(),
            quantities = self.config.vois.len(),
            "Fitting surrogates"
        );

        let outcomes: Vec<(FieldQuantity, SurrogateResult<DMatrix<f64>>)> = training
            .outputs
            .par_iter()
            .map(|(&quantity, outputs)| {
                let prediction = GaussianProcess::fit(&training.design, outputs, &self.config.gpr)
                    .and_then(|gp| gp.predict(&new_design))
                    .map_err(|source| SurrogateError::Regression { quantity, source });
                (quantity, prediction)
            })
            .collect();

        let mut predictions = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for (quantity, outcome) in outcomes {
            match outcome {
                Ok(prediction) => {
                    predictions.insert(quantity, prediction);
                }
                Err(err) => {
                    tracing::warn!(%quantity, error = %err, "Surrogate fit failed");
                    failures.insert(quantity, err);
                }
            }
        }

        let records = reassemble(&training.layout, &samples, &predictions)?;
        let quantities =
            self.config.vois.iter().copied().filter(|q| predictions.contains_key(q)).collect();

        tracing::info!(rows = records.len(), failed = failures.len(), "Surrogate run complete");

        Ok(SurrogateRun { samples, layout: training.layout, records, quantities, failures })
    }
}

/// `N × 5` matrix of sample conductivities
fn design_matrix(samples: &[ConductivitySample]) -> DMatrix<f64> {
    DMatrix::from_fn(samples.len(), TISSUE_COUNT, |row, tissue| {
        samples[row].conductivities.as_slice()[tissue]
    })
}
