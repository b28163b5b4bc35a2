//! Pipeline configuration
//!
//! All tunables of a surrogate run. The defaults reproduce the study's
//! production settings; a run may override any of them from a TOML file or
//! the command line.

use brainweb_tdcs_core::{ConfigError, FieldQuantity};
use serde::{Deserialize, Serialize};

use crate::surrogate::gpr::GprConfig;

/// Surrogate pipeline configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrogateConfig {
    /// Number of new conductivity design points (the reference is added on top)
    pub new_samples: usize,
    /// Seed of the quasi-random design; 0 keeps the plain Halton sequence
    pub design_seed: u64,
    /// Knots of the per-tissue CDF inversion grid
    pub grid_resolution: usize,
    /// Field quantities to regress
    pub vois: Vec<FieldQuantity>,
    /// Gaussian process settings
    pub gpr: GprConfig,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            new_samples: 20,
            design_seed: 0,
            grid_resolution: 1_000_000,
            vois: FieldQuantity::DEFAULT_VOIS.to_vec(),
            gpr: GprConfig::default(),
        }
    }
}

impl SurrogateConfig {
    /// Check the configuration before any computation starts.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty design, a grid with fewer than
    /// two knots, an empty or repeated VOI list, or invalid regression
    /// settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.new_samples == 0 {
            return Err(ConfigError::EmptyDesign);
        }

        if self.grid_resolution < 2 {
            return Err(ConfigError::InvalidGridResolution {
                resolution: self.grid_resolution,
            });
        }

        if self.vois.is_empty() {
            return Err(ConfigError::InvalidParameter {
                parameter: "vois",
                reason: "at least one field quantity is required".to_string(),
            });
        }

        for (i, q) in self.vois.iter().enumerate() {
            if self.vois[..i].contains(q) {
                return Err(ConfigError::InvalidParameter {
                    parameter: "vois",
                    reason: format!("{q} listed twice"),
                });
            }
        }

        self.gpr.validate()
    }
}
