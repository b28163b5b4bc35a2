//! Head tissues and their conductivity priors
//!
//! The five modelled tissues are fixed. Their order in [`TISSUES`] is the
//! column order of every conductivity design matrix in the workspace.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of modelled tissues.
pub const TISSUE_COUNT: usize = 5;

/// Tissue tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TissueId {
    /// White matter
    Wm,
    /// Gray matter
    Gm,
    /// Cerebrospinal fluid
    Csf,
    /// Skull
    Skl,
    /// Soft tissue (scalp)
    Sft,
}

impl TissueId {
    /// All tissues in design-matrix order
    pub const ALL: [Self; TISSUE_COUNT] = [Self::Wm, Self::Gm, Self::Csf, Self::Skl, Self::Sft];

    /// Column index in a design matrix
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short upper-case tag (`WM`, `GM`, ...)
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Wm => "WM",
            Self::Gm => "GM",
            Self::Csf => "CSF",
            Self::Skl => "SKL",
            Self::Sft => "SFT",
        }
    }

    /// Conductivity column name in the study tables
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Wm => "k_wm",
            Self::Gm => "k_gm",
            Self::Csf => "k_csf",
            Self::Skl => "k_skl",
            Self::Sft => "k_sft",
        }
    }
}

impl fmt::Display for TissueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Conductivity prior of one tissue.
///
/// Conductivities are in S/m. The prior is a normal distribution with
/// `k_mean`/`k_std`, truncated to `[k_min, k_max]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tissue {
    /// Tissue tag
    pub id: TissueId,
    /// Human readable name
    pub long_name: &'static str,
    /// Lower conductivity bound
    pub k_min: f64,
    /// Upper conductivity bound
    pub k_max: f64,
    /// Mean of the untruncated normal
    pub k_mean: f64,
    /// Standard deviation of the untruncated normal
    pub k_std: f64,
}

impl Tissue {
    /// Create a tissue definition
    #[must_use]
    pub const fn new(
        id: TissueId,
        long_name: &'static str,
        k_min: f64,
        k_max: f64,
        k_mean: f64,
        k_std: f64,
    ) -> Self {
        Self { id, long_name, k_min, k_max, k_mean, k_std }
    }

    /// Check that the prior describes a usable truncated distribution.
    ///
    /// The mean is allowed to fall outside the support (the skull prior does);
    /// callers that care can test [`Tissue::mean_in_support`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for non-finite parameters, `k_max <= k_min`
    /// or `k_std <= 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, value) in [
            ("k_min", self.k_min),
            ("k_max", self.k_max),
            ("k_mean", self.k_mean),
            ("k_std", self.k_std),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteParameter { tissue: self.id, parameter });
            }
        }

        if self.k_max <= self.k_min {
            return Err(ConfigError::DegenerateBounds {
                tissue: self.id,
                k_min: self.k_min,
                k_max: self.k_max,
            });
        }

        if self.k_std <= 0.0 {
            return Err(ConfigError::NonPositiveStd { tissue: self.id, k_std: self.k_std });
        }

        Ok(())
    }

    /// Whether `k_min < k_mean < k_max`
    #[must_use]
    pub fn mean_in_support(&self) -> bool {
        self.k_min < self.k_mean && self.k_mean < self.k_max
    }

    /// Width of the support
    #[must_use]
    pub fn span(&self) -> f64 {
        self.k_max - self.k_min
    }
}

/// Conductivity priors of the BrainWeb head models, in design-matrix order.
pub const TISSUES: [Tissue; TISSUE_COUNT] = [
    Tissue::new(TissueId::Wm, "white matter", 0.0646, 0.81, 0.2167, 0.1703),
    Tissue::new(TissueId::Gm, "gray matter", 0.06, 2.47, 0.466, 0.2392),
    Tissue::new(TissueId::Csf, "cerebrospinal fluid", 1.0, 2.51, 1.71, 0.2981),
    Tissue::new(TissueId::Skl, "skull", 0.0182, 1.718, 0.016, 0.019),
    Tissue::new(TissueId::Sft, "soft tissue", 0.137, 2.1, 0.4137, 0.176),
];

/// Look up a tissue prior
#[must_use]
pub const fn tissue(id: TissueId) -> &'static Tissue {
    &TISSUES[id.index()]
}
