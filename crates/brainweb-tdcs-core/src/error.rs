//! Error types for the BrainWeb tDCS study
//!
//! Configuration and encoding errors are raised while the static registry and
//! the categorical encodings are validated. Both carry enough context to name
//! the offending tissue, label or electrode without a backtrace.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::tissue::TissueId;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors in fixed study configuration or run parameters.
///
/// These are never transient: a run that hits one must be aborted before any
/// computation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    /// Conductivity support is empty or inverted
    DegenerateBounds {
        /// Offending tissue
        tissue: TissueId,
        /// Lower conductivity bound (S/m)
        k_min: f64,
        /// Upper conductivity bound (S/m)
        k_max: f64,
    },
    /// Standard deviation must be strictly positive
    NonPositiveStd {
        /// Offending tissue
        tissue: TissueId,
        /// Configured standard deviation (S/m)
        k_std: f64,
    },
    /// A tissue parameter is NaN or infinite
    NonFiniteParameter {
        /// Offending tissue
        tissue: TissueId,
        /// Parameter name
        parameter: &'static str,
    },
    /// The normal distribution puts no measurable mass on the support
    VanishingSupport {
        /// Offending tissue
        tissue: TissueId,
        /// `cdf(k_max) - cdf(k_min)`
        span: f64,
    },
    /// A design of zero points was requested
    EmptyDesign,
    /// The inversion grid needs at least two knots
    InvalidGridResolution {
        /// Requested number of knots
        resolution: usize,
    },
    /// Tissue list does not match the fixed tissue order
    TissueMismatch {
        /// Number of tissues expected
        expected: usize,
        /// Number of tissues supplied
        got: usize,
    },
    /// ROI name is not in the registry
    UnknownRoi {
        /// Requested name
        name: String,
    },
    /// A numeric setting is outside its valid range
    InvalidParameter {
        /// Setting name
        parameter: &'static str,
        /// Reason
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateBounds { tissue, k_min, k_max } => {
                write!(f, "Tissue {tissue}: degenerate bounds [{k_min}, {k_max}]")
            }
            Self::NonPositiveStd { tissue, k_std } => {
                write!(f, "Tissue {tissue}: standard deviation {k_std} must be positive")
            }
            Self::NonFiniteParameter { tissue, parameter } => {
                write!(f, "Tissue {tissue}: parameter {parameter} is not finite")
            }
            Self::VanishingSupport { tissue, span } => {
                write!(f, "Tissue {tissue}: normal mass on support is {span:e}")
            }
            Self::EmptyDesign => write!(f, "Design must contain at least one point"),
            Self::InvalidGridResolution { resolution } => {
                write!(f, "Inversion grid resolution {resolution} < 2")
            }
            Self::TissueMismatch { expected, got } => {
                write!(f, "Expected {expected} tissues, got {got}")
            }
            Self::UnknownRoi { name } => write!(f, "Unknown region of interest: {name}"),
            Self::InvalidParameter { parameter, reason } => {
                write!(f, "Invalid {parameter}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Encoding Errors
// ============================================================================

/// Errors decoding categorical columns (placements, field quantities).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingError {
    /// Placement label not recognised
    UnknownPlacementLabel {
        /// Label as read
        label: String,
    },
    /// Placement id outside 0..=4
    UnknownPlacementId {
        /// Id as read
        id: u8,
    },
    /// Electrode name does not encode a placement of the given anode
    InvalidElectrode {
        /// Base anode label (e.g. `C3`)
        anode: String,
        /// Electrode name as read (e.g. `C3X`)
        electrode: String,
    },
    /// Placement label, id and offset disagree
    PlacementMismatch {
        /// Label as read
        label: String,
        /// Id as read
        id: u8,
        /// Offset as read
        offset: (i8, i8),
    },
    /// Field quantity column not recognised
    UnknownQuantity {
        /// Column name as read
        name: String,
    },
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlacementLabel { label } => {
                write!(f, "Unknown placement label '{label}'")
            }
            Self::UnknownPlacementId { id } => write!(f, "Unknown placement id {id}"),
            Self::InvalidElectrode { anode, electrode } => {
                write!(f, "Electrode '{electrode}' is not a placement of anode '{anode}'")
            }
            Self::PlacementMismatch { label, id, offset } => {
                write!(
                    f,
                    "Placement '{label}' disagrees with id {id} / offset ({}, {})",
                    offset.0, offset.1
                )
            }
            Self::UnknownQuantity { name } => write!(f, "Unknown field quantity '{name}'"),
        }
    }
}

impl std::error::Error for EncodingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_tissue() {
        let err = ConfigError::DegenerateBounds {
            tissue: TissueId::Skl,
            k_min: 1.0,
            k_max: 1.0,
        };
        assert!(err.to_string().contains("SKL"));
    }

    #[test]
    fn test_encoding_error_names_electrode() {
        let err = EncodingError::InvalidElectrode {
            anode: "C3".to_string(),
            electrode: "C3X".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("C3X"));
        assert!(msg.contains("'C3'"));
    }
}
