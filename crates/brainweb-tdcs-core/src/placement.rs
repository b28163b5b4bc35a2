//! Electrode placements
//!
//! Each experiment moves the anode around its nominal 10-20 position. The
//! displaced electrodes are named by appending a direction letter to the
//! anode label (`C3A`, `C3P`, ...). [`Placement`] replaces that string
//! convention with an explicit encoding: stable id, label and grid offset.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// Anode displacement relative to the nominal position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Nominal position
    Reference = 0,
    /// Displaced towards the nasion
    Anterior = 1,
    /// Displaced towards the vertex
    Central = 2,
    /// Displaced away from the midline
    Lateral = 3,
    /// Displaced towards the inion
    Posterior = 4,
}

impl Placement {
    /// All placements in id order
    pub const ALL: [Self; 5] = [
        Self::Reference,
        Self::Anterior,
        Self::Central,
        Self::Lateral,
        Self::Posterior,
    ];

    /// Stable numeric id (the `p_id` column)
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Decode a numeric id
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::UnknownPlacementId`] for ids above 4.
    pub fn from_id(id: u8) -> Result<Self, EncodingError> {
        match id {
            0 => Ok(Self::Reference),
            1 => Ok(Self::Anterior),
            2 => Ok(Self::Central),
            3 => Ok(Self::Lateral),
            4 => Ok(Self::Posterior),
            _ => Err(EncodingError::UnknownPlacementId { id }),
        }
    }

    /// Label (the `p` column)
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Anterior => "anterior",
            Self::Central => "central",
            Self::Lateral => "lateral",
            Self::Posterior => "posterior",
        }
    }

    /// Electrode-name suffix; empty for the nominal position
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Reference => "",
            Self::Anterior => "A",
            Self::Central => "C",
            Self::Lateral => "L",
            Self::Posterior => "P",
        }
    }

    /// Unit grid offset `(x, y)` (the `p_x`/`p_y` columns)
    #[must_use]
    pub const fn offset(self) -> (i8, i8) {
        match self {
            Self::Reference => (0, 0),
            Self::Anterior => (0, 1),
            Self::Central => (1, 0),
            Self::Lateral => (-1, 0),
            Self::Posterior => (0, -1),
        }
    }

    /// Decode the placement of `electrode` relative to `anode`.
    ///
    /// `from_electrode("C3", "C3P")` is [`Placement::Posterior`];
    /// `from_electrode("C3", "C3")` is [`Placement::Reference`].
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::InvalidElectrode`] if `electrode` does not
    /// start with `anode` or carries anything but a single known suffix.
    pub fn from_electrode(anode: &str, electrode: &str) -> Result<Self, EncodingError> {
        let invalid = || EncodingError::InvalidElectrode {
            anode: anode.to_string(),
            electrode: electrode.to_string(),
        };

        let suffix = electrode.strip_prefix(anode).ok_or_else(invalid)?;
        Self::ALL
            .into_iter()
            .find(|p| p.suffix() == suffix)
            .ok_or_else(invalid)
    }

    /// Electrode name of this placement for `anode`
    #[must_use]
    pub fn electrode(self, anode: &str) -> String {
        format!("{anode}{}", self.suffix())
    }

    /// Check a table row's redundant placement columns against this value.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::PlacementMismatch`] when `id` or `offset`
    /// does not belong to this placement.
    pub fn check_columns(self, id: u8, offset: (i8, i8)) -> Result<(), EncodingError> {
        if self.id() == id && self.offset() == offset {
            Ok(())
        } else {
            Err(EncodingError::PlacementMismatch {
                label: self.label().to_string(),
                id,
                offset,
            })
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Placement {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.label() == s)
            .ok_or_else(|| EncodingError::UnknownPlacementLabel { label: s.to_string() })
    }
}
