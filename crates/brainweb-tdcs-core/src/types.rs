//! Record types shared by the extraction tables and the surrogate pipeline
//!
//! - [`FieldQuantity`]: the measured field columns
//! - [`Conductivities`] / [`ConductivitySample`]: one conductivity profile
//! - [`Record`]: one row of an extraction table

use core::fmt;
use core::ops::Index;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EncodingError;
use crate::placement::Placement;
use crate::tissue::{TissueId, TISSUE_COUNT};

/// Subject identifier (BrainWeb head model number)
pub type SubjectId = u32;

/// Conductivity sample identifier; 0 is the measured reference profile
pub type SampleId = u32;

// ============================================================================
// Field Quantities
// ============================================================================

/// Field quantity averaged over an ROI.
///
/// `E` is the electric field (V/m), `J` the current density (A/m²); the
/// suffixes are Cartesian, radial and tangential components. All values are
/// scaled by 1000 at extraction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldQuantity {
    /// Electric potential
    #[serde(rename = "v")]
    V,
    /// Field magnitude
    #[serde(rename = "e")]
    E,
    /// Field x component
    #[serde(rename = "e_x")]
    Ex,
    /// Field y component
    #[serde(rename = "e_y")]
    Ey,
    /// Field z component
    #[serde(rename = "e_z")]
    Ez,
    /// Radial field component
    #[serde(rename = "e_r")]
    Er,
    /// Tangential field component
    #[serde(rename = "e_t")]
    Et,
    /// Current density magnitude
    #[serde(rename = "j")]
    J,
    /// Current density x component
    #[serde(rename = "j_x")]
    Jx,
    /// Current density y component
    #[serde(rename = "j_y")]
    Jy,
    /// Current density z component
    #[serde(rename = "j_z")]
    Jz,
    /// Radial current density component
    #[serde(rename = "j_r")]
    Jr,
    /// Tangential current density component
    #[serde(rename = "j_t")]
    Jt,
}

impl FieldQuantity {
    /// All quantities in table column order
    pub const ALL: [Self; 13] = [
        Self::V,
        Self::E,
        Self::Ex,
        Self::Ey,
        Self::Ez,
        Self::Er,
        Self::Et,
        Self::J,
        Self::Jx,
        Self::Jy,
        Self::Jz,
        Self::Jr,
        Self::Jt,
    ];

    /// Variables of interest regressed by default
    pub const DEFAULT_VOIS: [Self; 2] = [Self::E, Self::Er];

    /// Column name in the study tables
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::V => "v",
            Self::E => "e",
            Self::Ex => "e_x",
            Self::Ey => "e_y",
            Self::Ez => "e_z",
            Self::Er => "e_r",
            Self::Et => "e_t",
            Self::J => "j",
            Self::Jx => "j_x",
            Self::Jy => "j_y",
            Self::Jz => "j_z",
            Self::Jr => "j_r",
            Self::Jt => "j_t",
        }
    }
}

impl fmt::Display for FieldQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for FieldQuantity {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.column() == s)
            .ok_or_else(|| EncodingError::UnknownQuantity { name: s.to_string() })
    }
}

// ============================================================================
// Conductivity Profiles
// ============================================================================

/// One conductivity value per tissue, in [`TissueId::ALL`] order (S/m).
#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conductivities(pub [f64; TISSUE_COUNT]);

impl Conductivities {
    /// Values in design-matrix column order
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Set one tissue's conductivity
    pub fn set(&mut self, tissue: TissueId, value: f64) {
        self.0[tissue.index()] = value;
    }
}

impl Index<TissueId> for Conductivities {
    type Output = f64;

    fn index(&self, tissue: TissueId) -> &f64 {
        &self.0[tissue.index()]
    }
}

/// An identified conductivity profile.
///
/// Sample 0 is the empirically measured reference; samples `1..=N` are
/// design points.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConductivitySample {
    /// Sample id (the `k_id` column)
    pub id: SampleId,
    /// Conductivity per tissue
    pub conductivities: Conductivities,
}

impl ConductivitySample {
    /// Id of the reference profile
    pub const REFERENCE_ID: SampleId = 0;

    /// Create a sample
    #[must_use]
    pub const fn new(id: SampleId, conductivities: Conductivities) -> Self {
        Self { id, conductivities }
    }

    /// Whether this is the measured reference profile
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        self.id == Self::REFERENCE_ID
    }

    /// Label (the `k` column): `reference` or `halton_<id>`
    #[must_use]
    pub fn label(&self) -> String {
        sample_label(self.id)
    }
}

/// Label of a conductivity sample id
#[must_use]
pub fn sample_label(id: SampleId) -> String {
    if id == ConductivitySample::REFERENCE_ID {
        "reference".to_string()
    } else {
        format!("halton_{id}")
    }
}

// ============================================================================
// Extraction Records
// ============================================================================

/// One row of an extraction table: ROI averages for one subject,
/// conductivity sample and placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Subject
    pub sub: SubjectId,
    /// Conductivity sample label
    pub k: String,
    /// Conductivity sample id
    pub k_id: SampleId,
    /// White matter conductivity
    pub k_wm: f64,
    /// Gray matter conductivity
    pub k_gm: f64,
    /// CSF conductivity
    pub k_csf: f64,
    /// Skull conductivity
    pub k_skl: f64,
    /// Soft tissue conductivity
    pub k_sft: f64,
    /// Placement
    pub p: Placement,
    /// Placement id
    pub p_id: u8,
    /// Placement x offset
    pub p_x: i8,
    /// Placement y offset
    pub p_y: i8,
    /// Electric potential
    pub v: f64,
    /// Field magnitude
    pub e: f64,
    /// Field x component
    pub e_x: f64,
    /// Field y component
    pub e_y: f64,
    /// Field z component
    pub e_z: f64,
    /// Radial field component
    pub e_r: f64,
    /// Tangential field component
    pub e_t: f64,
    /// Current density magnitude
    pub j: f64,
    /// Current density x component
    pub j_x: f64,
    /// Current density y component
    pub j_y: f64,
    /// Current density z component
    pub j_z: f64,
    /// Radial current density component
    pub j_r: f64,
    /// Tangential current density component
    pub j_t: f64,
}

impl Record {
    /// Value of one field quantity
    #[must_use]
    pub fn quantity(&self, quantity: FieldQuantity) -> f64 {
        match quantity {
            FieldQuantity::V => self.v,
            FieldQuantity::E => self.e,
            FieldQuantity::Ex => self.e_x,
            FieldQuantity::Ey => self.e_y,
            FieldQuantity::Ez => self.e_z,
            FieldQuantity::Er => self.e_r,
            FieldQuantity::Et => self.e_t,
            FieldQuantity::J => self.j,
            FieldQuantity::Jx => self.j_x,
            FieldQuantity::Jy => self.j_y,
            FieldQuantity::Jz => self.j_z,
            FieldQuantity::Jr => self.j_r,
            FieldQuantity::Jt => self.j_t,
        }
    }

    /// Conductivity profile of this row
    #[must_use]
    pub fn conductivities(&self) -> Conductivities {
        Conductivities([self.k_wm, self.k_gm, self.k_csf, self.k_skl, self.k_sft])
    }

    /// Conductivity sample of this row
    #[must_use]
    pub fn sample(&self) -> ConductivitySample {
        ConductivitySample::new(self.k_id, self.conductivities())
    }

    /// Check the redundant placement columns against `p`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::PlacementMismatch`] on disagreement.
    pub fn check_placement(&self) -> Result<(), EncodingError> {
        self.p.check_columns(self.p_id, (self.p_x, self.p_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_columns_parse() {
        for q in FieldQuantity::ALL {
            assert_eq!(q.column().parse::<FieldQuantity>(), Ok(q));
        }
        assert!("e_q".parse::<FieldQuantity>().is_err());
    }

    #[test]
    fn test_sample_labels() {
        assert_eq!(sample_label(0), "reference");
        assert_eq!(sample_label(7), "halton_7");
        let s = ConductivitySample::new(0, Conductivities::default());
        assert!(s.is_reference());
    }

    #[test]
    fn test_conductivity_index() {
        let mut k = Conductivities([0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(k[TissueId::Csf], 0.3);
        k.set(TissueId::Skl, 0.01);
        assert_eq!(k.as_slice()[3], 0.01);
    }
}
