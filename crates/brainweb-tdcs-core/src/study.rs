//! Static study registry: regions of interest and electrode montages
//!
//! Every unit of work in the study is one (ROI, anode, cathode) experiment.
//! The registry is immutable and shared freely across workers.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ConfigError;
use crate::placement::Placement;

/// Subdirectory of the data directory holding per-ROI tables
pub const ROIS_DIR: &str = "rois";

/// Subdirectory of the data directory holding per-experiment tables
pub const EXPERIMENTS_DIR: &str = "experiments";

/// Target brain area.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RegionOfInterest {
    /// Short name used in file names (`MC`, `dlPFC`, ...)
    pub name: &'static str,
    /// Anatomical name
    pub long_name: &'static str,
}

impl RegionOfInterest {
    /// File name of the ROI table
    #[must_use]
    pub fn data_file_name(&self) -> String {
        format!("roi-{}.csv", self.name)
    }

    /// Location of the ROI table under `data_dir`
    #[must_use]
    pub fn data_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(ROIS_DIR).join(self.data_file_name())
    }
}

impl fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Regions of interest of the study.
pub static ROIS: [RegionOfInterest; 4] = [
    RegionOfInterest { name: "MC", long_name: "Motor cortex" },
    RegionOfInterest { name: "dlPFC", long_name: "Dorsolateral prefrontal cortex" },
    RegionOfInterest { name: "vmPFC", long_name: "Ventromedial prefrontal cortex" },
    RegionOfInterest { name: "IPS", long_name: "Intraparietal sulcus" },
];

/// Look up a region of interest by its short name.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownRoi`] if the name is not registered.
pub fn find_roi(name: &str) -> Result<&'static RegionOfInterest, ConfigError> {
    ROIS.iter()
        .find(|roi| roi.name == name)
        .ok_or_else(|| ConfigError::UnknownRoi { name: name.to_string() })
}

/// One stimulation montage targeting one ROI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Experiment {
    /// Targeted region
    pub roi: &'static RegionOfInterest,
    /// Nominal anode (10-20 label)
    pub anode: Cow<'static, str>,
    /// Cathode (10-20 label)
    pub cathode: Cow<'static, str>,
    /// Whether the cathode is placed over the opposite hemisphere
    pub bipolar: bool,
}

impl Experiment {
    const fn registered(
        roi: &'static RegionOfInterest,
        anode: &'static str,
        cathode: &'static str,
        bipolar: bool,
    ) -> Self {
        Self {
            roi,
            anode: Cow::Borrowed(anode),
            cathode: Cow::Borrowed(cathode),
            bipolar,
        }
    }

    /// Build an experiment from run parameters.
    ///
    /// Registered montages keep their registry metadata; other electrode
    /// pairs are accepted as bipolar montages on a registered ROI.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRoi`] for an unregistered ROI and
    /// [`ConfigError::InvalidParameter`] for empty electrode labels.
    pub fn from_parts(roi: &str, anode: &str, cathode: &str) -> Result<Self, ConfigError> {
        let roi = find_roi(roi)?;
        for (parameter, label) in [("anode", anode), ("cathode", cathode)] {
            if label.trim().is_empty() {
                return Err(ConfigError::InvalidParameter {
                    parameter,
                    reason: "electrode label is empty".to_string(),
                });
            }
        }

        if let Some(known) = find_experiment(roi.name, anode, cathode) {
            return Ok(known.clone());
        }

        Ok(Self {
            roi,
            anode: Cow::Owned(anode.to_string()),
            cathode: Cow::Owned(cathode.to_string()),
            bipolar: true,
        })
    }

    /// `anode-cathode`
    #[must_use]
    pub fn montage(&self) -> String {
        format!("{}-{}", self.anode, self.cathode)
    }

    /// File name of the measured dataset
    #[must_use]
    pub fn data_file_name(&self) -> String {
        format!(
            "roi-{}_anode-{}_cathode-{}.csv",
            self.roi.name, self.anode, self.cathode
        )
    }

    /// File name of the surrogate-generated dataset for the same key
    #[must_use]
    pub fn surrogate_file_name(&self) -> String {
        format!(
            "roi-{}_anode-{}_cathode-{}_gpr.csv",
            self.roi.name, self.anode, self.cathode
        )
    }

    /// Location of the measured dataset under `data_dir`
    #[must_use]
    pub fn data_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(EXPERIMENTS_DIR).join(self.data_file_name())
    }

    /// Location of the surrogate dataset, next to the measured one
    #[must_use]
    pub fn surrogate_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(EXPERIMENTS_DIR).join(self.surrogate_file_name())
    }

    /// Electrode names of every anode placement, in placement order
    #[must_use]
    pub fn electrodes(&self) -> Vec<(Placement, String)> {
        Placement::ALL.into_iter().map(|p| (p, p.electrode(&self.anode))).collect()
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.roi, self.montage())
    }
}

/// Experiments of the study.
pub static EXPERIMENTS: [Experiment; 6] = [
    Experiment::registered(&ROIS[0], "C3", "C4", true),
    Experiment::registered(&ROIS[0], "C3", "Fp2", false),
    Experiment::registered(&ROIS[1], "F3", "F4", true),
    Experiment::registered(&ROIS[1], "F3", "Fp2", false),
    Experiment::registered(&ROIS[2], "F7", "F8", true),
    Experiment::registered(&ROIS[3], "P3", "P4", true),
];

/// Experiments targeting `roi`, in registry order
pub fn experiments_for_roi(roi: &str) -> impl Iterator<Item = &'static Experiment> + '_ {
    EXPERIMENTS.iter().filter(move |e| e.roi.name == roi)
}

/// Registered experiment for an (ROI, anode, cathode) key
#[must_use]
pub fn find_experiment(roi: &str, anode: &str, cathode: &str) -> Option<&'static Experiment> {
    EXPERIMENTS
        .iter()
        .find(|e| e.roi.name == roi && e.anode == anode && e.cathode == cathode)
}
