//! BrainWeb tDCS Core - domain types and the static study registry
//!
//! This crate holds the vocabulary shared by every stage of the tDCS
//! conductivity study: the modelled tissues and their conductivity priors,
//! the regions of interest and electrode montages, electrode placements,
//! and the rows of the extraction tables.
//!
//! # Modules
//!
//! - [`tissue`]: Tissue priors (fixed, in design-matrix order)
//! - [`study`]: Regions of interest and experiments
//! - [`placement`]: Explicit anode placement encoding
//! - [`types`]: Field quantities, conductivity samples, table records
//! - [`error`]: Configuration and encoding errors
//!
//! # Example
//!
//! ```rust
//! use brainweb_tdcs_core::{experiments_for_roi, Placement, TISSUES};
//!
//! let mc: Vec<_> = experiments_for_roi("MC").collect();
//! assert_eq!(mc[0].surrogate_file_name(), "roi-MC_anode-C3_cathode-C4_gpr.csv");
//!
//! assert_eq!(Placement::from_electrode("C3", "C3P"), Ok(Placement::Posterior));
//! assert!(TISSUES.iter().all(|t| t.validate().is_ok()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod placement;
pub mod study;
pub mod tissue;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, EncodingError};
pub use placement::Placement;
pub use study::{
    experiments_for_roi, find_experiment, find_roi, Experiment, RegionOfInterest, EXPERIMENTS,
    EXPERIMENTS_DIR, ROIS, ROIS_DIR,
};
pub use tissue::{tissue, Tissue, TissueId, TISSUES, TISSUE_COUNT};
pub use types::{
    sample_label, Conductivities, ConductivitySample, FieldQuantity, Record, SampleId, SubjectId,
};
