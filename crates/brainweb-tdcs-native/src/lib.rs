//! BrainWeb tDCS Native - conductivity surrogate pipeline
//!
//! This crate turns an extraction table of ROI-averaged field quantities
//! into a surrogate table evaluated on a quasi-random conductivity design:
//! - Truncated-normal conductivity priors per tissue
//! - Halton design and CDF-inversion resampling
//! - Multi-output Gaussian process regression (Matérn 5/2, ARD)
//! - Table reshaping and `;`-separated table I/O
//!
//! # Modules
//!
//! - [`surrogate`]: Pipeline stages, leaf-first
//! - [`pipeline`]: Stage orchestration with per-quantity failure isolation
//! - [`table`]: Extraction and surrogate tables
//! - [`config`]: Run configuration
//! - [`error`]: Error types and their classification
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use brainweb_tdcs_core::{find_experiment, TISSUES};
//! use brainweb_tdcs_native::{table, SurrogateConfig, SurrogatePipeline};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let experiment = find_experiment("MC", "C3", "C4").ok_or("unregistered")?;
//! let data_dir = Path::new("data");
//! let records = table::read_records(experiment.data_path(data_dir))?;
//!
//! let pipeline = SurrogatePipeline::new(SurrogateConfig::default(), &TISSUES)?;
//! let run = pipeline.run(&records)?;
//! table::write_surrogate_records(experiment.surrogate_path(data_dir), &run)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod surrogate;
pub mod table;

// Re-export key types
pub use config::SurrogateConfig;
pub use error::{ErrorKind, RecordKey, RegressionError, SurrogateError, SurrogateResult};
pub use pipeline::{SurrogatePipeline, SurrogateRun};
pub use surrogate::{GaussianProcess, GprConfig, SurrogateRecord};
