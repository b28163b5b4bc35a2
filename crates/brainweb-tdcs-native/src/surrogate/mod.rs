//! Surrogate modelling stages
//!
//! Leaf-first: priors ([`distribution`]), quasi-random levels ([`design`]),
//! CDF inversion ([`resample`]), training tensors ([`tensor`]), Gaussian
//! process regression ([`kernel`], [`optimizer`], [`gpr`]) and
//! [`reassemble`].

pub mod design;
pub mod distribution;
pub mod gpr;
pub mod kernel;
pub mod optimizer;
pub mod reassemble;
pub mod resample;
pub mod tensor;

pub use design::HaltonDesign;
pub use distribution::ConductivityPrior;
pub use gpr::{GaussianProcess, GprConfig};
pub use kernel::MaternKernel;
pub use optimizer::{minimize, LbfgsConfig, Minimum};
pub use reassemble::{reassemble, SurrogateRecord};
pub use resample::{ConductivityResampler, InversionGrid};
pub use tensor::{build_training_set, ColumnLayout, TrainingSet};
