//! Surrogate pipeline error types
//!
//! Error types for the regression and the pipeline stages using `thiserror`.
//! Every [`SurrogateError`] maps onto an [`ErrorKind`] so that the batch
//! orchestrator can tell transient I/O apart from data or configuration
//! problems that will fail again on retry.

use std::fmt;
use std::path::PathBuf;

use brainweb_tdcs_core::{ConfigError, FieldQuantity, Placement, SampleId, SubjectId};
use thiserror::Error;

/// Key of one record in the (sample, placement, subject) cube
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Conductivity sample id
    pub sample: SampleId,
    /// Placement
    pub placement: Placement,
    /// Subject
    pub subject: SubjectId,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(sample {}, placement {}, subject {})",
            self.sample, self.placement, self.subject
        )
    }
}

/// Gaussian process regression error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegressionError {
    /// No training rows
    #[error("Training set is empty")]
    EmptyTrainingSet,

    /// Input and output row counts disagree
    #[error("Shape mismatch: {inputs} input rows vs {outputs} output rows")]
    RowMismatch {
        /// Rows of the design matrix
        inputs: usize,
        /// Rows of the output matrix
        outputs: usize,
    },

    /// Prediction inputs have the wrong number of columns
    #[error("Prediction input has {got} columns, model was fit on {expected}")]
    DimensionMismatch {
        /// Columns at fit time
        expected: usize,
        /// Columns supplied
        got: usize,
    },

    /// Training data contains NaN or infinity
    #[error("Training data contains non-finite values")]
    NonFiniteTrainingData,

    /// Kernel matrix is not positive definite
    #[error("Cholesky factorization failed (kernel not positive definite at {theta:?})")]
    CholeskyFailed {
        /// Log hyperparameters at which factorization failed
        theta: Vec<f64>,
    },

    /// No optimizer start reached a finite log marginal likelihood
    #[error("No finite log marginal likelihood in {starts} optimizer starts")]
    NoFiniteOptimum {
        /// Number of starts attempted
        starts: usize,
    },

    /// Prediction produced NaN or infinity
    #[error("Non-finite prediction at row {row}, column {column}")]
    NonFinitePrediction {
        /// Prediction row
        row: usize,
        /// Output column
        column: usize,
    },
}

/// Classification of a pipeline failure
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Degenerate tissue configuration or invalid run parameters
    Configuration,
    /// Missing or duplicated records in the input table
    DataConsistency,
    /// Regression did not produce a usable model
    Numerical,
    /// Missing or malformed input file
    InputFormat,
    /// Transient I/O failure while writing results
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::DataConsistency => "data-consistency",
            Self::Numerical => "numerical",
            Self::InputFormat => "input-format",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// Pipeline error types
#[derive(Error, Debug)]
pub enum SurrogateError {
    /// Fixed configuration or run parameters are invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A (sample, placement, subject) triple appears more than once
    #[error("Duplicate record for {key}")]
    DuplicateRecord {
        /// Offending key
        key: RecordKey,
    },

    /// A (sample, placement, subject) triple is absent
    #[error("Missing record for {key}")]
    MissingRecord {
        /// Offending key
        key: RecordKey,
    },

    /// Sample ids do not form `0..N`
    #[error("Conductivity sample ids are not contiguous from 0: sample {missing} is absent")]
    NonContiguousSamples {
        /// First absent id
        missing: SampleId,
    },

    /// Input table has no rows
    #[error("Input table contains no records")]
    EmptyTable,

    /// A prediction matrix does not match the column layout
    #[error("Prediction for {quantity} has shape {got:?}, expected {expected:?}")]
    LayoutMismatch {
        /// Quantity whose predictions were rejected
        quantity: FieldQuantity,
        /// Expected (rows, columns)
        expected: (usize, usize),
        /// Supplied (rows, columns)
        got: (usize, usize),
    },

    /// Regression failed for one quantity
    #[error("Regression of {quantity} failed: {source}")]
    Regression {
        /// Quantity being regressed
        quantity: FieldQuantity,
        /// Underlying failure
        #[source]
        source: RegressionError,
    },

    /// Input table is missing or malformed
    #[error("Malformed input {}{}: {reason}", path.display(), line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    InputFormat {
        /// Table path
        path: PathBuf,
        /// 1-based line, when known
        line: Option<u64>,
        /// What went wrong
        reason: String,
    },

    /// Writing results failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being written
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
}

impl SurrogateError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::DuplicateRecord { .. }
            | Self::MissingRecord { .. }
            | Self::NonContiguousSamples { .. }
            | Self::EmptyTable
            | Self::LayoutMismatch { .. } => ErrorKind::DataConsistency,
            Self::Regression { .. } => ErrorKind::Numerical,
            Self::InputFormat { .. } => ErrorKind::InputFormat,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether re-running the same unit of work may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}

/// Result type for pipeline operations
pub type SurrogateResult<T> = Result<T, SurrogateError>;

/// Result type for regression operations
pub type RegressionResult<T> = Result<T, RegressionError>;
