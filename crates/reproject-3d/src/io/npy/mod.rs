mod parser;

pub use parser::*;

use crate::pose::PoseError;

/// Error types for the NPY module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NpyError {
    /// Failed to read NPY file
    #[error("Failed to read NPY file")]
    Io(#[from] std::io::Error),

    /// Malformed NPY header
    #[error("Malformed NPY header")]
    MalformedHeader,

    /// Unsupported dtype
    #[error("Unsupported NPY dtype: {0}")]
    UnsupportedDtype(String),

    /// Fortran-order arrays are not supported
    #[error("Fortran-order NPY arrays are not supported")]
    FortranOrder,

    /// The array does not have the expected shape
    #[error("unexpected array shape {got:?}, expected {expected}")]
    ShapeMismatch {
        /// Human-readable expected shape.
        expected: &'static str,
        /// Shape found in the file.
        got: Vec<usize>,
    },

    /// A pose slice of the array is not a valid rigid transform
    #[error(transparent)]
    InvalidPose(#[from] PoseError),
}
