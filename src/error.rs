//! Error types shared by the library.

/// Library-wide error type.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A configuration value is missing, malformed or inconsistent.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A constitutive model tag did not name any known model.
    #[error("unknown model type `{0}`")]
    UnknownModel(String),
    /// Material parameters were supplied in an unsupported combination.
    #[error("invalid material parameters: {0}")]
    InvalidMaterialParameters(String),
    /// A linear system could not be solved.
    #[error("linear system is singular or not positive definite: {0}")]
    SingularSystem(String),
    /// A capability is not available for a particular variant.
    #[error("{capability} is not implemented for {variant}")]
    NotImplemented {
        capability: &'static str,
        variant: &'static str,
    },
    /// An operation does not support the given spatial dimension.
    #[error("{operation} does not support dimension {dim}")]
    UnsupportedDimension { operation: &'static str, dim: usize },
    /// Two collaborating objects have incompatible shapes.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A boundary index set referred to entries outside the index space.
    #[error("boundary index {index} is out of bounds for {len} degrees of freedom")]
    InvalidBoundaryIndex { index: usize, len: usize },
    /// A constrained row lacks a stored diagonal entry.
    #[error("row {0} has no stored diagonal entry")]
    MissingDiagonal(usize),
    /// No quadrature rule is available for the request.
    #[error("no quadrature rule of order {order} available for dimension {dim}")]
    Quadrature { order: usize, dim: usize },
    /// Invalid mesh data.
    #[error("invalid mesh: {0}")]
    Mesh(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn dimension_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }
}
