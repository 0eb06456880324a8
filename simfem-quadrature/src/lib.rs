//! Quadrature rules for simplicial reference domains.
//!
//! The main purpose of this crate is to support the `simfem` FEM library. However, the rules
//! available here can be used completely independently of `simfem`.
//!
//! Rules on simplices are expressed in *barycentric coordinates* and their weights are normalized
//! so that they sum to one. Integrating over a physical simplex therefore amounts to scaling the
//! weighted sum by the measure of the simplex.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod simplex;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(
                    f,
                    "There is no quadrature rule satisfying the requirements available"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A rule whose points are barycentric coordinates of a simplex of runtime dimension.
///
/// Each point has `dim + 1` entries that sum to one.
pub type BarycentricRule = (Vec<f64>, Vec<Vec<f64>>);
