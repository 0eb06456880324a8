//! Quadrature rules in barycentric coordinates.
use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Errors returned by the underlying rule tables.
pub use simfem_quadrature::Error as QuadratureError;

/// The reference domain of a quadrature rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    Point,
    Interval,
    Triangle,
    Tetrahedron,
}

impl Topology {
    /// The simplex of the given topological dimension.
    pub fn from_dimension(dim: usize) -> Result<Self> {
        match dim {
            0 => Ok(Self::Point),
            1 => Ok(Self::Interval),
            2 => Ok(Self::Triangle),
            3 => Ok(Self::Tetrahedron),
            _ => Err(Error::UnsupportedDimension {
                operation: "quadrature",
                dim,
            }),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::Point => 0,
            Self::Interval => 1,
            Self::Triangle => 2,
            Self::Tetrahedron => 3,
        }
    }
}

/// A quadrature rule whose points are barycentric coordinates.
///
/// Weights sum to one, so that integrals over a physical cell are obtained by scaling with
/// the cell measure.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    weights: DVector<f64>,
    bcs: DMatrix<f64>,
}

impl QuadratureRule {
    /// Creates a rule from weights and barycentric points (`NQ x (TD + 1)`).
    pub fn from_weights_and_points(weights: DVector<f64>, bcs: DMatrix<f64>) -> Result<Self> {
        if weights.len() != bcs.nrows() {
            return Err(Error::dimension_mismatch(
                "quadrature rule points",
                weights.len(),
                bcs.nrows(),
            ));
        }
        Ok(Self { weights, bcs })
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Barycentric coordinates of the points, one row per point.
    pub fn bcs(&self) -> &DMatrix<f64> {
        &self.bcs
    }

    pub fn number_of_points(&self) -> usize {
        self.weights.len()
    }

    /// Lifts a rule on a face into a rule on the cell by inserting a zero barycentric coordinate
    /// at position `opposite`.
    pub fn lift_to_cell_face(&self, opposite: usize) -> DMatrix<f64> {
        self.bcs.clone().insert_column(opposite, 0.0)
    }
}

/// Provides quadrature rules by polynomial order and reference domain.
pub trait QuadratureProvider {
    /// A rule that integrates polynomials of degree `order` exactly on `topology`.
    fn rule(&self, order: usize, topology: Topology) -> Result<QuadratureRule>;
}

/// Collapsed Gauss-Legendre rules for all simplices.
#[derive(Debug, Copy, Clone, Default)]
pub struct GaussSimplexQuadrature;

impl QuadratureProvider for GaussSimplexQuadrature {
    fn rule(&self, order: usize, topology: Topology) -> Result<QuadratureRule> {
        let dim = topology.dimension();
        let (weights, points) =
            simfem_quadrature::simplex::simplex_rule(dim, order).map_err(|_| Error::Quadrature { order, dim })?;
        let bcs = DMatrix::from_fn(points.len(), dim + 1, |q, k| points[q][k]);
        QuadratureRule::from_weights_and_points(DVector::from_vec(weights), bcs)
    }
}

/// Shorthand for a rule from the default provider.
pub fn quadrature_rule(order: usize, topology: Topology) -> Result<QuadratureRule> {
    GaussSimplexQuadrature.rule(order, topology)
}
