use crate::error::{Error, Result};
use crate::mesh::{BoundaryFace, SimplexMesh};
use crate::quadrature::{quadrature_rule, QuadratureRule, Topology};
use crate::space::{FunctionSpace, QuadratureField};
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

mod elliptic;
mod mass;
mod source;

pub use elliptic::*;
pub use mass::*;
pub use source::*;

/// Default quadrature order for integrating products of two basis functions of degree `p`.
pub fn default_quadrature_order(degree: usize) -> usize {
    2 * degree + 1
}

/// The cell rule of the given order, or of the default order for the degree of the space.
pub(crate) fn cell_quadrature(space: &FunctionSpace, order: Option<usize>) -> Result<QuadratureRule> {
    let order = order.unwrap_or_else(|| default_quadrature_order(space.degree()));
    quadrature_rule(order, Topology::from_dimension(space.mesh().top_dimension())?)
}

/// Computes local (per-cell) matrices of a bilinear form.
pub trait BilinearIntegrator {
    /// Number of solution components per degree of freedom.
    ///
    /// Local matrices have `solution_dim * ldof` rows. The components belonging to a local basis
    /// function are contiguous.
    fn solution_dim(&self) -> usize {
        1
    }

    /// One local matrix per cell of the space.
    fn assembly_cell_matrix(&self, space: &FunctionSpace) -> Result<Vec<DMatrix<f64>>>;
}

/// Computes local (per-cell) vectors of a linear form.
pub trait LinearIntegrator {
    /// Number of solution components per degree of freedom, see
    /// [`BilinearIntegrator::solution_dim`].
    fn solution_dim(&self) -> usize {
        1
    }

    /// One local vector per cell of the space. Contributions of boundary faces are accumulated
    /// into the vector of their owning cell.
    fn assembly_cell_vector(&self, space: &FunctionSpace) -> Result<Vec<DVector<f64>>>;
}

/// Describes how local element indices map to global indices.
pub trait ElementConnectivityAssembler {
    fn solution_dim(&self) -> usize;

    fn num_elements(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn element_node_count(&self, element_index: usize) -> usize;

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize);
}

pub trait ElementMatrixAssembler: ElementConnectivityAssembler {
    fn assemble_element_matrix_into(&self, element_index: usize, output: &mut DMatrix<f64>) -> Result<()>;
}

pub trait ElementVectorAssembler: ElementConnectivityAssembler {
    fn assemble_element_vector_into(&self, element_index: usize, output: &mut DVector<f64>) -> Result<()>;
}

impl ElementConnectivityAssembler for FunctionSpace {
    fn solution_dim(&self) -> usize {
        1
    }

    fn num_elements(&self) -> usize {
        self.mesh().number_of_cells()
    }

    fn num_nodes(&self) -> usize {
        self.number_of_global_dofs()
    }

    fn element_node_count(&self, _element_index: usize) -> usize {
        self.number_of_local_dofs()
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        output.copy_from_slice(self.cell_dofs(element_index));
    }
}

/// A scalar coefficient of a bilinear form.
#[derive(Debug, Clone, PartialEq)]
pub enum Coefficient {
    Constant(f64),
    /// One value per cell.
    Cell(DVector<f64>),
    /// One value per quadrature point of each cell.
    Quadrature(QuadratureField),
}

impl Default for Coefficient {
    fn default() -> Self {
        Self::Constant(1.0)
    }
}

impl From<f64> for Coefficient {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl Coefficient {
    pub(crate) fn check(&self, num_cells: usize, num_points: usize) -> Result<()> {
        match self {
            Self::Constant(_) => Ok(()),
            Self::Cell(values) if values.len() != num_cells => {
                Err(Error::dimension_mismatch("cell coefficient", num_cells, values.len()))
            }
            Self::Quadrature(field) if field.num_cells() != num_cells => Err(Error::dimension_mismatch(
                "quadrature coefficient cells",
                num_cells,
                field.num_cells(),
            )),
            Self::Quadrature(field) if field.num_points() != num_points => Err(Error::dimension_mismatch(
                "quadrature coefficient points",
                num_points,
                field.num_points(),
            )),
            _ => Ok(()),
        }
    }

    pub fn value(&self, cell: usize, point: usize) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Cell(values) => values[cell],
            Self::Quadrature(field) => field.scalar(cell, point),
        }
    }
}

/// Builds a per-cell coefficient from disjoint subsets of cells, each with its own value.
///
/// Cells not covered by any subset get zero.
pub fn layered_coefficient(num_cells: usize, layers: &[(Vec<usize>, f64)]) -> Result<DVector<f64>> {
    let mut values = DVector::zeros(num_cells);
    let mut covered = vec![false; num_cells];
    for (cells, value) in layers {
        for &cell in cells {
            let is_covered = covered
                .get_mut(cell)
                .ok_or_else(|| Error::config(format!("layer refers to cell {cell}, but there are {num_cells} cells")))?;
            if *is_covered {
                return Err(Error::config(format!("cell {cell} belongs to more than one layer")));
            }
            *is_covered = true;
            values[cell] = *value;
        }
    }
    Ok(values)
}

/// Batch callable on physical points (`n x GD`) returning `n` values.
pub type PointFunction = Arc<dyn Fn(&DMatrix<f64>) -> DVector<f64> + Send + Sync>;

/// Batch callable on barycentric points (`NQ x (TD + 1)`) returning `NC x NQ` values.
pub type BarycentricFunction = Arc<dyn Fn(&DMatrix<f64>) -> DMatrix<f64> + Send + Sync>;

/// A scalar source term of a linear form.
///
/// Sources given as callables are tagged by the coordinates they accept. Barycentric sources are
/// evaluated without mapping quadrature points to physical space.
#[derive(Clone)]
pub enum ScalarSource {
    Constant(f64),
    Cartesian(PointFunction),
    Barycentric(BarycentricFunction),
    /// Precomputed values at the quadrature points of each cell.
    Quadrature(QuadratureField),
}

impl Debug for ScalarSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "Constant({value})"),
            Self::Cartesian(_) => write!(f, "Cartesian(..)"),
            Self::Barycentric(_) => write!(f, "Barycentric(..)"),
            Self::Quadrature(field) => f.debug_tuple("Quadrature").field(field).finish(),
        }
    }
}

impl ScalarSource {
    pub fn cartesian(f: impl Fn(&DMatrix<f64>) -> DVector<f64> + Send + Sync + 'static) -> Self {
        Self::Cartesian(Arc::new(f))
    }

    pub fn barycentric(f: impl Fn(&DMatrix<f64>) -> DMatrix<f64> + Send + Sync + 'static) -> Self {
        Self::Barycentric(Arc::new(f))
    }

    /// Values at the given barycentric points of every cell, as an `NC x NQ` matrix.
    pub fn evaluate(&self, mesh: &SimplexMesh, bcs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let (nc, nq) = (mesh.number_of_cells(), bcs.nrows());
        match self {
            Self::Constant(value) => Ok(DMatrix::from_element(nc, nq, *value)),
            Self::Cartesian(f) => {
                let points = mesh.bc_to_point(bcs);
                let values = f(&points);
                if values.len() != nc * nq {
                    return Err(Error::dimension_mismatch("cartesian source values", nc * nq, values.len()));
                }
                Ok(DMatrix::from_row_slice(nc, nq, values.as_slice()))
            }
            Self::Barycentric(f) => {
                let values = f(bcs);
                if values.shape() != (nc, nq) {
                    return Err(Error::dimension_mismatch(
                        "barycentric source values",
                        nc * nq,
                        values.nrows() * values.ncols(),
                    ));
                }
                Ok(values)
            }
            Self::Quadrature(field) => {
                Coefficient::Quadrature(field.clone()).check(nc, nq)?;
                Ok(DMatrix::from_fn(nc, nq, |c, q| field.scalar(c, q)))
            }
        }
    }
}

/// Batch callable on face points and outward unit normals (both `n x GD`) returning `n` values.
pub type FluxFunction = Arc<dyn Fn(&DMatrix<f64>, &DMatrix<f64>) -> DVector<f64> + Send + Sync>;

/// Batch callable on face barycentric points (`NQ x TD`) of the given faces, returning
/// `NF x NQ` values.
pub type FaceBarycentricFunction = Arc<dyn Fn(&DMatrix<f64>, &[&BoundaryFace]) -> DMatrix<f64> + Send + Sync>;

/// Boundary flux data `g_N` of a Neumann condition.
#[derive(Clone)]
pub enum NeumannSource {
    Constant(f64),
    Cartesian(FluxFunction),
    Barycentric(FaceBarycentricFunction),
}

impl Debug for NeumannSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "Constant({value})"),
            Self::Cartesian(_) => write!(f, "Cartesian(..)"),
            Self::Barycentric(_) => write!(f, "Barycentric(..)"),
        }
    }
}

impl NeumannSource {
    pub fn cartesian(f: impl Fn(&DMatrix<f64>, &DMatrix<f64>) -> DVector<f64> + Send + Sync + 'static) -> Self {
        Self::Cartesian(Arc::new(f))
    }

    pub fn barycentric(f: impl Fn(&DMatrix<f64>, &[&BoundaryFace]) -> DMatrix<f64> + Send + Sync + 'static) -> Self {
        Self::Barycentric(Arc::new(f))
    }
}
