//! Finite element spaces on simplicial meshes and functions living in them.
use crate::basis::{lagrange_to_bernstein, BasisKind, BasisTable, ReferenceBasis};
use crate::error::{Error, Result};
use crate::mesh::{BoundaryFace, SimplexMesh};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod dof;

pub use dof::DofMap;

/// Whether degrees of freedom are shared across cells.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpaceType {
    #[default]
    Continuous,
    Discontinuous,
}

/// Layout of the coefficients of a vector-valued function.
///
/// With `n` scalar degrees of freedom and `s` components:
///
/// - `ComponentMajor`: all degrees of freedom of component 0, then of component 1, etc.
///   Entry `k * n + i` holds component `k` of degree of freedom `i`.
/// - `NodeMajor`: the components of each degree of freedom are contiguous.
///   Entry `i * s + k` holds component `k` of degree of freedom `i`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DofOrdering {
    #[default]
    ComponentMajor,
    NodeMajor,
}

impl DofOrdering {
    pub fn global_index(&self, dof: usize, component: usize, num_components: usize, num_dofs: usize) -> usize {
        match self {
            Self::ComponentMajor => component * num_dofs + dof,
            Self::NodeMajor => dof * num_components + component,
        }
    }
}

/// A set of boundary degrees of freedom, either as a mask or as a list of indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryIndex {
    Mask(Vec<bool>),
    Indices(Vec<usize>),
}

impl BoundaryIndex {
    /// Normalizes to a mask of length `len`.
    pub fn to_mask(&self, len: usize) -> Result<Vec<bool>> {
        match self {
            Self::Mask(mask) => {
                if mask.len() != len {
                    return Err(Error::dimension_mismatch("boundary mask", len, mask.len()));
                }
                Ok(mask.clone())
            }
            Self::Indices(indices) => {
                let mut mask = vec![false; len];
                for &index in indices {
                    *mask
                        .get_mut(index)
                        .ok_or(Error::InvalidBoundaryIndex { index, len })? = true;
                }
                Ok(mask)
            }
        }
    }
}

impl From<Vec<bool>> for BoundaryIndex {
    fn from(mask: Vec<bool>) -> Self {
        Self::Mask(mask)
    }
}

impl From<Vec<usize>> for BoundaryIndex {
    fn from(indices: Vec<usize>) -> Self {
        Self::Indices(indices)
    }
}

/// Values of a quantity with a fixed number of components at each quadrature point of each cell.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureField {
    num_cells: usize,
    num_points: usize,
    num_components: usize,
    data: Vec<f64>,
}

impl QuadratureField {
    pub fn zeros(num_cells: usize, num_points: usize, num_components: usize) -> Self {
        Self {
            num_cells,
            num_points,
            num_components,
            data: vec![0.0; num_cells * num_points * num_components],
        }
    }

    /// A scalar field from an `NC x NQ` matrix.
    pub fn from_scalar_matrix(values: &DMatrix<f64>) -> Self {
        let mut field = Self::zeros(values.nrows(), values.ncols(), 1);
        for c in 0..values.nrows() {
            for q in 0..values.ncols() {
                field.get_mut(c, q)[0] = values[(c, q)];
            }
        }
        field
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn get(&self, cell: usize, point: usize) -> &[f64] {
        let offset = (cell * self.num_points + point) * self.num_components;
        &self.data[offset..offset + self.num_components]
    }

    pub fn get_mut(&mut self, cell: usize, point: usize) -> &mut [f64] {
        let offset = (cell * self.num_points + point) * self.num_components;
        &mut self.data[offset..offset + self.num_components]
    }

    /// First component at the given point, for scalar fields.
    pub fn scalar(&self, cell: usize, point: usize) -> f64 {
        self.get(cell, point)[0]
    }

    /// The components at a point arranged as a row-major `rows x (N / rows)` matrix.
    pub fn matrix(&self, cell: usize, point: usize, rows: usize) -> DMatrix<f64> {
        let cols = self.num_components / rows;
        DMatrix::from_row_slice(rows, cols, self.get(cell, point))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Per-cell average of the first component.
    pub fn cell_averages(&self) -> Vec<f64> {
        (0..self.num_cells)
            .map(|c| (0..self.num_points).map(|q| self.scalar(c, q)).sum::<f64>() / self.num_points.max(1) as f64)
            .collect()
    }
}

/// The coefficient vector of a (possibly vector-valued) function in a finite element space.
#[derive(Debug, Clone, PartialEq)]
pub struct FeFunction {
    coefficients: DVector<f64>,
    num_components: usize,
    ordering: DofOrdering,
}

impl FeFunction {
    pub fn new(coefficients: DVector<f64>, num_components: usize, ordering: DofOrdering) -> Result<Self> {
        if num_components == 0 || coefficients.len() % num_components != 0 {
            return Err(Error::dimension_mismatch(
                "function coefficients",
                num_components,
                coefficients.len(),
            ));
        }
        Ok(Self {
            coefficients,
            num_components,
            ordering,
        })
    }

    pub fn zeros(num_dofs: usize, num_components: usize, ordering: DofOrdering) -> Self {
        Self {
            coefficients: DVector::zeros(num_dofs * num_components),
            num_components,
            ordering,
        }
    }

    pub fn scalar(coefficients: DVector<f64>) -> Self {
        Self {
            coefficients,
            num_components: 1,
            ordering: DofOrdering::default(),
        }
    }

    pub fn coefficients(&self) -> &DVector<f64> {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut DVector<f64> {
        &mut self.coefficients
    }

    pub fn into_coefficients(self) -> DVector<f64> {
        self.coefficients
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn ordering(&self) -> DofOrdering {
        self.ordering
    }

    /// Number of scalar degrees of freedom per component.
    pub fn num_dofs(&self) -> usize {
        self.coefficients.len() / self.num_components
    }

    pub fn component_value(&self, dof: usize, component: usize) -> f64 {
        let index = self
            .ordering
            .global_index(dof, component, self.num_components, self.num_dofs());
        self.coefficients[index]
    }

    /// All values of one component.
    pub fn component(&self, component: usize) -> DVector<f64> {
        DVector::from_fn(self.num_dofs(), |i, _| self.component_value(i, component))
    }

    /// The same function with coefficients stored in the given ordering.
    pub fn to_ordering(&self, ordering: DofOrdering) -> Self {
        let (n, s) = (self.num_dofs(), self.num_components);
        let mut coefficients = DVector::zeros(n * s);
        for i in 0..n {
            for k in 0..s {
                coefficients[ordering.global_index(i, k, s, n)] = self.component_value(i, k);
            }
        }
        Self {
            coefficients,
            num_components: s,
            ordering,
        }
    }
}

/// A finite element space over a simplicial mesh.
///
/// Associates a mesh with a local basis of a given family and degree and a numbering of the
/// global degrees of freedom. Immutable after construction.
#[derive(Debug, Clone)]
pub struct FunctionSpace {
    mesh: Arc<SimplexMesh>,
    basis: ReferenceBasis,
    space_type: SpaceType,
    dof_map: DofMap,
}

impl FunctionSpace {
    /// Creates a space of the given basis family and degree.
    ///
    /// # Errors
    ///
    /// Continuous spaces require degree at least one.
    pub fn new(mesh: Arc<SimplexMesh>, degree: usize, space_type: SpaceType, kind: BasisKind) -> Result<Self> {
        let basis = ReferenceBasis::new(kind, degree, mesh.top_dimension());
        let dof_map = match space_type {
            SpaceType::Continuous if degree == 0 => {
                return Err(Error::config("continuous spaces require degree at least 1"))
            }
            SpaceType::Continuous => DofMap::continuous(&mesh, basis.multi_index()),
            SpaceType::Discontinuous => DofMap::discontinuous(&mesh, basis.number_of_basis()),
        };
        Ok(Self {
            mesh,
            basis,
            space_type,
            dof_map,
        })
    }

    /// Continuous Lagrange space of the given degree.
    pub fn lagrange(mesh: Arc<SimplexMesh>, degree: usize) -> Result<Self> {
        Self::new(mesh, degree, SpaceType::Continuous, BasisKind::Lagrange)
    }

    pub fn mesh(&self) -> &Arc<SimplexMesh> {
        &self.mesh
    }

    pub fn degree(&self) -> usize {
        self.basis.degree()
    }

    pub fn space_type(&self) -> SpaceType {
        self.space_type
    }

    pub fn basis_kind(&self) -> BasisKind {
        self.basis.kind()
    }

    pub fn reference_basis(&self) -> &ReferenceBasis {
        &self.basis
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn number_of_global_dofs(&self) -> usize {
        self.dof_map.number_of_global_dofs()
    }

    pub fn number_of_local_dofs(&self) -> usize {
        self.dof_map.number_of_local_dofs()
    }

    /// Flat `NC x ldof` array of global degree of freedom indices.
    pub fn cell_to_dof(&self) -> &[usize] {
        self.dof_map.cell_to_dof()
    }

    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        self.dof_map.cell_dofs(cell)
    }

    /// Local indices of the basis functions of the owning cell that do not vanish on the face.
    pub fn face_local_dofs(&self, face: &BoundaryFace) -> Vec<usize> {
        self.basis
            .multi_index()
            .iter()
            .enumerate()
            .filter(|(_, alpha)| alpha[face.local_index] == 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Global degrees of freedom on a boundary face.
    pub fn face_to_dof(&self, face: &BoundaryFace) -> Vec<usize> {
        let cell_dofs = self.cell_dofs(face.cell);
        self.face_local_dofs(face)
            .into_iter()
            .map(|i| cell_dofs[i])
            .collect()
    }

    /// Flags degrees of freedom on boundary faces.
    ///
    /// When `threshold` is given, only faces whose barycenter satisfies it are considered.
    pub fn is_boundary_dof(&self, threshold: Option<&dyn Fn(&[f64]) -> bool>) -> Vec<bool> {
        let mut flag = vec![false; self.number_of_global_dofs()];
        for face in self.mesh.boundary_faces() {
            if let Some(threshold) = threshold {
                if !threshold(self.mesh.face_barycenter(face).as_slice()) {
                    continue;
                }
            }
            for dof in self.face_to_dof(face) {
                flag[dof] = true;
            }
        }
        flag
    }

    /// Physical coordinates associated with each global degree of freedom (`gdof x GD`).
    ///
    /// These are the lattice points of the cells, which are the nodes of the Lagrange basis.
    pub fn interpolation_points(&self) -> DMatrix<f64> {
        let lattice = self.basis.lattice_points();
        let mut points = DMatrix::zeros(self.number_of_global_dofs(), self.mesh.geo_dimension());
        for c in 0..self.mesh.number_of_cells() {
            for (i, &dof) in self.cell_dofs(c).iter().enumerate() {
                let bc: Vec<f64> = lattice.row(i).iter().copied().collect();
                let x = self.mesh.cell_point(c, &bc);
                points.row_mut(dof).copy_from(&x.transpose());
            }
        }
        points
    }

    /// Interpolates a scalar function given as a batch callable on points (`n x GD`).
    pub fn interpolate(&self, f: impl Fn(&DMatrix<f64>) -> DVector<f64>) -> Result<DVector<f64>> {
        let points = self.interpolation_points();
        let nodal = f(&points);
        if nodal.len() != points.nrows() {
            return Err(Error::dimension_mismatch("interpolated values", points.nrows(), nodal.len()));
        }
        match self.basis.kind() {
            BasisKind::Lagrange => Ok(nodal),
            BasisKind::Bernstein => {
                let transform = lagrange_to_bernstein(self.degree(), self.mesh.top_dimension())?;
                let mut coefficients = DVector::zeros(nodal.len());
                for c in 0..self.mesh.number_of_cells() {
                    let dofs = self.cell_dofs(c);
                    let local = DVector::from_iterator(dofs.len(), dofs.iter().map(|&i| nodal[i]));
                    let local_coefficients = &transform * local;
                    for (&i, value) in dofs.iter().zip(local_coefficients.iter()) {
                        coefficients[i] = *value;
                    }
                }
                Ok(coefficients)
            }
        }
    }

    /// Basis values, shape `(NQ, 1, ldof)`.
    pub fn basis(&self, bcs: &DMatrix<f64>) -> Result<BasisTable> {
        self.basis.basis(bcs)
    }

    /// Physical basis gradients, shape `(NQ, NC, ldof, GD)`.
    pub fn grad_basis(&self, bcs: &DMatrix<f64>) -> Result<BasisTable> {
        self.basis.grad_basis(bcs, &self.mesh)
    }

    /// Higher order derivatives, see [`ReferenceBasis::grad_m_basis`].
    pub fn grad_m_basis(&self, bcs: &DMatrix<f64>, m: usize) -> Result<BasisTable> {
        self.basis.grad_m_basis(bcs, &self.mesh, m)
    }

    fn check_function(&self, uh: &FeFunction) -> Result<()> {
        if uh.num_dofs() != self.number_of_global_dofs() {
            return Err(Error::dimension_mismatch(
                "function in space",
                self.number_of_global_dofs(),
                uh.num_dofs(),
            ));
        }
        Ok(())
    }

    /// Evaluates a function at the given barycentric points of every cell.
    ///
    /// The result has one component per component of `uh`.
    pub fn value(&self, uh: &FeFunction, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.check_function(uh)?;
        let phi = self.basis.values(bcs)?;
        let (nc, nq, s) = (self.mesh.number_of_cells(), bcs.nrows(), uh.num_components());
        let mut field = QuadratureField::zeros(nc, nq, s);
        for c in 0..nc {
            let dofs = self.cell_dofs(c);
            for q in 0..nq {
                let values = field.get_mut(c, q);
                for (i, &dof) in dofs.iter().enumerate() {
                    for (k, value) in values.iter_mut().enumerate() {
                        *value += phi[(q, i)] * uh.component_value(dof, k);
                    }
                }
            }
        }
        Ok(field)
    }

    /// Evaluates the gradient of a function at the given barycentric points of every cell.
    ///
    /// The result has `s * GD` components per point, storing the `s x GD` Jacobian row by row.
    pub fn grad_value(&self, uh: &FeFunction, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.check_function(uh)?;
        let derivatives = self.basis.barycentric_derivatives(bcs)?;
        let (nc, nq, s) = (self.mesh.number_of_cells(), bcs.nrows(), uh.num_components());
        let gd = self.mesh.geo_dimension();
        let mut field = QuadratureField::zeros(nc, nq, s * gd);
        for c in 0..nc {
            let dofs = self.cell_dofs(c);
            let grad_lambda = self.mesh.grad_lambda(c);
            for (q, r) in derivatives.iter().enumerate() {
                let grad_phi = r * grad_lambda;
                let values = field.get_mut(c, q);
                for (i, &dof) in dofs.iter().enumerate() {
                    for k in 0..s {
                        let u = uh.component_value(dof, k);
                        for j in 0..gd {
                            values[k * gd + j] += u * grad_phi[(i, j)];
                        }
                    }
                }
            }
        }
        Ok(field)
    }

    /// A zero function with the given number of components.
    pub fn function(&self, num_components: usize, ordering: DofOrdering) -> FeFunction {
        FeFunction::zeros(self.number_of_global_dofs(), num_components, ordering)
    }
}
