use crate::assembly::global::apply_dirichlet_bc_csr;
use crate::error::{Error, Result};
use crate::space::{BoundaryIndex, DofOrdering, FunctionSpace};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Dirichlet conditions on a subset of the unknowns of a linear system.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletBc {
    is_constrained: Vec<bool>,
    values: DVector<f64>,
}

impl DirichletBc {
    /// Conditions from a mask and a full-length vector of prescribed values.
    ///
    /// Values at unconstrained entries are ignored.
    pub fn new(is_constrained: Vec<bool>, values: DVector<f64>) -> Result<Self> {
        if is_constrained.len() != values.len() {
            return Err(Error::dimension_mismatch(
                "dirichlet values",
                is_constrained.len(),
                values.len(),
            ));
        }
        Ok(Self { is_constrained, values })
    }

    /// No constrained entries in a system of the given size.
    pub fn unconstrained(len: usize) -> Self {
        Self {
            is_constrained: vec![false; len],
            values: DVector::zeros(len),
        }
    }

    /// Conditions on the given degrees of freedom of a scalar space, with values obtained by
    /// interpolating `g` into the space.
    pub fn from_function(
        space: &FunctionSpace,
        boundary: &BoundaryIndex,
        g: impl Fn(&DMatrix<f64>) -> DVector<f64>,
    ) -> Result<Self> {
        let is_constrained = boundary.to_mask(space.number_of_global_dofs())?;
        let values = space.interpolate(g)?;
        Self::new(is_constrained, values)
    }

    /// Conditions on the degrees of freedom of boundary faces whose barycenter satisfies
    /// `threshold`, or on the whole boundary if none is given.
    pub fn on_boundary(
        space: &FunctionSpace,
        threshold: Option<&dyn Fn(&[f64]) -> bool>,
        g: impl Fn(&DMatrix<f64>) -> DVector<f64>,
    ) -> Result<Self> {
        let mask = space.is_boundary_dof(threshold);
        Self::from_function(space, &BoundaryIndex::Mask(mask), g)
    }

    /// Constrains one component of a vector-valued unknown at the flagged scalar degrees of
    /// freedom to a constant value.
    pub fn constrain_component(
        &mut self,
        dof_mask: &[bool],
        component: usize,
        num_components: usize,
        ordering: DofOrdering,
        value: f64,
    ) -> Result<()> {
        let num_dofs = dof_mask.len();
        if component >= num_components || num_dofs * num_components != self.len() {
            return Err(Error::dimension_mismatch(
                "constrained component",
                self.len(),
                num_dofs * num_components,
            ));
        }
        for (dof, _) in dof_mask.iter().enumerate().filter(|(_, &flag)| flag) {
            let index = ordering.global_index(dof, component, num_components, num_dofs);
            self.is_constrained[index] = true;
            self.values[index] = value;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.is_constrained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_constrained.is_empty()
    }

    pub fn is_constrained(&self) -> &[bool] {
        &self.is_constrained
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn num_constrained(&self) -> usize {
        self.is_constrained.iter().filter(|&&flag| flag).count()
    }

    /// Applies the conditions to `A x = b` in place, see [`apply_dirichlet_bc_csr`].
    pub fn apply(&self, matrix: &mut CsrMatrix<f64>, rhs: &mut DVector<f64>) -> Result<()> {
        apply_dirichlet_bc_csr(matrix, rhs, &self.is_constrained, &self.values)
    }
}
