//! Bilinear and linear forms that collect integrators and assemble global operators.
use crate::assembly::global::CsrAssembler;
use crate::assembly::local::{
    BilinearIntegrator, ElementConnectivityAssembler, ElementMatrixAssembler, ElementVectorAssembler,
    LinearIntegrator,
};
use crate::error::{Error, Result};
use crate::space::{DofOrdering, FunctionSpace};
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Precomputed local contributions of a form, scattered through the space's cell-to-dof map.
struct LocalContributions<'a, T> {
    space: &'a FunctionSpace,
    solution_dim: usize,
    locals: Vec<T>,
}

impl<'a, T> ElementConnectivityAssembler for LocalContributions<'a, T> {
    fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    fn num_elements(&self) -> usize {
        self.space.num_elements()
    }

    fn num_nodes(&self) -> usize {
        self.space.num_nodes()
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.space.element_node_count(element_index)
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        self.space.populate_element_nodes(output, element_index)
    }
}

impl<'a> ElementMatrixAssembler for LocalContributions<'a, DMatrix<f64>> {
    fn assemble_element_matrix_into(&self, element_index: usize, output: &mut DMatrix<f64>) -> Result<()> {
        let local = &self.locals[element_index];
        if local.shape() != output.shape() {
            return Err(Error::dimension_mismatch("local matrix", output.nrows(), local.nrows()));
        }
        output.copy_from(local);
        Ok(())
    }
}

impl<'a> ElementVectorAssembler for LocalContributions<'a, DVector<f64>> {
    fn assemble_element_vector_into(&self, element_index: usize, output: &mut DVector<f64>) -> Result<()> {
        let local = &self.locals[element_index];
        if local.len() != output.len() {
            return Err(Error::dimension_mismatch("local vector", output.len(), local.len()));
        }
        output.copy_from(local);
        Ok(())
    }
}

fn common_solution_dim(dims: impl Iterator<Item = usize>) -> Result<usize> {
    let dims: Vec<usize> = dims.collect();
    let first = *dims
        .first()
        .ok_or_else(|| Error::config("form has no integrators"))?;
    match dims.iter().find(|&&d| d != first) {
        Some(&other) => Err(Error::dimension_mismatch("integrator solution dimension", first, other)),
        None => Ok(first),
    }
}

/// Sums integrator contributions per cell.
fn sum_locals<T>(mut per_integrator: Vec<Vec<T>>) -> Vec<T>
where
    T: std::ops::AddAssign,
{
    let mut total = per_integrator.remove(0);
    for contributions in per_integrator {
        for (sum, local) in total.iter_mut().zip(contributions) {
            *sum += local;
        }
    }
    total
}

/// A bilinear form $a(u, v)$ on a function space, assembled into a sparse matrix.
pub struct BilinearForm<'a> {
    space: &'a FunctionSpace,
    ordering: DofOrdering,
    integrators: Vec<Box<dyn BilinearIntegrator + 'a>>,
}

impl<'a> BilinearForm<'a> {
    pub fn new(space: &'a FunctionSpace) -> Self {
        Self {
            space,
            ordering: DofOrdering::default(),
            integrators: Vec::new(),
        }
    }

    /// Sets the global layout of vector-valued unknowns.
    pub fn with_ordering(self, ordering: DofOrdering) -> Self {
        Self { ordering, ..self }
    }

    pub fn add_integrator(&mut self, integrator: impl BilinearIntegrator + 'a) -> &mut Self {
        self.integrators.push(Box::new(integrator));
        self
    }

    /// Assembles the global matrix, summing contributions at shared degrees of freedom.
    pub fn assembly(&self) -> Result<CsrMatrix<f64>> {
        let solution_dim = common_solution_dim(self.integrators.iter().map(|i| i.solution_dim()))?;
        let per_integrator = self
            .integrators
            .iter()
            .map(|integrator| integrator.assembly_cell_matrix(self.space))
            .collect::<Result<Vec<_>>>()?;
        let contributions = LocalContributions {
            space: self.space,
            solution_dim,
            locals: sum_locals(per_integrator),
        };
        let matrix = CsrAssembler::with_ordering(self.ordering).assemble(&contributions)?;
        debug!(
            "Assembled {}x{} matrix with {} stored entries",
            matrix.nrows(),
            matrix.ncols(),
            matrix.nnz()
        );
        Ok(matrix)
    }
}

/// A linear form $l(v)$ on a function space, assembled into a vector.
pub struct LinearForm<'a> {
    space: &'a FunctionSpace,
    ordering: DofOrdering,
    integrators: Vec<Box<dyn LinearIntegrator + 'a>>,
}

impl<'a> LinearForm<'a> {
    pub fn new(space: &'a FunctionSpace) -> Self {
        Self {
            space,
            ordering: DofOrdering::default(),
            integrators: Vec::new(),
        }
    }

    pub fn with_ordering(self, ordering: DofOrdering) -> Self {
        Self { ordering, ..self }
    }

    /// Adds a domain or boundary integrator.
    pub fn add_integrator(&mut self, integrator: impl LinearIntegrator + 'a) -> &mut Self {
        self.integrators.push(Box::new(integrator));
        self
    }

    pub fn assembly(&self) -> Result<DVector<f64>> {
        let solution_dim = common_solution_dim(self.integrators.iter().map(|i| i.solution_dim()))?;
        let per_integrator = self
            .integrators
            .iter()
            .map(|integrator| integrator.assembly_cell_vector(self.space))
            .collect::<Result<Vec<_>>>()?;
        let contributions = LocalContributions {
            space: self.space,
            solution_dim,
            locals: sum_locals(per_integrator),
        };
        CsrAssembler::with_ordering(self.ordering).assemble_vector(&contributions)
    }
}
