use crate::assembly::local::{ElementConnectivityAssembler, ElementMatrixAssembler, ElementVectorAssembler};
use crate::error::{Error, Result};
use crate::space::DofOrdering;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::csr::CsrRowMut;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// An assembler for CSR matrices.
///
/// Global indices of vector-valued unknowns follow the configured [`DofOrdering`], where the
/// number of nodes of the element assembler plays the role of the number of scalar degrees of
/// freedom.
#[derive(Debug, Clone)]
pub struct CsrAssembler {
    ordering: DofOrdering,
    // Buffers that prevent unnecessary allocations when assembling multiple matrices
    // with the same assembler
    workspace: RefCell<CsrAssemblerWorkspace>,
}

impl Default for CsrAssembler {
    fn default() -> Self {
        Self::with_ordering(DofOrdering::default())
    }
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace {
    connectivity_permutation: Vec<usize>,
    element_global_nodes: Vec<usize>,
    element_global_indices: Vec<usize>,
    element_row: Vec<f64>,
    element_matrix: DMatrix<f64>,
}

impl Default for CsrAssemblerWorkspace {
    fn default() -> Self {
        Self {
            connectivity_permutation: Vec::new(),
            element_global_nodes: Vec::new(),
            element_global_indices: Vec::new(),
            element_row: Vec::new(),
            element_matrix: DMatrix::zeros(0, 0),
        }
    }
}

/// Global index of every local (node-major) element index.
fn populate_global_indices(
    output: &mut Vec<usize>,
    element_global_nodes: &[usize],
    sdim: usize,
    num_nodes: usize,
    ordering: DofOrdering,
) {
    output.clear();
    for &node in element_global_nodes {
        for k in 0..sdim {
            output.push(ordering.global_index(node, k, sdim, num_nodes));
        }
    }
}

impl CsrAssembler {
    pub fn with_ordering(ordering: DofOrdering) -> Self {
        Self {
            ordering,
            workspace: RefCell::new(CsrAssemblerWorkspace::default()),
        }
    }

    pub fn ordering(&self) -> DofOrdering {
        self.ordering
    }

    pub fn assemble_pattern<A>(&self, element_assembler: &A) -> Result<SparsityPattern>
    where
        A: ElementConnectivityAssembler + ?Sized,
    {
        // Collecting into a BTreeSet stores each matrix entry exactly once, which matters because
        // depending on the mesh there may be a large number of duplicate entries
        let sdim = element_assembler.solution_dim();
        let num_nodes = element_assembler.num_nodes();
        let mut matrix_entries = BTreeSet::new();
        let mut element_global_nodes = Vec::new();
        let mut element_global_indices = Vec::new();
        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);
            element_global_nodes.resize(element_node_count, usize::MAX);
            element_assembler.populate_element_nodes(&mut element_global_nodes, i);
            populate_global_indices(
                &mut element_global_indices,
                &element_global_nodes,
                sdim,
                num_nodes,
                self.ordering,
            );

            for &idx_i in &element_global_indices {
                for &idx_j in &element_global_indices {
                    matrix_entries.insert((idx_i, idx_j));
                }
            }
        }

        let num_rows = sdim * num_nodes;
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(matrix_entries.len());

        offsets.push(0);
        for (i, j) in matrix_entries {
            while i + 1 > offsets.len() {
                // A while loop correctly handles consecutive empty rows
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }

        while offsets.len() < (num_rows + 1) {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
            .map_err(|err| Error::Mesh(format!("invalid connectivity for sparsity pattern: {err}")))
    }

    pub fn assemble(&self, element_assembler: &dyn ElementMatrixAssembler) -> Result<CsrMatrix<f64>> {
        let pattern = self.assemble_pattern(element_assembler)?;
        let initial_matrix_values = vec![0.0; pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)
            .map_err(|err| Error::Mesh(format!("failed to create CSR matrix: {err}")))?;
        self.assemble_into_csr(&mut matrix, element_assembler)?;
        Ok(matrix)
    }

    /// Adds all element matrices into an existing matrix whose pattern covers the element
    /// connectivity.
    pub fn assemble_into_csr(
        &self,
        csr: &mut CsrMatrix<f64>,
        element_assembler: &dyn ElementMatrixAssembler,
    ) -> Result<()> {
        let ws = &mut *self.workspace.borrow_mut();
        let connectivity_permutation = &mut ws.connectivity_permutation;
        let element_global_nodes = &mut ws.element_global_nodes;
        let element_global_indices = &mut ws.element_global_indices;
        let element_row = &mut ws.element_row;
        let element_matrix = &mut ws.element_matrix;

        let sdim = element_assembler.solution_dim();
        let num_nodes = element_assembler.num_nodes();

        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);
            let element_matrix_dim = sdim * element_node_count;

            element_global_nodes.resize(element_node_count, 0);
            element_matrix.resize_mut(element_matrix_dim, element_matrix_dim, 0.0);
            element_matrix.fill(0.0);

            element_assembler.assemble_element_matrix_into(i, element_matrix)?;
            element_assembler.populate_element_nodes(element_global_nodes, i);
            populate_global_indices(
                element_global_indices,
                element_global_nodes,
                sdim,
                num_nodes,
                self.ordering,
            );

            connectivity_permutation.clear();
            connectivity_permutation.extend(0..element_matrix_dim);
            connectivity_permutation.sort_unstable_by_key(|i| element_global_indices[*i]);

            for (local_row_index, &global_row_index) in element_global_indices.iter().enumerate() {
                element_row.clear();
                element_row.extend(element_matrix.row(local_row_index).iter().copied());
                let mut csr_row = csr.row_mut(global_row_index);
                add_element_row_to_csr_row(
                    &mut csr_row,
                    element_global_indices,
                    connectivity_permutation,
                    element_row,
                )?;
            }
        }

        Ok(())
    }

    /// Assembles the global vector from element vectors, summing contributions at shared indices.
    pub fn assemble_vector(&self, element_assembler: &dyn ElementVectorAssembler) -> Result<DVector<f64>> {
        let sdim = element_assembler.solution_dim();
        let num_nodes = element_assembler.num_nodes();
        let mut global = DVector::zeros(sdim * num_nodes);
        let mut element_global_nodes = Vec::new();
        let mut element_global_indices = Vec::new();
        let mut element_vector = DVector::zeros(0);

        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);
            element_global_nodes.resize(element_node_count, 0);
            element_vector.resize_vertically_mut(sdim * element_node_count, 0.0);
            element_vector.fill(0.0);

            element_assembler.assemble_element_vector_into(i, &mut element_vector)?;
            element_assembler.populate_element_nodes(&mut element_global_nodes, i);
            populate_global_indices(
                &mut element_global_indices,
                &element_global_nodes,
                sdim,
                num_nodes,
                self.ordering,
            );
            for (local, &global_index) in element_global_indices.iter().enumerate() {
                global[global_index] += element_vector[local];
            }
        }
        Ok(global)
    }
}

/// Add a row of a local element matrix to the provided row of a CSR matrix.
///
/// `global_indices`: The global index of each local index.
/// `sorted_permutation`: The local indices, ordered such that the corresponding global indices
///    are sorted.
fn add_element_row_to_csr_row(
    row: &mut CsrRowMut<f64>,
    global_indices: &[usize],
    sorted_permutation: &[usize],
    local_row: &[f64],
) -> Result<()> {
    if sorted_permutation.len() != global_indices.len() {
        return Err(Error::dimension_mismatch(
            "element index permutation",
            global_indices.len(),
            sorted_permutation.len(),
        ));
    }
    if local_row.len() != global_indices.len() {
        return Err(Error::dimension_mismatch("element row", global_indices.len(), local_row.len()));
    }

    let (column_indices, values) = row.cols_and_values_mut();
    let mut csr_col_idx_iter = column_indices.iter().copied().enumerate();

    for &local_col_idx in sorted_permutation {
        let global_col_index = global_indices[local_col_idx];
        // Columns are visited in increasing order, so a linear scan suffices
        let (local_csr_col_idx, _) = csr_col_idx_iter
            .find(|(_, csr_col_idx)| *csr_col_idx == global_col_index)
            .ok_or_else(|| {
                Error::Mesh(format!(
                    "column {global_col_index} is missing from the sparsity pattern"
                ))
            })?;
        values[local_csr_col_idx] += local_row[local_col_idx];
    }
    Ok(())
}

/// Applies inhomogeneous Dirichlet conditions to a linear system in place.
///
/// For every constrained index `i` with value `g_i`, the contribution `A[j, i] g_i` is moved
/// to the right-hand side of every unconstrained row `j`, row and column `i` are zeroed, the
/// diagonal entry is set to one and `b[i] = g_i`. Symmetric matrices stay symmetric, and applying
/// the same conditions again leaves the system unchanged.
///
/// `values` has the length of the system, only constrained entries are read.
pub fn apply_dirichlet_bc_csr(
    matrix: &mut CsrMatrix<f64>,
    rhs: &mut DVector<f64>,
    is_constrained: &[bool],
    values: &DVector<f64>,
) -> Result<()> {
    let n = matrix.nrows();
    for (context, len) in [
        ("dirichlet rhs", rhs.len()),
        ("dirichlet mask", is_constrained.len()),
        ("dirichlet values", values.len()),
    ] {
        if len != n {
            return Err(Error::dimension_mismatch(context, n, len));
        }
    }

    for row_index in 0..n {
        let mut row = matrix.row_mut(row_index);
        let (cols, entries) = row.cols_and_values_mut();
        if is_constrained[row_index] {
            let mut has_diagonal = false;
            for (&col_index, entry) in cols.iter().zip(entries.iter_mut()) {
                if col_index == row_index {
                    *entry = 1.0;
                    has_diagonal = true;
                } else {
                    *entry = 0.0;
                }
            }
            if !has_diagonal {
                return Err(Error::MissingDiagonal(row_index));
            }
            rhs[row_index] = values[row_index];
        } else {
            for (&col_index, entry) in cols.iter().zip(entries.iter_mut()) {
                if is_constrained[col_index] {
                    rhs[row_index] -= *entry * values[col_index];
                    *entry = 0.0;
                }
            }
        }
    }
    Ok(())
}

/// Applies homogeneous Dirichlet conditions to a vector, e.g. a residual.
pub fn apply_homogeneous_dirichlet_bc_rhs(rhs: &mut DVector<f64>, is_constrained: &[bool]) {
    for (value, &constrained) in rhs.iter_mut().zip(is_constrained) {
        if constrained {
            *value = 0.0;
        }
    }
}
