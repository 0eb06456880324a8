use crate::mesh::SimplexMesh;
use rustc_hash::FxHashMap;

/// Mapping from local basis functions of each cell to global degrees of freedom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    num_global_dofs: usize,
    num_local_dofs: usize,
    cell_to_dof: Vec<usize>,
}

impl DofMap {
    /// Numbering for globally continuous spaces.
    ///
    /// A local basis function is attached to the sub-entity spanned by the vertices where its
    /// multi-index is non-zero. Degrees of freedom on a vertex take the index of that node.
    /// The remaining degrees of freedom are numbered after the nodes, ordered by the dimension of
    /// their sub-entity (edges, then faces, then cell interiors) and then by first encounter.
    /// Two cells share a degree of freedom exactly when they agree on its vertices and on the
    /// multi-index restricted to those vertices.
    pub fn continuous(mesh: &SimplexMesh, multi_index: &[Vec<usize>]) -> Self {
        let num_local_dofs = multi_index.len();
        let num_cells = mesh.number_of_cells();
        let mut cell_to_dof = vec![usize::MAX; num_cells * num_local_dofs];

        let supports: Vec<Vec<usize>> = multi_index
            .iter()
            .map(|alpha| (0..alpha.len()).filter(|&k| alpha[k] > 0).collect())
            .collect();

        for c in 0..num_cells {
            let cell = mesh.cell(c);
            for (i, support) in supports.iter().enumerate() {
                if let [k] = support.as_slice() {
                    cell_to_dof[c * num_local_dofs + i] = cell[*k];
                }
            }
        }

        let mut next_dof = mesh.number_of_nodes();
        let mut lookup: FxHashMap<Vec<(usize, usize)>, usize> = FxHashMap::default();
        for dim in 1..=mesh.top_dimension() {
            for c in 0..num_cells {
                let cell = mesh.cell(c);
                for (i, support) in supports.iter().enumerate() {
                    if support.len() != dim + 1 {
                        continue;
                    }
                    let mut key: Vec<(usize, usize)> =
                        support.iter().map(|&k| (cell[k], multi_index[i][k])).collect();
                    key.sort_unstable();
                    let dof = *lookup.entry(key).or_insert_with(|| {
                        next_dof += 1;
                        next_dof - 1
                    });
                    cell_to_dof[c * num_local_dofs + i] = dof;
                }
            }
        }

        Self {
            num_global_dofs: next_dof,
            num_local_dofs,
            cell_to_dof,
        }
    }

    /// Numbering for discontinuous spaces, where every cell owns its degrees of freedom.
    pub fn discontinuous(mesh: &SimplexMesh, num_local_dofs: usize) -> Self {
        let num_cells = mesh.number_of_cells();
        Self {
            num_global_dofs: num_cells * num_local_dofs,
            num_local_dofs,
            cell_to_dof: (0..num_cells * num_local_dofs).collect(),
        }
    }

    pub fn number_of_global_dofs(&self) -> usize {
        self.num_global_dofs
    }

    pub fn number_of_local_dofs(&self) -> usize {
        self.num_local_dofs
    }

    /// Flat `NC x ldof` array of global indices.
    pub fn cell_to_dof(&self) -> &[usize] {
        &self.cell_to_dof
    }

    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        let n = self.num_local_dofs;
        &self.cell_to_dof[n * cell..n * (cell + 1)]
    }
}
