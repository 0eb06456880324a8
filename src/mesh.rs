//! Simplicial meshes of intervals, triangles and tetrahedra.
use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

pub mod procedural;

/// A face that is connected to exactly one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryFace {
    /// Index of the cell that owns the face.
    pub cell: usize,
    /// Local index of the cell vertex opposite to the face.
    pub local_index: usize,
    /// Global vertices of the face, in the order they appear in the owning cell.
    pub vertices: Vec<usize>,
}

/// A conforming mesh of simplices with topological dimension 1, 2 or 3.
///
/// Node coordinates and cell connectivity are stored as flat arrays. Quantities derived from
/// the geometry (cell measures, gradients of the barycentric coordinates and boundary faces)
/// are computed once at construction, the mesh is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexMesh {
    geometry_dim: usize,
    top_dim: usize,
    nodes: Vec<f64>,
    cells: Vec<usize>,
    cell_measures: Vec<f64>,
    grad_lambdas: Vec<DMatrix<f64>>,
    boundary_faces: Vec<BoundaryFace>,
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|i| i as f64).product()
}

/// Computes the measure of the simplex spanned by the columns of `edges` relative to a common
/// vertex, via the Gram determinant.
fn simplex_measure(edges: &DMatrix<f64>) -> f64 {
    let k = edges.ncols();
    if k == 0 {
        return 1.0;
    }
    let gram = edges.transpose() * edges;
    gram.determinant().max(0.0).sqrt() / factorial(k)
}

impl SimplexMesh {
    /// Constructs a mesh from flat node coordinates (`geometry_dim` entries per node) and flat
    /// cell connectivity (`top_dim + 1` entries per cell).
    ///
    /// # Errors
    ///
    /// Fails if the dimensions are unsupported, the arrays are inconsistent, connectivity refers
    /// to non-existent nodes or a cell is degenerate.
    pub fn from_nodes_and_cells(
        geometry_dim: usize,
        top_dim: usize,
        nodes: Vec<f64>,
        cells: Vec<usize>,
    ) -> Result<Self> {
        if !(1..=3).contains(&top_dim) {
            return Err(Error::UnsupportedDimension {
                operation: "simplex mesh",
                dim: top_dim,
            });
        }
        if geometry_dim < top_dim {
            return Err(Error::Mesh(format!(
                "geometry dimension {geometry_dim} is smaller than topological dimension {top_dim}"
            )));
        }
        if nodes.len() % geometry_dim != 0 {
            return Err(Error::Mesh(format!(
                "node array of length {} is not divisible by geometry dimension {geometry_dim}",
                nodes.len()
            )));
        }
        let nv = top_dim + 1;
        if cells.len() % nv != 0 {
            return Err(Error::Mesh(format!(
                "cell array of length {} is not divisible by {nv} vertices per cell",
                cells.len()
            )));
        }
        let num_nodes = nodes.len() / geometry_dim;
        if let Some(&index) = cells.iter().find(|&&v| v >= num_nodes) {
            return Err(Error::Mesh(format!(
                "cell connectivity refers to node {index}, but the mesh only has {num_nodes} nodes"
            )));
        }

        let mut mesh = Self {
            geometry_dim,
            top_dim,
            nodes,
            cells,
            cell_measures: Vec::new(),
            grad_lambdas: Vec::new(),
            boundary_faces: Vec::new(),
        };
        mesh.compute_cell_geometry()?;
        mesh.boundary_faces = mesh.find_boundary_faces();
        Ok(mesh)
    }

    fn compute_cell_geometry(&mut self) -> Result<()> {
        let (gd, td) = (self.geometry_dim, self.top_dim);
        let num_cells = self.number_of_cells();
        self.cell_measures.reserve(num_cells);
        self.grad_lambdas.reserve(num_cells);

        for c in 0..num_cells {
            let cell = self.cell(c);
            let x0 = self.node(cell[0]);
            let jacobian = DMatrix::from_fn(gd, td, |i, j| self.node(cell[j + 1])[i] - x0[i]);
            let measure = simplex_measure(&jacobian);
            let gram = jacobian.transpose() * &jacobian;
            let gram_inv = match gram.try_inverse() {
                Some(inv) if measure > 0.0 => inv,
                _ => return Err(Error::Mesh(format!("cell {c} is degenerate"))),
            };
            // Rows 1..=td of the gradient matrix form the pseudo-inverse of the jacobian
            let pseudo_inverse = gram_inv * jacobian.transpose();
            let mut grad_lambda = DMatrix::zeros(td + 1, gd);
            for k in 0..td {
                grad_lambda.row_mut(k + 1).copy_from(&pseudo_inverse.row(k));
            }
            let sum = pseudo_inverse.row_sum();
            grad_lambda.row_mut(0).copy_from(&(-sum));

            self.cell_measures.push(measure);
            self.grad_lambdas.push(grad_lambda);
        }
        Ok(())
    }

    fn find_boundary_faces(&self) -> Vec<BoundaryFace> {
        // BTreeMap keeps the face order deterministic
        let mut face_counts: BTreeMap<Vec<usize>, (usize, usize, usize)> = BTreeMap::new();
        for c in 0..self.number_of_cells() {
            for j in 0..=self.top_dim {
                let mut key = self.local_face_vertices(c, j);
                key.sort_unstable();
                face_counts
                    .entry(key)
                    .and_modify(|(_, _, count)| *count += 1)
                    .or_insert((c, j, 1));
            }
        }

        face_counts
            .into_values()
            .filter(|&(_, _, count)| count == 1)
            .map(|(cell, local_index, _)| BoundaryFace {
                cell,
                local_index,
                vertices: self.local_face_vertices(cell, local_index),
            })
            .collect()
    }

    fn local_face_vertices(&self, cell: usize, opposite: usize) -> Vec<usize> {
        self.cell(cell)
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != opposite)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn geo_dimension(&self) -> usize {
        self.geometry_dim
    }

    pub fn top_dimension(&self) -> usize {
        self.top_dim
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len() / self.geometry_dim
    }

    pub fn number_of_cells(&self) -> usize {
        self.cells.len() / (self.top_dim + 1)
    }

    pub fn number_of_vertices_of_cells(&self) -> usize {
        self.top_dim + 1
    }

    /// Coordinates of the given node.
    pub fn node(&self, index: usize) -> &[f64] {
        let gd = self.geometry_dim;
        &self.nodes[gd * index..gd * (index + 1)]
    }

    /// All node coordinates as a flat array.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Global vertex indices of the given cell.
    pub fn cell(&self, index: usize) -> &[usize] {
        let nv = self.top_dim + 1;
        &self.cells[nv * index..nv * (index + 1)]
    }

    /// The flat cell connectivity array.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Measures (length, area or volume) of all cells.
    pub fn entity_measure(&self) -> &[f64] {
        &self.cell_measures
    }

    /// Gradients of the barycentric coordinates of a cell, one row per cell vertex.
    pub fn grad_lambda(&self, cell: usize) -> &DMatrix<f64> {
        &self.grad_lambdas[cell]
    }

    /// Maps barycentric coordinates of a cell to physical coordinates.
    pub fn cell_point(&self, cell: usize, bc: &[f64]) -> DVector<f64> {
        let mut x = DVector::zeros(self.geometry_dim);
        for (&v, lambda) in self.cell(cell).iter().zip(bc) {
            for (x_i, v_i) in x.iter_mut().zip(self.node(v)) {
                *x_i += lambda * v_i;
            }
        }
        x
    }

    /// Maps every row of barycentric coordinates `bcs` (`NQ x (TD + 1)`) into every cell.
    ///
    /// The result has `NC * NQ` rows, with row `c * NQ + q` holding the image of point `q`
    /// in cell `c`.
    pub fn bc_to_point(&self, bcs: &DMatrix<f64>) -> DMatrix<f64> {
        let nq = bcs.nrows();
        let mut points = DMatrix::zeros(self.number_of_cells() * nq, self.geometry_dim);
        for c in 0..self.number_of_cells() {
            for q in 0..nq {
                let bc: Vec<f64> = bcs.row(q).iter().copied().collect();
                let x = self.cell_point(c, &bc);
                points.row_mut(c * nq + q).copy_from(&x.transpose());
            }
        }
        points
    }

    pub fn cell_barycenter(&self, cell: usize) -> DVector<f64> {
        let nv = self.top_dim + 1;
        let bc = vec![1.0 / nv as f64; nv];
        self.cell_point(cell, &bc)
    }

    /// Faces owned by exactly one cell, in a deterministic order.
    pub fn boundary_faces(&self) -> &[BoundaryFace] {
        &self.boundary_faces
    }

    pub fn face_measure(&self, face: &BoundaryFace) -> f64 {
        let x0 = self.node(face.vertices[0]);
        let k = face.vertices.len() - 1;
        let edges = DMatrix::from_fn(self.geometry_dim, k, |i, j| {
            self.node(face.vertices[j + 1])[i] - x0[i]
        });
        simplex_measure(&edges)
    }

    pub fn face_barycenter(&self, face: &BoundaryFace) -> DVector<f64> {
        let n = face.vertices.len() as f64;
        let mut x = DVector::zeros(self.geometry_dim);
        for &v in &face.vertices {
            for (x_i, v_i) in x.iter_mut().zip(self.node(v)) {
                *x_i += v_i / n;
            }
        }
        x
    }

    /// Unit normal of a boundary face pointing out of its owning cell.
    ///
    /// The barycentric coordinate associated with the opposite vertex decreases towards the face,
    /// so its negated gradient points outwards.
    pub fn face_unit_normal(&self, face: &BoundaryFace) -> DVector<f64> {
        let g = self.grad_lambda(face.cell).row(face.local_index).transpose();
        -&g / g.norm()
    }

    /// Flags nodes that belong to at least one boundary face.
    pub fn boundary_node_flag(&self) -> Vec<bool> {
        let mut flag = vec![false; self.number_of_nodes()];
        for face in &self.boundary_faces {
            for &v in &face.vertices {
                flag[v] = true;
            }
        }
        flag
    }
}
