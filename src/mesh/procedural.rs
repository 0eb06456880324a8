//! Basic procedural mesh generation routines.
use crate::error::{Error, Result};
use crate::mesh::SimplexMesh;

/// Uniform mesh of the interval `[a, b]` with `num_cells` segments.
pub fn create_interval_mesh(a: f64, b: f64, num_cells: usize) -> Result<SimplexMesh> {
    if num_cells == 0 || !(b > a) {
        return Err(Error::Mesh(format!(
            "cannot mesh interval [{a}, {b}] with {num_cells} cells"
        )));
    }
    let h = (b - a) / num_cells as f64;
    let nodes = (0..=num_cells).map(|i| a + i as f64 * h).collect();
    let cells = (0..num_cells).flat_map(|i| [i, i + 1]).collect();
    SimplexMesh::from_nodes_and_cells(1, 1, nodes, cells)
}

pub fn create_unit_interval_mesh(num_cells: usize) -> Result<SimplexMesh> {
    create_interval_mesh(0.0, 1.0, num_cells)
}

/// Uniform triangle mesh of the rectangle `[x0, x1] x [y0, y1]`.
///
/// Each of the `nx * ny` quadrilaterals is split into two counter-clockwise triangles along
/// the diagonal from its lower left to its upper right corner. Nodes are numbered row by row,
/// starting in the lower left corner.
pub fn create_rectangular_tri_mesh(
    [x0, x1]: [f64; 2],
    [y0, y1]: [f64; 2],
    nx: usize,
    ny: usize,
) -> Result<SimplexMesh> {
    if nx == 0 || ny == 0 || !(x1 > x0) || !(y1 > y0) {
        return Err(Error::Mesh(format!(
            "cannot mesh rectangle [{x0}, {x1}] x [{y0}, {y1}] with {nx} x {ny} cells"
        )));
    }
    let (hx, hy) = ((x1 - x0) / nx as f64, (y1 - y0) / ny as f64);
    let mut nodes = Vec::with_capacity(2 * (nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            nodes.push(x0 + i as f64 * hx);
            nodes.push(y0 + j as f64 * hy);
        }
    }

    let index = |i: usize, j: usize| j * (nx + 1) + i;
    let mut cells = Vec::with_capacity(6 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let (v00, v10, v01, v11) = (index(i, j), index(i + 1, j), index(i, j + 1), index(i + 1, j + 1));
            cells.extend_from_slice(&[v00, v10, v11]);
            cells.extend_from_slice(&[v00, v11, v01]);
        }
    }
    SimplexMesh::from_nodes_and_cells(2, 2, nodes, cells)
}

pub fn create_unit_square_tri_mesh(cells_per_dim: usize) -> Result<SimplexMesh> {
    create_rectangular_tri_mesh([0.0, 1.0], [0.0, 1.0], cells_per_dim, cells_per_dim)
}

/// Uniform tetrahedral mesh of an axis-aligned box.
///
/// Every hexahedral cell is split into six tetrahedra sharing the diagonal from its lowest to
/// its highest corner (Kuhn triangulation), which gives a conforming mesh.
pub fn create_box_tet_mesh(bounds: [[f64; 2]; 3], cells: [usize; 3]) -> Result<SimplexMesh> {
    let [nx, ny, nz] = cells;
    if cells.iter().any(|&n| n == 0) || bounds.iter().any(|[lo, hi]| !(hi > lo)) {
        return Err(Error::Mesh(format!(
            "cannot mesh box {bounds:?} with {nx} x {ny} x {nz} cells"
        )));
    }
    let h: Vec<f64> = bounds
        .iter()
        .zip(&cells)
        .map(|([lo, hi], n)| (hi - lo) / *n as f64)
        .collect();

    let mut nodes = Vec::with_capacity(3 * (nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                nodes.push(bounds[0][0] + i as f64 * h[0]);
                nodes.push(bounds[1][0] + j as f64 * h[1]);
                nodes.push(bounds[2][0] + k as f64 * h[2]);
            }
        }
    }

    let index = |[i, j, k]: [usize; 3]| (k * (ny + 1) + j) * (nx + 1) + i;
    // Each tetrahedron walks from the lowest corner to the highest along one permutation of axes
    const AXIS_PERMUTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let mut connectivity = Vec::with_capacity(24 * nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                for permutation in &AXIS_PERMUTATIONS {
                    let mut corner = [i, j, k];
                    connectivity.push(index(corner));
                    for &axis in permutation {
                        corner[axis] += 1;
                        connectivity.push(index(corner));
                    }
                }
            }
        }
    }
    SimplexMesh::from_nodes_and_cells(3, 3, nodes, connectivity)
}

pub fn create_unit_cube_tet_mesh(cells_per_dim: usize) -> Result<SimplexMesh> {
    let n = cells_per_dim;
    create_box_tet_mesh([[0.0, 1.0]; 3], [n, n, n])
}
