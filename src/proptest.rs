//! Strategies for property-based testing of code built on this crate.
use crate::mesh::procedural::create_rectangular_tri_mesh;
use crate::mesh::SimplexMesh;
use crate::space::DofOrdering;
use ::proptest::prelude::*;
use nalgebra::DMatrix;

/// Barycentric coordinates of a point in the closed reference simplex of the given dimension.
pub fn barycentric_point(top_dim: usize) -> impl Strategy<Value = Vec<f64>> {
    // Normalizing positive weights covers the whole simplex, including points close to faces
    proptest::collection::vec(1e-6..1.0f64, top_dim + 1).prop_map(|weights| {
        let total: f64 = weights.iter().sum();
        weights.into_iter().map(|w| w / total).collect()
    })
}

/// A batch of barycentric points stored as the rows of an `NQ x (TD + 1)` matrix.
pub fn barycentric_points(top_dim: usize, max_points: usize) -> impl Strategy<Value = DMatrix<f64>> {
    proptest::collection::vec(barycentric_point(top_dim), 1..=max_points.max(1)).prop_map(move |points| {
        DMatrix::from_fn(points.len(), top_dim + 1, |q, k| points[q][k])
    })
}

pub fn dof_ordering() -> impl Strategy<Value = DofOrdering> {
    prop_oneof![Just(DofOrdering::ComponentMajor), Just(DofOrdering::NodeMajor)]
}

/// Triangulations of axis-aligned rectangles with a few cells in each direction.
pub fn rectangular_tri_mesh() -> impl Strategy<Value = SimplexMesh> {
    // Pick reasonably small extents, so that cells are neither tiny nor huge
    (0.1..5.0f64, 0.1..5.0f64, 1..4usize, 1..4usize).prop_filter_map(
        "mesh construction failed",
        |(width, height, nx, ny)| create_rectangular_tri_mesh([0.0, width], [0.0, height], nx, ny).ok(),
    )
}
