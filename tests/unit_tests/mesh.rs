use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use simfem::error::Error;
use simfem::mesh::procedural::{
    create_box_tet_mesh, create_interval_mesh, create_unit_cube_tet_mesh, create_unit_square_tri_mesh,
};
use simfem::mesh::SimplexMesh;
use simfem::proptest::rectangular_tri_mesh;

#[test]
fn unit_square_mesh_has_expected_size() {
    let mesh = create_unit_square_tri_mesh(3).unwrap();
    assert_eq!(mesh.geo_dimension(), 2);
    assert_eq!(mesh.top_dimension(), 2);
    assert_eq!(mesh.number_of_nodes(), 16);
    assert_eq!(mesh.number_of_cells(), 18);
    assert_eq!(mesh.number_of_vertices_of_cells(), 3);
    assert_eq!(mesh.boundary_faces().len(), 12);
    assert_eq!(mesh.boundary_node_flag().iter().filter(|&&b| b).count(), 12);
    assert_scalar_eq!(mesh.entity_measure().iter().sum::<f64>(), 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn unit_cube_mesh_measures() {
    let mesh = create_unit_cube_tet_mesh(2).unwrap();
    assert_eq!(mesh.number_of_nodes(), 27);
    assert_scalar_eq!(mesh.entity_measure().iter().sum::<f64>(), 1.0, comp = abs, tol = 1e-12);
    let boundary_area: f64 = mesh.boundary_faces().iter().map(|face| mesh.face_measure(face)).sum();
    assert_scalar_eq!(boundary_area, 6.0, comp = abs, tol = 1e-12);

    let stretched = create_box_tet_mesh([[0.0, 2.0], [0.0, 1.0], [-1.0, 2.0]], [2, 1, 3]).unwrap();
    assert_scalar_eq!(stretched.entity_measure().iter().sum::<f64>(), 6.0, comp = abs, tol = 1e-12);
}

#[test]
fn interval_mesh() {
    let mesh = create_interval_mesh(-1.0, 1.0, 4).unwrap();
    assert_eq!(mesh.number_of_cells(), 4);
    assert_eq!(mesh.boundary_faces().len(), 2);
    assert!(mesh.entity_measure().iter().all(|&h| (h - 0.5).abs() < 1e-14));
    assert!(create_interval_mesh(1.0, 0.0, 4).is_err());
    assert!(create_interval_mesh(0.0, 1.0, 0).is_err());
}

#[test]
fn invalid_meshes_are_rejected() {
    // Collinear vertices
    let degenerate = SimplexMesh::from_nodes_and_cells(2, 2, vec![0.0, 0.0, 1.0, 0.0, 2.0, 0.0], vec![0, 1, 2]);
    assert!(matches!(degenerate, Err(Error::Mesh(_))));

    let dangling = SimplexMesh::from_nodes_and_cells(2, 2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0], vec![0, 1, 3]);
    assert!(matches!(dangling, Err(Error::Mesh(_))));

    let ragged = SimplexMesh::from_nodes_and_cells(2, 2, vec![0.0, 0.0, 1.0], vec![0, 1, 2]);
    assert!(ragged.is_err());

    let unsupported = SimplexMesh::from_nodes_and_cells(4, 4, vec![0.0; 20], vec![0, 1, 2, 3, 4]);
    assert!(matches!(unsupported, Err(Error::UnsupportedDimension { dim: 4, .. })));
}

#[test]
fn surface_mesh_in_three_dimensions() {
    let nodes = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 2.0];
    let mesh = SimplexMesh::from_nodes_and_cells(3, 2, nodes, vec![0, 1, 2]).unwrap();
    assert_scalar_eq!(mesh.entity_measure()[0], 1.0, comp = abs, tol = 1e-14);
    // The gradient of lambda_2 points along z with length 1/2
    let grad = mesh.grad_lambda(0);
    assert_scalar_eq!(grad[(2, 2)], 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn barycentric_points_map_to_every_cell() {
    let mesh = create_unit_square_tri_mesh(1).unwrap();
    let bcs = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
    let points = mesh.bc_to_point(&bcs);
    assert_eq!(points.shape(), (4, 2));
    for c in 0..2 {
        let vertex = mesh.node(mesh.cell(c)[0]);
        assert_matrix_eq!(points.row(2 * c).transpose(), DVector::from_column_slice(vertex));
        assert_matrix_eq!(
            points.row(2 * c + 1).transpose(),
            mesh.cell_barycenter(c),
            comp = abs,
            tol = 1e-14
        );
    }
}

proptest! {
    #[test]
    fn barycentric_gradients_are_consistent(mesh in rectangular_tri_mesh()) {
        for c in 0..mesh.number_of_cells() {
            let grad = mesh.grad_lambda(c);
            // Barycentric coordinates sum to one, so their gradients sum to zero
            for j in 0..2 {
                prop_assert!(grad.column(j).sum().abs() < 1e-10);
            }
            // lambda_k is one at vertex k and zero at the others
            let x0 = mesh.node(mesh.cell(c)[0]);
            for (k, &v) in mesh.cell(c).iter().enumerate() {
                let x = mesh.node(v);
                for i in 1..3 {
                    let dx = DVector::from_fn(2, |j, _| x[j] - x0[j]);
                    let delta = (grad.row(i) * dx)[0];
                    let expected = if i == k { 1.0 } else { 0.0 };
                    prop_assert!((delta - expected).abs() < 1e-10);
                }
            }
        }
    }

    #[test]
    fn boundary_normals_point_outwards(mesh in rectangular_tri_mesh()) {
        let perimeter: f64 = mesh.boundary_faces().iter().map(|face| mesh.face_measure(face)).sum();
        let (width, height) = mesh.nodes().chunks(2).fold((0.0f64, 0.0f64), |(w, h), x| (w.max(x[0]), h.max(x[1])));
        prop_assert!((perimeter - 2.0 * (width + height)).abs() < 1e-10);
        for face in mesh.boundary_faces() {
            let normal = mesh.face_unit_normal(face);
            prop_assert!((normal.norm() - 1.0).abs() < 1e-12);
            let to_face = mesh.face_barycenter(face) - mesh.cell_barycenter(face.cell);
            prop_assert!(normal.dot(&to_face) > 0.0);
        }
    }
}
