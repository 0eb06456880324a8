use matrixcompare::assert_scalar_eq;
use simfem::io::msh::{load_msh_from_bytes, load_msh_from_file};
use simfem::io::vtk::{snapshot_path, MeshDataSetBuilder, VtkOutput};
use simfem::mesh::procedural::create_unit_square_tri_mesh;
use std::path::Path;

const TWO_TRIANGLES: &str = "tests/assets/two_triangles.msh";

#[test]
fn load_triangles_from_msh_file() {
    let mesh = load_msh_from_file(TWO_TRIANGLES, 2, 2).unwrap();
    assert_eq!(mesh.number_of_nodes(), 4);
    assert_eq!(mesh.number_of_cells(), 2);
    assert_eq!(mesh.geo_dimension(), 2);
    assert_eq!(mesh.cell(0), &[0, 1, 2]);
    assert_eq!(mesh.node(2), &[2.0, 1.0]);
    let area: f64 = mesh.entity_measure().iter().sum();
    assert_scalar_eq!(area, 2.0, comp = abs, tol = 1e-14);
    assert_eq!(mesh.boundary_faces().len(), 4);
}

#[test]
fn msh_coordinates_can_be_embedded_in_3d() {
    let mesh = load_msh_from_file(TWO_TRIANGLES, 2, 3).unwrap();
    assert_eq!(mesh.geo_dimension(), 3);
    assert_eq!(mesh.node(3), &[0.0, 1.0, 0.0]);
    let area: f64 = mesh.entity_measure().iter().sum();
    assert_scalar_eq!(area, 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn invalid_msh_input_is_rejected() {
    assert!(load_msh_from_bytes(b"not a mesh", 2, 2).is_err());
    assert!(load_msh_from_file("tests/assets/does_not_exist.msh", 2, 2).is_err());

    let bytes = std::fs::read(TWO_TRIANGLES).unwrap();
    // The file has no tetrahedra
    assert!(load_msh_from_bytes(&bytes, 3, 3).is_err());
    assert!(load_msh_from_bytes(&bytes, 4, 3).is_err());
    assert!(load_msh_from_bytes(&bytes, 2, 0).is_err());
}

#[test]
fn snapshot_paths_are_zero_padded() {
    let path = snapshot_path("out", "heat", 42);
    assert_eq!(path, Path::new("out").join("heat_0000000042.vtu"));
    assert_eq!(VtkOutput::new("out", "heat").snapshot_path(42), path);
}

#[test]
fn export_mesh_with_attributes() {
    let mesh = create_unit_square_tri_mesh(2).unwrap();
    let point_values: Vec<f64> = (0..mesh.number_of_nodes()).map(|i| mesh.node(i)[0]).collect();
    let cell_values = vec![1.0; mesh.number_of_cells()];
    let path = std::env::temp_dir().join("simfem_io").join("unit_square.vtu");
    MeshDataSetBuilder::from_mesh(&mesh)
        .with_title("unit square")
        .with_point_scalar_attributes("x", 1, &point_values)
        .with_cell_scalar_attributes("one", 1, &cell_values)
        .try_export(&path)
        .unwrap();
    assert!(path.is_file());
}

#[test]
fn attributes_of_wrong_length_are_rejected() {
    let mesh = create_unit_square_tri_mesh(2).unwrap();
    let result = MeshDataSetBuilder::from_mesh(&mesh)
        .with_point_scalar_attributes("u", 2, &vec![0.0; mesh.number_of_nodes()])
        .try_build();
    assert!(result.is_err());

    let result = MeshDataSetBuilder::from_mesh(&mesh)
        .with_cell_scalar_attributes("H", 1, &[0.0])
        .try_build();
    assert!(result.is_err());
}
