use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use simfem::basis::{
    bernstein_to_lagrange, derivative_component_indices, lagrange_to_bernstein, multi_index_matrix,
    multi_index_to_number, number_of_local_dofs, BasisKind, ReferenceBasis,
};
use simfem::error::Error;
use simfem::mesh::procedural::{create_interval_mesh, create_unit_cube_tet_mesh, create_unit_square_tri_mesh};
use simfem::proptest::barycentric_points;
use simfem::space::{FeFunction, FunctionSpace, SpaceType};
use std::sync::Arc;

#[test]
fn number_of_local_dofs_matches_binomial() {
    assert_eq!(number_of_local_dofs(0, 2), 1);
    assert_eq!(number_of_local_dofs(1, 1), 2);
    assert_eq!(number_of_local_dofs(2, 2), 6);
    assert_eq!(number_of_local_dofs(3, 3), 20);
}

#[test]
fn multi_indices_of_quadratic_triangle() {
    let expected = vec![
        vec![2, 0, 0],
        vec![1, 1, 0],
        vec![1, 0, 1],
        vec![0, 2, 0],
        vec![0, 1, 1],
        vec![0, 0, 2],
    ];
    assert_eq!(multi_index_matrix(2, 2), expected);
}

#[test]
fn multi_index_to_number_inverts_enumeration() {
    for top_dim in 1..=3 {
        for degree in 0..=4 {
            let indices = multi_index_matrix(degree, top_dim);
            assert_eq!(indices.len(), number_of_local_dofs(degree, top_dim));
            for (position, alpha) in indices.iter().enumerate() {
                assert_eq!(alpha.iter().sum::<usize>(), degree);
                assert_eq!(multi_index_to_number(alpha), position, "alpha = {alpha:?}");
            }
        }
    }
}

#[test]
fn derivative_components_are_non_increasing_tuples() {
    assert_eq!(
        derivative_component_indices(2, 2),
        vec![vec![0, 0], vec![1, 0], vec![1, 1]]
    );
    assert_eq!(derivative_component_indices(3, 1).len(), 3);
    assert_eq!(derivative_component_indices(3, 2).len(), 6);
    assert_eq!(derivative_component_indices(2, 3).len(), 4);
}

#[test]
fn lagrange_basis_is_nodal_at_lattice_points() {
    for top_dim in 1..=3 {
        for degree in 1..=3 {
            let basis = ReferenceBasis::new(BasisKind::Lagrange, degree, top_dim);
            let phi = basis.values(&basis.lattice_points()).unwrap();
            let n = basis.number_of_basis();
            assert_matrix_eq!(phi, DMatrix::identity(n, n), comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn bernstein_and_lagrange_coefficient_transforms_are_inverse() {
    for (degree, top_dim) in [(1, 2), (2, 2), (3, 2), (2, 3)] {
        let forward = bernstein_to_lagrange(degree, top_dim).unwrap();
        let backward = lagrange_to_bernstein(degree, top_dim).unwrap();
        let n = forward.nrows();
        assert_matrix_eq!(&forward * &backward, DMatrix::identity(n, n), comp = abs, tol = 1e-10);
    }
}

#[test]
fn constant_bernstein_basis_is_nodal() {
    let forward = bernstein_to_lagrange(0, 2).unwrap();
    assert_eq!(forward, DMatrix::identity(1, 1));
}

#[test]
fn bernstein_partial_matrix_on_interval() {
    // On [0, 2], d/dx of the quadratic Bernstein coefficients (c0, c1, c2) is
    // (c1 - c0, c2 - c1) in the linear Bernstein basis
    let mesh = create_interval_mesh(0.0, 2.0, 1).unwrap();
    let basis = ReferenceBasis::new(BasisKind::Bernstein, 2, 1);
    let partial = basis.partial_matrix(&mesh, 0, 0).unwrap();
    let expected = DMatrix::from_row_slice(2, 3, &[-1.0, 1.0, 0.0, 0.0, -1.0, 1.0]);
    assert_matrix_eq!(partial, expected, comp = abs, tol = 1e-14);

    let constant = ReferenceBasis::new(BasisKind::Bernstein, 0, 1);
    assert_eq!(constant.partial_matrix(&mesh, 0, 0).unwrap(), DMatrix::zeros(1, 1));
}

#[test]
fn bernstein_partial_matrix_differentiates_interpolants() {
    let mesh = Arc::new(create_unit_square_tri_mesh(2).unwrap());
    let space = FunctionSpace::new(mesh.clone(), 3, SpaceType::Continuous, BasisKind::Bernstein).unwrap();
    let u = |p: &DMatrix<f64>| {
        DVector::from_fn(p.nrows(), |i, _| {
            let (x, y) = (p[(i, 0)], p[(i, 1)]);
            x * x * y - 2.0 * y * y * y + x
        })
    };
    let u_h = FeFunction::scalar(space.interpolate(u).unwrap());
    let bcs = DMatrix::from_row_slice(3, 3, &[0.2, 0.3, 0.5, 0.6, 0.1, 0.3, 1.0, 0.0, 0.0]);
    let gradients = space.grad_value(&u_h, &bcs).unwrap();
    let lower = ReferenceBasis::new(BasisKind::Bernstein, 2, 2).values(&bcs).unwrap();

    for c in 0..mesh.number_of_cells() {
        let local = DVector::from_iterator(
            space.number_of_local_dofs(),
            space.cell_dofs(c).iter().map(|&i| u_h.coefficients()[i]),
        );
        for direction in 0..2 {
            let partial = space.reference_basis().partial_matrix(&mesh, c, direction).unwrap();
            let derivative = &lower * (&partial * &local);
            for q in 0..bcs.nrows() {
                assert_scalar_eq!(derivative[q], gradients.get(c, q)[direction], comp = abs, tol = 1e-10);
            }
        }
    }
}

#[test]
fn partial_matrix_rejects_invalid_input() {
    let mesh = create_unit_square_tri_mesh(1).unwrap();
    let lagrange = ReferenceBasis::new(BasisKind::Lagrange, 2, 2);
    assert!(matches!(
        lagrange.partial_matrix(&mesh, 0, 0),
        Err(Error::NotImplemented { .. })
    ));
    let bernstein = ReferenceBasis::new(BasisKind::Bernstein, 2, 2);
    assert!(bernstein.partial_matrix(&mesh, 0, 2).is_err());
    assert!(bernstein.partial_matrix(&mesh, 2, 0).is_err());
    assert!(ReferenceBasis::new(BasisKind::Bernstein, 2, 3)
        .partial_matrix(&mesh, 0, 0)
        .is_err());
}

#[test]
fn bernstein_second_derivatives_on_interval() {
    // On [0, 2] the quadratic Bernstein polynomials are (1 - x/2)^2, x (1 - x/2), (x/2)^2
    let mesh = create_interval_mesh(0.0, 2.0, 1).unwrap();
    let basis = ReferenceBasis::new(BasisKind::Bernstein, 2, 1);
    let bcs = DMatrix::from_row_slice(2, 2, &[0.3, 0.7, 0.9, 0.1]);
    let table = basis.grad_m_basis(&bcs, &mesh, 2).unwrap();
    assert_eq!(table.shape(), (2, 1, 3, 1));
    for q in 0..2 {
        assert_scalar_eq!(table.get(q, 0, 0)[0], 0.5, comp = abs, tol = 1e-12);
        assert_scalar_eq!(table.get(q, 0, 1)[0], -1.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(table.get(q, 0, 2)[0], 0.5, comp = abs, tol = 1e-12);
    }
}

#[test]
fn grad_m_basis_special_orders() {
    let mesh = create_unit_square_tri_mesh(1).unwrap();
    let basis = ReferenceBasis::new(BasisKind::Bernstein, 2, 2);
    let bcs = DMatrix::from_row_slice(1, 3, &[0.2, 0.3, 0.5]);

    let values = basis.grad_m_basis(&bcs, &mesh, 0).unwrap();
    assert_eq!(values, basis.basis(&bcs).unwrap());

    let first = basis.grad_m_basis(&bcs, &mesh, 1).unwrap();
    let gradients = basis.grad_basis(&bcs, &mesh).unwrap();
    assert_eq!(first.shape(), gradients.shape());
    for (a, b) in first.as_slice().iter().zip(gradients.as_slice()) {
        assert_scalar_eq!(*a, *b, comp = abs, tol = 1e-12);
    }

    let third = basis.grad_m_basis(&bcs, &mesh, 3).unwrap();
    assert_eq!(third.shape(), (1, 2, 6, 4));
    assert!(third.as_slice().iter().all(|&value| value == 0.0));
}

#[test]
fn grad_m_basis_is_not_available_for_lagrange() {
    let mesh = create_unit_square_tri_mesh(1).unwrap();
    let basis = ReferenceBasis::new(BasisKind::Lagrange, 2, 2);
    let bcs = DMatrix::from_row_slice(1, 3, &[0.2, 0.3, 0.5]);
    assert!(matches!(
        basis.grad_m_basis(&bcs, &mesh, 2),
        Err(Error::NotImplemented { .. })
    ));
}

#[test]
fn points_with_wrong_number_of_coordinates_are_rejected() {
    let basis = ReferenceBasis::new(BasisKind::Lagrange, 1, 2);
    assert!(basis.values(&DMatrix::zeros(1, 2)).is_err());
}

proptest! {
    #[test]
    fn bases_form_partition_of_unity(
        bcs in barycentric_points(2, 5),
        degree in 0..4usize,
        kind in prop_oneof![Just(BasisKind::Lagrange), Just(BasisKind::Bernstein)],
    ) {
        let basis = ReferenceBasis::new(kind, degree, 2);
        let phi = basis.values(&bcs).unwrap();
        for q in 0..bcs.nrows() {
            let sum: f64 = phi.row(q).iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-10, "sum = {}", sum);
        }

        // The gradients of a partition of unity sum to zero
        let mesh = create_unit_square_tri_mesh(1).unwrap();
        let grad = basis.grad_basis(&bcs, &mesh).unwrap();
        for q in 0..bcs.nrows() {
            for c in 0..mesh.number_of_cells() {
                for j in 0..2 {
                    let sum: f64 = (0..basis.number_of_basis()).map(|i| grad.get(q, c, i)[j]).sum();
                    prop_assert!(sum.abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn tetrahedral_bases_form_partition_of_unity(
        bcs in barycentric_points(3, 5),
        degree in 0..4usize,
        kind in prop_oneof![Just(BasisKind::Lagrange), Just(BasisKind::Bernstein)],
    ) {
        let basis = ReferenceBasis::new(kind, degree, 3);
        let phi = basis.values(&bcs).unwrap();
        for q in 0..bcs.nrows() {
            let sum: f64 = phi.row(q).iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-10, "sum = {}", sum);
        }

        let mesh = create_unit_cube_tet_mesh(1).unwrap();
        let grad = basis.grad_basis(&bcs, &mesh).unwrap();
        for q in 0..bcs.nrows() {
            for c in 0..mesh.number_of_cells() {
                for j in 0..3 {
                    let sum: f64 = (0..basis.number_of_basis()).map(|i| grad.get(q, c, i)[j]).sum();
                    prop_assert!(sum.abs() < 1e-9);
                }
            }
        }
    }
}
