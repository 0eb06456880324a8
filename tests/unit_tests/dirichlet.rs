use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use simfem::assembly::local::{ScalarDiffusionIntegrator, ScalarSource, ScalarSourceIntegrator};
use simfem::assembly::{BilinearForm, DirichletBc, LinearForm};
use simfem::error::Error;
use simfem::mesh::procedural::create_unit_square_tri_mesh;
use simfem::solve::{CholeskySolver, LinearSolver, LuSolver};
use simfem::space::{BoundaryIndex, DofOrdering, FunctionSpace};
use std::sync::Arc;

fn quadratic(points: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_fn(points.nrows(), |i, _| points[(i, 0)].powi(2) + points[(i, 1)].powi(2))
}

#[test]
fn constructors_validate_lengths() {
    assert!(matches!(
        DirichletBc::new(vec![true, false], DVector::zeros(3)),
        Err(Error::DimensionMismatch { .. })
    ));

    let bc = DirichletBc::unconstrained(4);
    assert_eq!(bc.len(), 4);
    assert!(!bc.is_empty());
    assert_eq!(bc.num_constrained(), 0);

    let space = FunctionSpace::lagrange(Arc::new(create_unit_square_tri_mesh(2).unwrap()), 1).unwrap();
    let outside = BoundaryIndex::Indices(vec![0, 9]);
    assert!(matches!(
        DirichletBc::from_function(&space, &outside, quadratic),
        Err(Error::InvalidBoundaryIndex { index: 9, len: 9 })
    ));
}

#[test]
fn boundary_conditions_from_functions() {
    let space = FunctionSpace::lagrange(Arc::new(create_unit_square_tri_mesh(2).unwrap()), 2).unwrap();
    let points = space.interpolation_points();

    let bc = DirichletBc::on_boundary(&space, None, quadratic).unwrap();
    assert_eq!(bc.num_constrained(), 16);
    for i in (0..bc.len()).filter(|&i| bc.is_constrained()[i]) {
        let (x, y) = (points[(i, 0)], points[(i, 1)]);
        assert!((bc.values()[i] - (x * x + y * y)).abs() < 1e-14);
    }

    let left = |x: &[f64]| x[0] < 1e-12;
    let bc = DirichletBc::on_boundary(&space, Some(&left), quadratic).unwrap();
    assert_eq!(bc.num_constrained(), 5);
    assert!((0..bc.len())
        .filter(|&i| bc.is_constrained()[i])
        .all(|i| points[(i, 0)] < 1e-12));
}

#[test]
fn constrain_component_follows_ordering() {
    let mask = vec![true, false, true];
    for ordering in [DofOrdering::NodeMajor, DofOrdering::ComponentMajor] {
        let mut bc = DirichletBc::unconstrained(6);
        bc.constrain_component(&mask, 1, 2, ordering, 0.25).unwrap();
        assert_eq!(bc.num_constrained(), 2);
        for dof in [0, 2] {
            let index = ordering.global_index(dof, 1, 2, 3);
            assert!(bc.is_constrained()[index]);
            assert_eq!(bc.values()[index], 0.25);
        }
        assert!(bc.constrain_component(&mask, 2, 2, ordering, 0.0).is_err());
        assert!(bc.constrain_component(&mask[..2], 0, 2, ordering, 0.0).is_err());
    }
}

#[test]
fn quadratic_poisson_solution_is_exact() {
    // -Δu = -4 with u = x² + y² is reproduced exactly by quadratic elements
    let space = FunctionSpace::lagrange(Arc::new(create_unit_square_tri_mesh(4).unwrap()), 2).unwrap();
    let mut stiffness = {
        let mut form = BilinearForm::new(&space);
        form.add_integrator(ScalarDiffusionIntegrator::default());
        form.assembly().unwrap()
    };
    let mut rhs = {
        let mut form = LinearForm::new(&space);
        form.add_integrator(ScalarSourceIntegrator::new(ScalarSource::Constant(-4.0)));
        form.assembly().unwrap()
    };
    DirichletBc::on_boundary(&space, None, quadratic)
        .unwrap()
        .apply(&mut stiffness, &mut rhs)
        .unwrap();

    let expected = quadratic(&space.interpolation_points());
    let u_cholesky = CholeskySolver.solve(&stiffness, &rhs).unwrap();
    let u_lu = LuSolver.solve(&stiffness, &rhs).unwrap();
    assert_matrix_eq!(u_cholesky, expected, comp = abs, tol = 1e-10);
    assert_matrix_eq!(u_lu, expected, comp = abs, tol = 1e-10);
}
