use matrixcompare::assert_scalar_eq;
use nalgebra::{DMatrix, DVector};
use simfem::error::Error;
use simfem::estimate::{estimate_H1_seminorm_error, estimate_L2_error, estimate_L2_error_squared};
use simfem::mesh::procedural::{create_unit_cube_tet_mesh, create_unit_square_tri_mesh};
use simfem::space::{DofOrdering, FeFunction, FunctionSpace};
use std::f64::consts::PI;
use std::sync::Arc;

fn unit_square_space(cells: usize, degree: usize) -> FunctionSpace {
    FunctionSpace::lagrange(Arc::new(create_unit_square_tri_mesh(cells).unwrap()), degree).unwrap()
}

#[test]
fn interpolated_polynomials_have_no_error() {
    let space = unit_square_space(3, 2);
    let u = |p: &DMatrix<f64>| DMatrix::from_fn(p.nrows(), 1, |i, _| p[(i, 0)] * p[(i, 1)] - 2.0 * p[(i, 0)]);
    let u_grad = |p: &DMatrix<f64>| {
        DMatrix::from_fn(p.nrows(), 2, |i, k| if k == 0 { p[(i, 1)] - 2.0 } else { p[(i, 0)] })
    };
    let u_h = FeFunction::scalar(space.interpolate(|p| u(p).column(0).into_owned()).unwrap());
    assert!(estimate_L2_error(&space, &u_h, u, None).unwrap() < 1e-13);
    assert!(estimate_H1_seminorm_error(&space, &u_h, u_grad, None).unwrap() < 1e-13);
}

#[test]
fn errors_of_the_zero_function_are_norms() {
    let space = unit_square_space(2, 1);
    let zero = FeFunction::scalar(DVector::zeros(space.number_of_global_dofs()));

    let one = |p: &DMatrix<f64>| DMatrix::from_element(p.nrows(), 1, 1.0);
    assert_scalar_eq!(estimate_L2_error(&space, &zero, one, None).unwrap(), 1.0, comp = abs, tol = 1e-12);

    // |x|_{H^1} = 1 and ||x||_{L^2}^2 = 1/3 on the unit square
    let x_grad = |p: &DMatrix<f64>| DMatrix::from_fn(p.nrows(), 2, |_, k| if k == 0 { 1.0 } else { 0.0 });
    let x = |p: &DMatrix<f64>| p.columns(0, 1).into_owned();
    assert_scalar_eq!(
        estimate_H1_seminorm_error(&space, &zero, x_grad, None).unwrap(),
        1.0,
        comp = abs,
        tol = 1e-12
    );
    assert_scalar_eq!(
        estimate_L2_error_squared(&space, &zero, x, Some(4)).unwrap(),
        1.0 / 3.0,
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn errors_of_vector_functions() {
    let space = FunctionSpace::lagrange(Arc::new(create_unit_cube_tet_mesh(2).unwrap()), 1).unwrap();
    let n = space.number_of_global_dofs();
    let u_h = FeFunction::zeros(n, 3, DofOrdering::NodeMajor);
    // Each component is constant, so the squared error is 1 + 4 + 9
    let u = |p: &DMatrix<f64>| DMatrix::from_fn(p.nrows(), 3, |_, k| (k + 1) as f64);
    assert_scalar_eq!(estimate_L2_error(&space, &u_h, u, None).unwrap(), 14f64.sqrt(), comp = abs, tol = 1e-12);
}

#[test]
fn exact_values_of_wrong_shape_are_rejected() {
    let space = unit_square_space(2, 1);
    let u_h = FeFunction::scalar(DVector::zeros(space.number_of_global_dofs()));
    let u = |p: &DMatrix<f64>| DMatrix::zeros(p.nrows(), 2);
    assert!(matches!(
        estimate_L2_error(&space, &u_h, u, None),
        Err(Error::DimensionMismatch { .. })
    ));
    let u_grad = |p: &DMatrix<f64>| DMatrix::zeros(p.nrows(), 1);
    assert!(estimate_H1_seminorm_error(&space, &u_h, u_grad, None).is_err());
}

#[test]
fn interpolation_error_decreases_under_refinement() {
    let u = |p: &DMatrix<f64>| DMatrix::from_fn(p.nrows(), 1, |i, _| (PI * p[(i, 0)]).sin() * (PI * p[(i, 1)]).sin());
    let errors: Vec<f64> = [4, 8]
        .into_iter()
        .map(|cells| {
            let space = unit_square_space(cells, 1);
            let u_h = FeFunction::scalar(space.interpolate(|p| u(p).column(0).into_owned()).unwrap());
            estimate_L2_error(&space, &u_h, u, None).unwrap()
        })
        .collect();
    assert!(errors[0] / errors[1] > 3.0);
}
