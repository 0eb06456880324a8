use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use simfem::assembly::BilinearForm;
use simfem::error::Error;
use simfem::mesh::procedural::{create_unit_cube_tet_mesh, create_unit_square_tri_mesh};
use simfem::solve::spmv;
use simfem::space::{DofOrdering, FunctionSpace};
use simfem_solid::elasticity::{ElasticTangent, LinearElasticityIntegrator};
use simfem_solid::materials::LameParameters;
use std::sync::Arc;

fn lame() -> LameParameters {
    LameParameters { mu: 1.0, lambda: 2.0 }
}

/// Nodal coefficients of a vector field sampled at the interpolation points.
fn sample(space: &FunctionSpace, ordering: DofOrdering, f: impl Fn(&[f64]) -> Vec<f64>) -> DVector<f64> {
    let points = space.interpolation_points();
    let gd = points.ncols();
    let n = space.number_of_global_dofs();
    let mut u = DVector::zeros(gd * n);
    for i in 0..n {
        let x: Vec<f64> = points.row(i).iter().copied().collect();
        for (k, value) in f(&x).into_iter().enumerate() {
            u[ordering.global_index(i, k, gd, n)] = value;
        }
    }
    u
}

#[test]
fn rigid_motions_are_in_the_kernel_2d() {
    let mesh = Arc::new(create_unit_square_tri_mesh(3).unwrap());
    for degree in [1, 2] {
        let space = FunctionSpace::lagrange(mesh.clone(), degree).unwrap();
        for ordering in [DofOrdering::NodeMajor, DofOrdering::ComponentMajor] {
            let mut form = BilinearForm::new(&space).with_ordering(ordering);
            form.add_integrator(LinearElasticityIntegrator::isotropic(&lame(), 2).unwrap());
            let k = form.assembly().unwrap();

            let dense = DMatrix::from(&k);
            assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-12);

            for motion in [
                sample(&space, ordering, |_| vec![1.0, 0.0]),
                sample(&space, ordering, |_| vec![0.0, 1.0]),
                sample(&space, ordering, |x| vec![-x[1], x[0]]),
            ] {
                let force = spmv(&k, &motion).unwrap();
                assert!(force.amax() < 1e-10, "rigid motion produced force {}", force.amax());
            }

            let stretch = sample(&space, ordering, |x| vec![x[0], 0.0]);
            assert!(spmv(&k, &stretch).unwrap().amax() > 1e-3);
        }
    }
}

#[test]
fn rigid_translation_is_in_the_kernel_3d() {
    let mesh = Arc::new(create_unit_cube_tet_mesh(2).unwrap());
    let space = FunctionSpace::lagrange(mesh, 1).unwrap();
    let mut form = BilinearForm::new(&space);
    form.add_integrator(LinearElasticityIntegrator::isotropic(&lame(), 3).unwrap());
    let k = form.assembly().unwrap();
    assert_eq!(k.nrows(), 3 * space.number_of_global_dofs());

    let translation = sample(&space, DofOrdering::NodeMajor, |_| vec![0.5, -1.0, 2.0]);
    assert!(spmv(&k, &translation).unwrap().amax() < 1e-10);
}

#[test]
fn tangent_shape_is_validated() {
    let tangent = ElasticTangent::Uniform(DMatrix::identity(4, 4));
    assert!(matches!(
        LinearElasticityIntegrator::new(tangent, 2),
        Err(Error::DimensionMismatch { .. })
    ));
    assert!(matches!(
        LinearElasticityIntegrator::isotropic(&lame(), 1),
        Err(Error::UnsupportedDimension { .. })
    ));
}

#[test]
fn integrator_dimension_must_match_mesh() {
    let mesh = Arc::new(create_unit_square_tri_mesh(1).unwrap());
    let space = FunctionSpace::lagrange(mesh, 1).unwrap();
    let mut form = BilinearForm::new(&space);
    form.add_integrator(LinearElasticityIntegrator::isotropic(&lame(), 3).unwrap());
    assert!(form.assembly().is_err());
}
