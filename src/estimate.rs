//! Estimation of discretization errors against known solutions.
use crate::assembly::local::default_quadrature_order;
use crate::error::{Error, Result};
use crate::quadrature::{quadrature_rule, QuadratureRule, Topology};
use crate::space::{FeFunction, FunctionSpace, QuadratureField};
use nalgebra::DMatrix;

fn error_quadrature(space: &FunctionSpace, order: Option<usize>) -> Result<QuadratureRule> {
    // Integrate the error with a rule that is one degree stronger than the one used for assembly
    let order = order.unwrap_or_else(|| default_quadrature_order(space.degree()) + 1);
    quadrature_rule(order, Topology::from_dimension(space.mesh().top_dimension())?)
}

/// Sums $\sum_K |K| \sum_q w_q |e_h(x_q) - e(x_q)|^2$ over all cells.
fn integrate_squared_difference(
    space: &FunctionSpace,
    rule: &QuadratureRule,
    approximate: &QuadratureField,
    exact: &DMatrix<f64>,
) -> Result<f64> {
    let mesh = space.mesh();
    let (nc, nq, n) = (mesh.number_of_cells(), rule.number_of_points(), approximate.num_components());
    if exact.nrows() != nc * nq || exact.ncols() != n {
        return Err(Error::dimension_mismatch("exact solution values", nc * nq * n, exact.len()));
    }
    let measures = mesh.entity_measure();
    let mut total = 0.0;
    for c in 0..nc {
        for (q, w) in rule.weights().iter().enumerate() {
            let squared_norm: f64 = approximate
                .get(c, q)
                .iter()
                .zip(exact.row(c * nq + q).iter())
                .map(|(u_h, u)| (u_h - u).powi(2))
                .sum();
            total += measures[c] * w * squared_norm;
        }
    }
    Ok(total)
}

/// Estimate the squared $L^2$ error $\norm{u_h - u}^2_{L^2}$ of a finite element function.
///
/// `u` maps physical points (`n x GD`) to the `n x s` values of the exact solution, where `s`
/// is the number of components of `u_h`. When no quadrature order is given, a rule one degree
/// stronger than the default assembly rule is used.
#[allow(non_snake_case)]
pub fn estimate_L2_error_squared(
    space: &FunctionSpace,
    u_h: &FeFunction,
    u: impl Fn(&DMatrix<f64>) -> DMatrix<f64>,
    quadrature_order: Option<usize>,
) -> Result<f64> {
    let rule = error_quadrature(space, quadrature_order)?;
    let approximate = space.value(u_h, rule.bcs())?;
    let exact = u(&space.mesh().bc_to_point(rule.bcs()));
    integrate_squared_difference(space, &rule, &approximate, &exact)
}

/// Estimate the $L^2$ error $\norm{u_h - u}_{L^2}$ of a finite element function.
#[allow(non_snake_case)]
pub fn estimate_L2_error(
    space: &FunctionSpace,
    u_h: &FeFunction,
    u: impl Fn(&DMatrix<f64>) -> DMatrix<f64>,
    quadrature_order: Option<usize>,
) -> Result<f64> {
    estimate_L2_error_squared(space, u_h, u, quadrature_order).map(f64::sqrt)
}

/// Estimate the squared $H^1$ *seminorm* error $\seminorm{u_h - u}^2_{H^1}$ of a finite element function.
///
/// `u_grad` maps physical points (`n x GD`) to `n x (s * GD)` gradient values, with the
/// `s x GD` Jacobian of each point stored row by row.
#[allow(non_snake_case)]
pub fn estimate_H1_seminorm_error_squared(
    space: &FunctionSpace,
    u_h: &FeFunction,
    u_grad: impl Fn(&DMatrix<f64>) -> DMatrix<f64>,
    quadrature_order: Option<usize>,
) -> Result<f64> {
    let rule = error_quadrature(space, quadrature_order)?;
    let approximate = space.grad_value(u_h, rule.bcs())?;
    let exact = u_grad(&space.mesh().bc_to_point(rule.bcs()));
    integrate_squared_difference(space, &rule, &approximate, &exact)
}

/// Estimate the $H^1$ *seminorm* error $\seminorm{u_h - u}_{H^1}$ of a finite element function.
#[allow(non_snake_case)]
pub fn estimate_H1_seminorm_error(
    space: &FunctionSpace,
    u_h: &FeFunction,
    u_grad: impl Fn(&DMatrix<f64>) -> DMatrix<f64>,
    quadrature_order: Option<usize>,
) -> Result<f64> {
    estimate_H1_seminorm_error_squared(space, u_h, u_grad, quadrature_order).map(f64::sqrt)
}
