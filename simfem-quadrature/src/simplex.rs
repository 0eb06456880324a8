//! Collapsed-product Gauss rules for the reference simplices.
//!
//! The rules are obtained by mapping tensor-product Gauss rules on the unit hypercube onto the
//! simplex with the Duffy transformation. They are not the most economical rules available,
//! but they exist for any polynomial degree and all weights are strictly positive.

use crate::univariate::gauss_unit_interval;
use crate::{BarycentricRule, Error, Rule};

/// Number of Gauss points per direction needed to integrate polynomials of degree
/// `strength + extra` exactly in one dimension.
fn points_per_direction(strength: usize, extra: usize) -> usize {
    ((strength + extra + 2) / 2).max(1)
}

/// Gauss rule for the reference interval in barycentric coordinates `(1 - t, t)`.
///
/// The rule integrates polynomials of degree `2 n - 1` exactly.
pub fn interval(num_points: usize) -> Rule<2> {
    let (weights, points) = gauss_unit_interval(num_points);
    let points = points.into_iter().map(|[t]| [1.0 - t, t]).collect();
    (weights, points)
}

/// Collapsed Gauss rule for the reference triangle in barycentric coordinates.
///
/// Uses `n` points per collapsed direction, for a total of `n^2` points. The rule integrates
/// polynomials of degree `2 n - 2` exactly.
pub fn triangle(num_points_per_direction: usize) -> Rule<3> {
    let n = num_points_per_direction;
    let (wu, u) = gauss_unit_interval(n);
    let (wv, v) = gauss_unit_interval(n);

    let mut weights = Vec::with_capacity(n * n);
    let mut points = Vec::with_capacity(n * n);
    for (wi, [ui]) in wu.iter().zip(&u) {
        for (wj, [vj]) in wv.iter().zip(&v) {
            let x = *ui;
            let y = vj * (1.0 - ui);
            // The reference triangle has area 1/2, hence the factor 2 for unit total weight
            weights.push(2.0 * wi * wj * (1.0 - ui));
            points.push([1.0 - x - y, x, y]);
        }
    }
    (weights, points)
}

/// Collapsed Gauss rule for the reference tetrahedron in barycentric coordinates.
///
/// Uses `n` points per collapsed direction, for a total of `n^3` points. The rule integrates
/// polynomials of degree `2 n - 3` exactly.
pub fn tetrahedron(num_points_per_direction: usize) -> Rule<4> {
    let n = num_points_per_direction;
    let (w1d, p1d) = gauss_unit_interval(n);

    let mut weights = Vec::with_capacity(n * n * n);
    let mut points = Vec::with_capacity(n * n * n);
    for (wi, [u]) in w1d.iter().zip(&p1d) {
        for (wj, [v]) in w1d.iter().zip(&p1d) {
            for (wk, [w]) in w1d.iter().zip(&p1d) {
                let x = *u;
                let y = v * (1.0 - u);
                let z = w * (1.0 - u) * (1.0 - v);
                let jacobian = (1.0 - u) * (1.0 - u) * (1.0 - v);
                weights.push(6.0 * wi * wj * wk * jacobian);
                points.push([1.0 - x - y - z, x, y, z]);
            }
        }
    }
    (weights, points)
}

/// Returns a rule for the reference simplex of the given dimension that integrates polynomials
/// of (total) degree `strength` exactly.
///
/// Dimension zero denotes the point, whose only rule is the single point with unit weight.
///
/// # Errors
///
/// Returns [`Error::NoRuleAvailable`] for dimensions larger than three.
pub fn simplex_rule(dim: usize, strength: usize) -> Result<BarycentricRule, Error> {
    fn to_dynamic<const D: usize>((weights, points): Rule<D>) -> BarycentricRule {
        (weights, points.into_iter().map(|p| p.to_vec()).collect())
    }

    match dim {
        0 => Ok((vec![1.0], vec![vec![1.0]])),
        1 => Ok(to_dynamic(interval(points_per_direction(strength, 0)))),
        2 => Ok(to_dynamic(triangle(points_per_direction(strength, 1)))),
        3 => Ok(to_dynamic(tetrahedron(points_per_direction(strength, 2)))),
        _ => Err(Error::NoRuleAvailable),
    }
}
