//! Polynomial bases on simplices in barycentric coordinates.
//!
//! Local basis functions of degree $p$ on a simplex of topological dimension $d$ are indexed by
//! multi-indices $\alpha \in \mathbb{N}^{d+1}$ with $|\alpha| = p$. Two families share this
//! indexing:
//!
//! - Lagrange: $\phi_\alpha(\lambda) = \prod_k \ell_{\alpha_k}(\lambda_k)$ with
//!   $\ell_a(t) = \frac{1}{a!} \prod_{m=0}^{a-1} (p t - m)$, which is nodal at the lattice points
//!   $\lambda = \alpha / p$.
//! - Bernstein: $B_\alpha(\lambda) = \frac{p!}{\alpha!} \prod_k \lambda_k^{\alpha_k}$.
//!
//! Both families form a partition of unity.
use crate::error::{Error, Result};
use crate::mesh::SimplexMesh;
use itertools::Itertools;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// The polynomial family used for local shape functions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BasisKind {
    #[default]
    Lagrange,
    Bernstein,
}

impl BasisKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Lagrange => "Lagrange basis",
            Self::Bernstein => "Bernstein basis",
        }
    }
}

/// Number of local basis functions of the given degree, `binomial(p + d, d)`.
pub fn number_of_local_dofs(degree: usize, top_dim: usize) -> usize {
    num::integer::binomial(degree + top_dim, top_dim)
}

/// Enumerates all multi-indices with `top_dim + 1` entries summing to `degree`.
///
/// The first entry is non-increasing along the enumeration, and the remaining entries are
/// enumerated recursively in the same fashion. For degree 2 on triangles this gives
/// `[2,0,0], [1,1,0], [1,0,1], [0,2,0], [0,1,1], [0,0,2]`.
pub fn multi_index_matrix(degree: usize, top_dim: usize) -> Vec<Vec<usize>> {
    fn enumerate(total: usize, entries: usize) -> Vec<Vec<usize>> {
        if entries == 1 {
            return vec![vec![total]];
        }
        let mut result = Vec::new();
        for rest in 0..=total {
            for tail in enumerate(rest, entries - 1) {
                let mut alpha = Vec::with_capacity(entries);
                alpha.push(total - rest);
                alpha.extend(tail);
                result.push(alpha);
            }
        }
        result
    }
    enumerate(degree, top_dim + 1)
}

/// The position of a multi-index in the enumeration of [`multi_index_matrix`].
///
/// With $s_k = \sum_{j \geq k} \alpha_j$ the position is
/// $\sum_{k=1}^{d} \binom{s_k + d - k}{d - k + 1}$.
pub fn multi_index_to_number(alpha: &[usize]) -> usize {
    let d = alpha.len() - 1;
    let mut number = 0;
    let mut tail_sum: usize = alpha[1..].iter().sum();
    for k in 1..=d {
        number += num::integer::binomial(tail_sum + d - k, d - k + 1);
        tail_sum -= alpha[k];
    }
    number
}

/// Index tuples of the independent components of a symmetric order-`m` derivative tensor in
/// `geometry_dim` dimensions.
///
/// Tuples are enumerated as base-`geometry_dim` numbers (most significant digit first) and only
/// non-increasing tuples are kept, which gives `[xx, yx, yy]` for `m = 2` in two dimensions.
pub fn derivative_component_indices(geometry_dim: usize, m: usize) -> Vec<Vec<usize>> {
    let count = geometry_dim.pow(m as u32);
    (0..count)
        .map(|mut i| {
            let mut digits = vec![0; m];
            for digit in digits.iter_mut().rev() {
                *digit = i % geometry_dim;
                i /= geometry_dim;
            }
            digits
        })
        .filter(|digits| digits.windows(2).all(|w| w[0] >= w[1]))
        .collect()
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|i| i as f64).product()
}

/// Values of basis functions (or their derivatives) at quadrature points of cells.
///
/// Shape `(NQ, NC, ldof, N)`: quadrature points, cells, local basis functions and components.
/// Tables that do not depend on the cell have `NC = 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisTable {
    shape: [usize; 4],
    data: Vec<f64>,
}

impl BasisTable {
    pub fn zeros(num_points: usize, num_cells: usize, num_basis: usize, num_components: usize) -> Self {
        let shape = [num_points, num_cells, num_basis, num_components];
        Self {
            shape,
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// `(NQ, NC, ldof, N)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        let [a, b, c, d] = self.shape;
        (a, b, c, d)
    }

    fn offset(&self, q: usize, c: usize, i: usize) -> usize {
        let [_, nc, nb, n] = self.shape;
        ((q * nc + c) * nb + i) * n
    }

    /// All components for the given point, cell and basis function.
    pub fn get(&self, q: usize, c: usize, i: usize) -> &[f64] {
        let offset = self.offset(q, c, i);
        &self.data[offset..offset + self.shape[3]]
    }

    pub fn get_mut(&mut self, q: usize, c: usize, i: usize) -> &mut [f64] {
        let offset = self.offset(q, c, i);
        let n = self.shape[3];
        &mut self.data[offset..offset + n]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Evaluator for a local basis of fixed family, degree and topological dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceBasis {
    kind: BasisKind,
    degree: usize,
    top_dim: usize,
    multi_index: Vec<Vec<usize>>,
}

impl ReferenceBasis {
    pub fn new(kind: BasisKind, degree: usize, top_dim: usize) -> Self {
        Self {
            kind,
            degree,
            top_dim,
            multi_index: multi_index_matrix(degree, top_dim),
        }
    }

    pub fn kind(&self) -> BasisKind {
        self.kind
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn top_dimension(&self) -> usize {
        self.top_dim
    }

    pub fn number_of_basis(&self) -> usize {
        self.multi_index.len()
    }

    pub fn multi_index(&self) -> &[Vec<usize>] {
        &self.multi_index
    }

    fn check_points(&self, bcs: &DMatrix<f64>) -> Result<()> {
        if bcs.ncols() != self.top_dim + 1 {
            return Err(Error::dimension_mismatch(
                "barycentric coordinates",
                self.top_dim + 1,
                bcs.ncols(),
            ));
        }
        Ok(())
    }

    /// Univariate factors and their derivatives, `table[a][k]` for exponent `a` and
    /// barycentric coordinate `k` of a single point.
    fn univariate_tables(&self, bc: &[f64]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let p = self.degree;
        let pf = p as f64;
        let mut values = vec![vec![1.0; bc.len()]; p + 1];
        let mut derivatives = vec![vec![0.0; bc.len()]; p + 1];
        for (k, &t) in bc.iter().enumerate() {
            match self.kind {
                BasisKind::Lagrange => {
                    // Q_a = prod_{m < a} (p t - m), Q_a' by the product rule, then divide by a!
                    let (mut q, mut dq) = (1.0, 0.0);
                    for a in 1..=p {
                        let factor = pf * t - (a - 1) as f64;
                        dq = dq * factor + pf * q;
                        q *= factor;
                        let a_factorial = factorial(a);
                        values[a][k] = q / a_factorial;
                        derivatives[a][k] = dq / a_factorial;
                    }
                }
                BasisKind::Bernstein => {
                    // t^a / a! and its derivative t^(a-1) / (a-1)!
                    for a in 1..=p {
                        values[a][k] = values[a - 1][k] * t / a as f64;
                        derivatives[a][k] = values[a - 1][k];
                    }
                }
            }
        }
        (values, derivatives)
    }

    fn scale(&self) -> f64 {
        match self.kind {
            BasisKind::Lagrange => 1.0,
            BasisKind::Bernstein => factorial(self.degree),
        }
    }

    /// Basis values at every point, `NQ x ldof`.
    pub fn values(&self, bcs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_points(bcs)?;
        let scale = self.scale();
        let mut phi = DMatrix::zeros(bcs.nrows(), self.number_of_basis());
        for q in 0..bcs.nrows() {
            let bc: Vec<f64> = bcs.row(q).iter().copied().collect();
            let (values, _) = self.univariate_tables(&bc);
            for (i, alpha) in self.multi_index.iter().enumerate() {
                phi[(q, i)] = scale * alpha.iter().enumerate().map(|(k, &a)| values[a][k]).product::<f64>();
            }
        }
        Ok(phi)
    }

    /// Partial derivatives with respect to each barycentric coordinate, treated as independent
    /// variables. One `ldof x (TD + 1)` matrix per point.
    pub fn barycentric_derivatives(&self, bcs: &DMatrix<f64>) -> Result<Vec<DMatrix<f64>>> {
        self.check_points(bcs)?;
        let scale = self.scale();
        let nv = self.top_dim + 1;
        let mut result = Vec::with_capacity(bcs.nrows());
        for q in 0..bcs.nrows() {
            let bc: Vec<f64> = bcs.row(q).iter().copied().collect();
            let (values, derivatives) = self.univariate_tables(&bc);
            let mut r = DMatrix::zeros(self.number_of_basis(), nv);
            for (i, alpha) in self.multi_index.iter().enumerate() {
                for j in 0..nv {
                    let mut product = scale;
                    for (k, &a) in alpha.iter().enumerate() {
                        product *= if k == j { derivatives[a][k] } else { values[a][k] };
                    }
                    r[(i, j)] = product;
                }
            }
            result.push(r);
        }
        Ok(result)
    }

    /// Basis values with shape `(NQ, 1, ldof)` (a single component).
    pub fn basis(&self, bcs: &DMatrix<f64>) -> Result<BasisTable> {
        let phi = self.values(bcs)?;
        let mut table = BasisTable::zeros(bcs.nrows(), 1, self.number_of_basis(), 1);
        for q in 0..bcs.nrows() {
            for i in 0..self.number_of_basis() {
                table.get_mut(q, 0, i)[0] = phi[(q, i)];
            }
        }
        Ok(table)
    }

    /// Physical gradients with shape `(NQ, NC, ldof, GD)`.
    pub fn grad_basis(&self, bcs: &DMatrix<f64>, mesh: &SimplexMesh) -> Result<BasisTable> {
        self.check_mesh(mesh)?;
        let derivatives = self.barycentric_derivatives(bcs)?;
        let (nc, gd) = (mesh.number_of_cells(), mesh.geo_dimension());
        let mut table = BasisTable::zeros(bcs.nrows(), nc, self.number_of_basis(), gd);
        for (q, r) in derivatives.iter().enumerate() {
            for c in 0..nc {
                let grad = r * mesh.grad_lambda(c);
                for i in 0..self.number_of_basis() {
                    for (dst, src) in table.get_mut(q, c, i).iter_mut().zip(grad.row(i).iter()) {
                        *dst = *src;
                    }
                }
            }
        }
        Ok(table)
    }

    fn check_mesh(&self, mesh: &SimplexMesh) -> Result<()> {
        if mesh.top_dimension() != self.top_dim {
            return Err(Error::dimension_mismatch(
                "mesh topological dimension",
                self.top_dim,
                mesh.top_dimension(),
            ));
        }
        Ok(())
    }

    /// All independent `m`-th order partial derivatives of the basis functions, with shape
    /// `(NQ, NC, ldof, N)` where `N = binomial(GD + m - 1, m)` and the components are ordered as
    /// in [`derivative_component_indices`].
    ///
    /// For `m = 0` the function values are returned with shape `(NQ, 1, ldof, 1)`, and for
    /// `m > p` all derivatives vanish.
    ///
    /// Only available for the Bernstein family, whose derivatives are again Bernstein polynomials:
    /// $D^m B^p_\alpha = \frac{p!}{(p-m)!} \sum_{|\beta| = m} \frac{1}{\beta!}
    ///   B^{p-m}_{\alpha - \beta} \sum_{\sigma \in S_m} \bigotimes_k \nabla\lambda_{\sigma(k)}$.
    pub fn grad_m_basis(&self, bcs: &DMatrix<f64>, mesh: &SimplexMesh, m: usize) -> Result<BasisTable> {
        if self.kind != BasisKind::Bernstein {
            return Err(Error::NotImplemented {
                capability: "grad_m_basis",
                variant: self.kind.name(),
            });
        }
        if m == 0 {
            return self.basis(bcs);
        }
        self.check_mesh(mesh)?;
        self.check_points(bcs)?;

        let p = self.degree;
        let (nq, nc, gd) = (bcs.nrows(), mesh.number_of_cells(), mesh.geo_dimension());
        let components = derivative_component_indices(gd, m);
        let mut table = BasisTable::zeros(nq, nc, self.number_of_basis(), components.len());
        if m > p {
            return Ok(table);
        }

        let lower = ReferenceBasis::new(BasisKind::Bernstein, p - m, self.top_dim).values(bcs)?;
        let betas = multi_index_matrix(m, self.top_dim);
        let permutations: Vec<Vec<usize>> = (0..m).permutations(m).collect();

        for c in 0..nc {
            let grad_lambda = mesh.grad_lambda(c);
            for beta in &betas {
                let beta_factorial: f64 = beta.iter().map(|&b| factorial(b)).product();
                let coefficient = factorial(p) / factorial(p - m) / beta_factorial;
                // Barycentric index of each tensor factor, repeated according to beta
                let factors: Vec<usize> = beta
                    .iter()
                    .enumerate()
                    .flat_map(|(k, &b)| std::iter::repeat(k).take(b))
                    .collect();
                let symmetric: Vec<f64> = components
                    .iter()
                    .map(|component| {
                        permutations
                            .iter()
                            .map(|sigma| {
                                component
                                    .iter()
                                    .enumerate()
                                    .map(|(k, &j)| grad_lambda[(factors[sigma[k]], j)])
                                    .product::<f64>()
                            })
                            .sum()
                    })
                    .collect();

                for (i, alpha) in self.multi_index.iter().enumerate() {
                    if alpha.iter().zip(beta).any(|(a, b)| a < b) {
                        continue;
                    }
                    let reduced: Vec<usize> = alpha.iter().zip(beta).map(|(a, b)| a - b).collect();
                    let lower_index = multi_index_to_number(&reduced);
                    for q in 0..nq {
                        let scale = coefficient * lower[(q, lower_index)];
                        for (dst, s) in table.get_mut(q, c, i).iter_mut().zip(&symmetric) {
                            *dst += scale * s;
                        }
                    }
                }
            }
        }
        Ok(table)
    }

    /// The derivative operator on Bernstein coefficients of one cell.
    ///
    /// Maps the coefficients of a degree `p` polynomial to the coefficients of its partial
    /// derivative along the physical axis `direction`, expressed in the Bernstein basis of degree
    /// `p - 1`. With $\partial_k B^p_\alpha = p B^{p-1}_{\alpha - e_k}$, entry
    /// `(β, β + e_k)` accumulates `p ∂λ_k/∂x_direction`. The result has shape
    /// `(ldof(p - 1), ldof(p))`. For `p = 0` a single zero row is returned.
    pub fn partial_matrix(&self, mesh: &SimplexMesh, cell: usize, direction: usize) -> Result<DMatrix<f64>> {
        if self.kind != BasisKind::Bernstein {
            return Err(Error::NotImplemented {
                capability: "partial_matrix",
                variant: self.kind.name(),
            });
        }
        self.check_mesh(mesh)?;
        if direction >= mesh.geo_dimension() {
            return Err(Error::dimension_mismatch(
                "derivative direction",
                mesh.geo_dimension(),
                direction + 1,
            ));
        }
        if cell >= mesh.number_of_cells() {
            return Err(Error::dimension_mismatch("cell index", mesh.number_of_cells(), cell + 1));
        }

        let p = self.degree;
        if p == 0 {
            return Ok(DMatrix::zeros(1, 1));
        }
        let grad_lambda = mesh.grad_lambda(cell);
        let lower = multi_index_matrix(p - 1, self.top_dim);
        let mut matrix = DMatrix::zeros(lower.len(), self.number_of_basis());
        for (row, beta) in lower.iter().enumerate() {
            for k in 0..=self.top_dim {
                let mut alpha = beta.clone();
                alpha[k] += 1;
                matrix[(row, multi_index_to_number(&alpha))] += p as f64 * grad_lambda[(k, direction)];
            }
        }
        Ok(matrix)
    }

    /// The lattice points `alpha / p` in barycentric coordinates, one row per basis function.
    ///
    /// For degree zero the barycenter is returned.
    pub fn lattice_points(&self) -> DMatrix<f64> {
        let nv = self.top_dim + 1;
        DMatrix::from_fn(self.number_of_basis(), nv, |i, k| {
            if self.degree == 0 {
                1.0 / nv as f64
            } else {
                self.multi_index[i][k] as f64 / self.degree as f64
            }
        })
    }
}

/// Matrix mapping Bernstein coefficients to Lagrange (nodal) coefficients of the same polynomial.
///
/// Entry `(k, j)` is the value of the Bernstein polynomial `j` at lattice point `k`.
pub fn bernstein_to_lagrange(degree: usize, top_dim: usize) -> Result<DMatrix<f64>> {
    let bernstein = ReferenceBasis::new(BasisKind::Bernstein, degree, top_dim);
    bernstein.values(&bernstein.lattice_points())
}

/// Matrix mapping Lagrange (nodal) coefficients to Bernstein coefficients, the inverse of
/// [`bernstein_to_lagrange`].
pub fn lagrange_to_bernstein(degree: usize, top_dim: usize) -> Result<DMatrix<f64>> {
    bernstein_to_lagrange(degree, top_dim)?
        .try_inverse()
        .ok_or_else(|| Error::SingularSystem("Bernstein collocation matrix".to_string()))
}
