//! Direct solvers for the sparse linear systems produced by assembly.
use crate::error::{Error, Result};
use nalgebra::DVector;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Solves $A x = b$ for a square sparse matrix.
pub trait LinearSolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>>;
}

fn check_system(matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<()> {
    if matrix.nrows() != matrix.ncols() {
        return Err(Error::dimension_mismatch("square system", matrix.nrows(), matrix.ncols()));
    }
    if matrix.nrows() != rhs.len() {
        return Err(Error::dimension_mismatch("right-hand side", matrix.nrows(), rhs.len()));
    }
    Ok(())
}

/// Sparse Cholesky factorization, for symmetric positive definite systems.
///
/// Systems with Dirichlet conditions applied by
/// [`apply_dirichlet_bc_csr`](crate::assembly::global::apply_dirichlet_bc_csr) keep their
/// symmetry, so this is the default for every driver.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CholeskySolver;

impl LinearSolver for CholeskySolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        check_system(matrix, rhs)?;
        let csc = CscMatrix::from(matrix);
        let cholesky = CscCholesky::factor(&csc).map_err(|err| Error::SingularSystem(err.to_string()))?;
        let solution = cholesky.solve(rhs);
        Ok(solution.column(0).into_owned())
    }
}

/// Dense LU factorization with partial pivoting, for small non-symmetric systems.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LuSolver;

impl LinearSolver for LuSolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        check_system(matrix, rhs)?;
        let dense = nalgebra::DMatrix::from(matrix);
        dense
            .lu()
            .solve(rhs)
            .ok_or_else(|| Error::SingularSystem("LU factorization encountered a zero pivot".to_string()))
    }
}

/// Computes $y = A x$.
pub fn spmv(matrix: &CsrMatrix<f64>, x: &DVector<f64>) -> Result<DVector<f64>> {
    if matrix.ncols() != x.len() {
        return Err(Error::dimension_mismatch("matrix-vector product", matrix.ncols(), x.len()));
    }
    let y = matrix
        .row_iter()
        .map(|row| {
            row.col_indices()
                .iter()
                .zip(row.values())
                .map(|(&j, &a_ij)| a_ij * x[j])
                .sum::<f64>()
        })
        .collect::<Vec<_>>();
    Ok(DVector::from_vec(y))
}

/// Computes $a A + b B$ for matrices of the same shape.
pub fn linear_combination(a: f64, lhs: &CsrMatrix<f64>, b: f64, rhs: &CsrMatrix<f64>) -> Result<CsrMatrix<f64>> {
    if lhs.nrows() != rhs.nrows() || lhs.ncols() != rhs.ncols() {
        return Err(Error::dimension_mismatch("matrix sum", lhs.nrows(), rhs.nrows()));
    }
    Ok(&(lhs * a) + &(rhs * b))
}
