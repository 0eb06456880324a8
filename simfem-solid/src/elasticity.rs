use crate::materials::{linear_elastic_matrix, voigt_dim, LameParameters};
use nalgebra::DMatrix;
use simfem::assembly::local::{default_quadrature_order, BilinearIntegrator};
use simfem::error::{Error, Result};
use simfem::quadrature::{quadrature_rule, QuadratureRule, Topology};
use simfem::space::{FunctionSpace, QuadratureField};

/// The material tangent in Voigt notation used by [`LinearElasticityIntegrator`].
#[derive(Debug, Clone, PartialEq)]
pub enum ElasticTangent {
    Uniform(DMatrix<f64>),
    /// A row-major Voigt matrix at every quadrature point of every cell.
    Quadrature(QuadratureField),
}

/// Integrator for the stiffness matrix of linear elasticity,
/// $K^K = \int_K B^T D B \\, \mathrm{d} V$.
///
/// The solution dimension equals the geometry dimension. Local matrices are ordered by basis
/// function first, so that the components belonging to one basis function are contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearElasticityIntegrator {
    tangent: ElasticTangent,
    geometry_dim: usize,
    quadrature_order: Option<usize>,
}

impl LinearElasticityIntegrator {
    pub fn new(tangent: ElasticTangent, geometry_dim: usize) -> Result<Self> {
        let n = voigt_dim(geometry_dim)?;
        match &tangent {
            ElasticTangent::Uniform(d) if d.shape() != (n, n) => {
                return Err(Error::dimension_mismatch("elastic tangent", n * n, d.len()))
            }
            ElasticTangent::Quadrature(field) if field.num_components() != n * n => {
                return Err(Error::dimension_mismatch(
                    "elastic tangent",
                    n * n,
                    field.num_components(),
                ))
            }
            _ => {}
        }
        Ok(Self {
            tangent,
            geometry_dim,
            quadrature_order: None,
        })
    }

    /// The undamaged isotropic material.
    pub fn isotropic(lame: &LameParameters, geometry_dim: usize) -> Result<Self> {
        Self::new(
            ElasticTangent::Uniform(linear_elastic_matrix(lame, geometry_dim)?),
            geometry_dim,
        )
    }

    /// Sets the order of the cell rule. A quadrature tangent must have been evaluated at the
    /// points of the same rule.
    pub fn with_quadrature_order(self, order: usize) -> Self {
        Self {
            quadrature_order: Some(order),
            ..self
        }
    }

    fn rule(&self, space: &FunctionSpace) -> Result<QuadratureRule> {
        let order = self
            .quadrature_order
            .unwrap_or_else(|| default_quadrature_order(space.degree()));
        quadrature_rule(order, Topology::from_dimension(space.mesh().top_dimension())?)
    }

    fn tangent_at(&self, cell: usize, point: usize) -> DMatrix<f64> {
        match &self.tangent {
            ElasticTangent::Uniform(d) => d.clone(),
            ElasticTangent::Quadrature(field) => {
                let n = (field.num_components() as f64).sqrt().round() as usize;
                field.matrix(cell, point, n)
            }
        }
    }
}

/// The strain-displacement matrix for gradients of the basis functions (`ldof x GD`).
fn strain_displacement_matrix(grad_phi: &DMatrix<f64>, geometry_dim: usize) -> Result<DMatrix<f64>> {
    let n = voigt_dim(geometry_dim)?;
    let gd = geometry_dim;
    if grad_phi.ncols() != gd {
        return Err(Error::dimension_mismatch("basis gradients", gd, grad_phi.ncols()));
    }
    let ldof = grad_phi.nrows();
    let mut b = DMatrix::zeros(n, gd * ldof);
    for i in 0..ldof {
        let g = grad_phi.row(i);
        for k in 0..gd {
            b[(k, gd * i + k)] = g[k];
        }
        if gd == 2 {
            b[(2, gd * i)] = g[1];
            b[(2, gd * i + 1)] = g[0];
        } else {
            // xy, yz, zx
            b[(3, gd * i)] = g[1];
            b[(3, gd * i + 1)] = g[0];
            b[(4, gd * i + 1)] = g[2];
            b[(4, gd * i + 2)] = g[1];
            b[(5, gd * i)] = g[2];
            b[(5, gd * i + 2)] = g[0];
        }
    }
    Ok(b)
}

impl BilinearIntegrator for LinearElasticityIntegrator {
    fn solution_dim(&self) -> usize {
        self.geometry_dim
    }

    fn assembly_cell_matrix(&self, space: &FunctionSpace) -> Result<Vec<DMatrix<f64>>> {
        let mesh = space.mesh();
        if mesh.geo_dimension() != self.geometry_dim {
            return Err(Error::dimension_mismatch(
                "elasticity geometry dimension",
                self.geometry_dim,
                mesh.geo_dimension(),
            ));
        }
        let rule = self.rule(space)?;
        let (nc, nq) = (mesh.number_of_cells(), rule.number_of_points());
        if let ElasticTangent::Quadrature(field) = &self.tangent {
            if field.num_cells() != nc || field.num_points() != nq {
                return Err(Error::dimension_mismatch(
                    "elastic tangent points",
                    nc * nq,
                    field.num_cells() * field.num_points(),
                ));
            }
        }

        let derivatives = space.reference_basis().barycentric_derivatives(rule.bcs())?;
        let measures = mesh.entity_measure();
        let n = self.geometry_dim * space.number_of_local_dofs();

        let mut matrices = Vec::with_capacity(nc);
        for c in 0..nc {
            let grad_lambda = mesh.grad_lambda(c);
            let mut local = DMatrix::zeros(n, n);
            for (q, (w, r)) in rule.weights().iter().zip(&derivatives).enumerate() {
                let b = strain_displacement_matrix(&(r * grad_lambda), self.geometry_dim)?;
                let db = self.tangent_at(c, q) * &b;
                local.gemm(w * measures[c], &b.transpose(), &db, 1.0);
            }
            matrices.push(local);
        }
        Ok(matrices)
    }
}
