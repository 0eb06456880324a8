use crate::assembly::local::{cell_quadrature, BilinearIntegrator, Coefficient};
use crate::error::Result;
use crate::space::FunctionSpace;
use nalgebra::DMatrix;

/// Integrator for the stiffness matrix of the diffusion operator $-\nabla \cdot (\kappa \nabla u)$.
///
/// The local matrix is
/// $K^K_{ij} = \int_K \kappa(x) \\, \nabla \phi_i(x) \cdot \nabla \phi_j(x) \\, \mathrm{d} V$.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarDiffusionIntegrator {
    coefficient: Coefficient,
    quadrature_order: Option<usize>,
}

impl Default for ScalarDiffusionIntegrator {
    fn default() -> Self {
        Self::new(Coefficient::default())
    }
}

impl ScalarDiffusionIntegrator {
    pub fn new(coefficient: impl Into<Coefficient>) -> Self {
        Self {
            coefficient: coefficient.into(),
            quadrature_order: None,
        }
    }

    pub fn with_quadrature_order(self, order: usize) -> Self {
        Self {
            quadrature_order: Some(order),
            ..self
        }
    }
}

impl BilinearIntegrator for ScalarDiffusionIntegrator {
    fn assembly_cell_matrix(&self, space: &FunctionSpace) -> Result<Vec<DMatrix<f64>>> {
        let rule = cell_quadrature(space, self.quadrature_order)?;
        let mesh = space.mesh();
        let nc = mesh.number_of_cells();
        self.coefficient.check(nc, rule.number_of_points())?;

        let derivatives = space.reference_basis().barycentric_derivatives(rule.bcs())?;
        let ldof = space.number_of_local_dofs();
        let measures = mesh.entity_measure();

        let mut matrices = Vec::with_capacity(nc);
        for c in 0..nc {
            let grad_lambda = mesh.grad_lambda(c);
            let mut local = DMatrix::zeros(ldof, ldof);
            for (q, (w, r)) in rule.weights().iter().zip(&derivatives).enumerate() {
                let grad_phi = r * grad_lambda;
                let scale = w * measures[c] * self.coefficient.value(c, q);
                local.gemm(scale, &grad_phi, &grad_phi.transpose(), 1.0);
            }
            matrices.push(local);
        }
        Ok(matrices)
    }
}
