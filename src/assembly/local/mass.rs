use crate::assembly::local::{cell_quadrature, BilinearIntegrator, Coefficient};
use crate::error::Result;
use crate::space::FunctionSpace;
use nalgebra::DMatrix;

/// Integrator for the (weighted) mass matrix.
///
/// Given a cell $K$ with local basis functions $\phi_i$, the local matrix consists of
/// $s \times s$ blocks
///
/// $$
/// M^K_{ij} := I^s \int_{K} \rho(x) \\, \phi_i(x) \\, \phi_j(x) \\, \mathrm{d} V,
/// $$
///
/// where $s$ is the solution dimension and $\rho$ is the coefficient (a density). For $s = 1$ this
/// is the mass matrix of e.g. the heat equation, for $s = d$ the mass matrix of a vector field.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarMassIntegrator {
    coefficient: Coefficient,
    quadrature_order: Option<usize>,
    solution_dim: usize,
}

impl Default for ScalarMassIntegrator {
    fn default() -> Self {
        Self::new(Coefficient::default())
    }
}

impl ScalarMassIntegrator {
    pub fn new(coefficient: impl Into<Coefficient>) -> Self {
        Self {
            coefficient: coefficient.into(),
            quadrature_order: None,
            solution_dim: 1,
        }
    }

    pub fn with_quadrature_order(self, order: usize) -> Self {
        Self {
            quadrature_order: Some(order),
            ..self
        }
    }

    pub fn with_solution_dim(self, solution_dim: usize) -> Self {
        Self { solution_dim, ..self }
    }
}

impl BilinearIntegrator for ScalarMassIntegrator {
    fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    fn assembly_cell_matrix(&self, space: &FunctionSpace) -> Result<Vec<DMatrix<f64>>> {
        let rule = cell_quadrature(space, self.quadrature_order)?;
        let mesh = space.mesh();
        let nc = mesh.number_of_cells();
        self.coefficient.check(nc, rule.number_of_points())?;

        let phi = space.reference_basis().values(rule.bcs())?;
        let (ldof, s) = (space.number_of_local_dofs(), self.solution_dim);
        let measures = mesh.entity_measure();

        let mut matrices = Vec::with_capacity(nc);
        for c in 0..nc {
            let mut scalar_mass = DMatrix::zeros(ldof, ldof);
            for (q, w) in rule.weights().iter().enumerate() {
                let scale = w * measures[c] * self.coefficient.value(c, q);
                let phi_q = phi.row(q);
                // Symmetric rank-one update
                scalar_mass.ger(scale, &phi_q.transpose(), &phi_q.transpose(), 1.0);
            }

            let mut local = DMatrix::zeros(s * ldof, s * ldof);
            for i in 0..ldof {
                for j in 0..ldof {
                    for k in 0..s {
                        local[(s * i + k, s * j + k)] = scalar_mass[(i, j)];
                    }
                }
            }
            matrices.push(local);
        }
        Ok(matrices)
    }
}
