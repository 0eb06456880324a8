//! Implicit time stepping for the linear heat equation
//! $\partial_t p - \nabla \cdot (\kappa \nabla p) = f$ with Dirichlet boundary data.
use crate::assembly::local::{
    default_quadrature_order, layered_coefficient, Coefficient, ScalarDiffusionIntegrator, ScalarMassIntegrator, ScalarSource,
    ScalarSourceIntegrator,
};
use crate::assembly::{BilinearForm, DirichletBc, LinearForm};
use crate::error::{Error, Result};
use crate::io::vtk::{MeshDataSetBuilder, VtkOutput};
use crate::mesh::SimplexMesh;
use crate::quadrature::{quadrature_rule, Topology};
use crate::solve::{linear_combination, spmv, CholeskySolver, LinearSolver};
use crate::space::{BoundaryIndex, FunctionSpace, QuadratureField};
use eyre::WrapErr;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Data of a heat conduction problem.
///
/// All callables are batched: they receive an `n x GD` matrix of physical points and return
/// `n` values.
pub trait HeatProblem {
    /// Start and end time of the simulation.
    fn duration(&self) -> [f64; 2];

    fn source(&self, points: &DMatrix<f64>, time: f64) -> DVector<f64>;

    fn dirichlet(&self, points: &DMatrix<f64>, time: f64) -> DVector<f64>;

    /// The exact solution, if known.
    fn solution(&self, _points: &DMatrix<f64>, _time: f64) -> Option<DVector<f64>> {
        None
    }
}

/// Heat diffusivity of the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diffusivity {
    Uniform(f64),
    /// Distinct values on two disjoint sets of cells, e.g. the fuel and the cladding of a fuel
    /// rod. Cells in neither set do not conduct.
    Layered {
        inner_cells: Vec<usize>,
        inner: f64,
        cladding_cells: Vec<usize>,
        cladding: f64,
    },
}

impl Default for Diffusivity {
    fn default() -> Self {
        Self::Uniform(1.0)
    }
}

impl Diffusivity {
    /// The value that scales the stiffness matrix in the time stepping operator when no
    /// explicit scale is configured.
    pub fn reference_value(&self) -> f64 {
        match self {
            Self::Uniform(value) => *value,
            Self::Layered { cladding, .. } => *cladding,
        }
    }

    /// The diffusion coefficient of each cell.
    pub fn coefficient(&self, num_cells: usize) -> Result<Coefficient> {
        match self {
            Self::Uniform(value) => Ok(Coefficient::Constant(*value)),
            Self::Layered {
                inner_cells,
                inner,
                cladding_cells,
                cladding,
            } => {
                let layers = [(inner_cells.clone(), *inner), (cladding_cells.clone(), *cladding)];
                Ok(Coefficient::Cell(layered_coefficient(num_cells, &layers)?))
            }
        }
    }
}

/// Configuration of [`HeatEquationSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    /// Number of time steps. The time step size is the duration divided by `nt`.
    pub nt: usize,
    pub degree: usize,
    pub diffusivity: Diffusivity,
    /// The factor `α` in `A = M + α K τ`. Defaults to [`Diffusivity::reference_value`].
    pub stiffness_scale: Option<f64>,
    /// Order of the cell rule. Defaults to [`default_quadrature_order`] of `degree`.
    pub quadrature_order: Option<usize>,
    pub output: Option<VtkOutput>,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            nt: 10,
            degree: 1,
            diffusivity: Diffusivity::default(),
            stiffness_scale: None,
            quadrature_order: None,
            output: None,
        }
    }
}

impl HeatConfig {
    /// The configured quadrature order, or the default order for the degree of the space.
    pub fn effective_quadrature_order(&self) -> usize {
        self.quadrature_order
            .unwrap_or_else(|| default_quadrature_order(self.degree))
    }
}

/// Initial temperature.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialCondition {
    Uniform(f64),
    /// One value per degree of freedom.
    Values(DVector<f64>),
}

/// The temperature after an accepted time step.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatSnapshot {
    pub step: usize,
    pub time: f64,
    pub temperature: DVector<f64>,
}

/// Backward Euler solver for the heat equation.
///
/// Step `n = 0` keeps the initial condition without solving. Every later step `n < nt`
/// assembles the source at `t_n`, forms `A = M + α K τ` and `b = M p + τ F`, applies the
/// Dirichlet data at `t_n` and solves for the new temperature.
pub struct HeatEquationSolver<P> {
    space: FunctionSpace,
    problem: P,
    is_boundary: Vec<bool>,
    config: HeatConfig,
    tau: f64,
    mass: CsrMatrix<f64>,
    system: CsrMatrix<f64>,
    temperature: DVector<f64>,
    next_step: usize,
}

impl<P: HeatProblem> HeatEquationSolver<P> {
    /// Sets up the space and the time-independent operators.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is inconsistent with the mesh, e.g. when `nt` is zero,
    /// the boundary index set does not match the degrees of freedom or layers overlap.
    pub fn new(
        mesh: Arc<SimplexMesh>,
        problem: P,
        boundary: BoundaryIndex,
        initial: InitialCondition,
        config: HeatConfig,
    ) -> Result<Self> {
        if config.nt == 0 {
            return Err(Error::config("number of time steps must be positive"));
        }
        let [t0, t1] = problem.duration();
        if t1.partial_cmp(&t0) != Some(std::cmp::Ordering::Greater) {
            return Err(Error::config(format!("invalid duration [{t0}, {t1}]")));
        }
        let tau = (t1 - t0) / config.nt as f64;

        let space = FunctionSpace::lagrange(mesh, config.degree)?;
        let gdof = space.number_of_global_dofs();
        let is_boundary = boundary.to_mask(gdof)?;
        let temperature = match initial {
            InitialCondition::Uniform(value) => DVector::from_element(gdof, value),
            InitialCondition::Values(values) if values.len() == gdof => values,
            InitialCondition::Values(values) => {
                return Err(Error::dimension_mismatch("initial temperature", gdof, values.len()))
            }
        };

        let order = config.effective_quadrature_order();
        let kappa = config.diffusivity.coefficient(space.mesh().number_of_cells())?;
        let mass = {
            let mut form = BilinearForm::new(&space);
            form.add_integrator(ScalarMassIntegrator::default().with_quadrature_order(order));
            form.assembly()?
        };
        let stiffness = {
            let mut form = BilinearForm::new(&space);
            form.add_integrator(ScalarDiffusionIntegrator::new(kappa).with_quadrature_order(order));
            form.assembly()?
        };
        let alpha = config
            .stiffness_scale
            .unwrap_or_else(|| config.diffusivity.reference_value());
        let system = linear_combination(1.0, &mass, alpha * tau, &stiffness)?;
        debug!("Heat system with {gdof} unknowns, τ = {tau}, α = {alpha}");

        Ok(Self {
            space,
            problem,
            is_boundary,
            config,
            tau,
            mass,
            system,
            temperature,
            next_step: 0,
        })
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.space
    }

    pub fn temperature(&self) -> &DVector<f64> {
        &self.temperature
    }

    pub fn time_step_size(&self) -> f64 {
        self.tau
    }

    pub fn time(&self, step: usize) -> f64 {
        self.problem.duration()[0] + step as f64 * self.tau
    }

    pub fn is_finished(&self) -> bool {
        self.next_step >= self.config.nt
    }

    fn source_vector(&self, time: f64) -> Result<DVector<f64>> {
        let mesh = self.space.mesh();
        let order = self.config.effective_quadrature_order();
        let rule = quadrature_rule(order, Topology::from_dimension(mesh.top_dimension())?)?;
        let (nc, nq) = (mesh.number_of_cells(), rule.number_of_points());
        let values = self.problem.source(&mesh.bc_to_point(rule.bcs()), time);
        if values.len() != nc * nq {
            return Err(Error::dimension_mismatch("heat source values", nc * nq, values.len()));
        }
        let field = QuadratureField::from_scalar_matrix(&DMatrix::from_row_slice(nc, nq, values.as_slice()));
        let mut form = LinearForm::new(&self.space);
        form.add_integrator(
            ScalarSourceIntegrator::new(ScalarSource::Quadrature(field)).with_quadrature_order(order),
        );
        form.assembly()
    }

    fn dirichlet_bc(&self, time: f64) -> Result<DirichletBc> {
        let points = self.space.interpolation_points();
        let values = self.problem.dirichlet(&points, time);
        if values.len() != points.nrows() {
            return Err(Error::dimension_mismatch("dirichlet values", points.nrows(), values.len()));
        }
        DirichletBc::new(self.is_boundary.clone(), values)
    }

    /// Performs the next time step and returns its snapshot, or `None` after the last step.
    pub fn advance(&mut self) -> eyre::Result<Option<HeatSnapshot>> {
        if self.is_finished() {
            return Ok(None);
        }
        let step = self.next_step;
        let time = self.time(step);
        if step > 0 {
            self.solve_step(time)
                .wrap_err_with(|| format!("heat step {step} at t = {time} failed"))?;
        }
        self.next_step += 1;
        info!(
            "Heat step {step}/{} at t = {time:.6e}, max temperature {:.6e}",
            self.config.nt,
            self.temperature.max()
        );

        let snapshot = HeatSnapshot {
            step,
            time,
            temperature: self.temperature.clone(),
        };
        if let Some(output) = &self.config.output {
            self.export_snapshot(output, &snapshot)?;
        }
        Ok(Some(snapshot))
    }

    fn solve_step(&mut self, time: f64) -> Result<()> {
        let f = self.source_vector(time)?;
        let mut b = spmv(&self.mass, &self.temperature)? + f * self.tau;
        let mut a = self.system.clone();
        self.dirichlet_bc(time)?.apply(&mut a, &mut b)?;
        self.temperature = CholeskySolver.solve(&a, &b)?;
        Ok(())
    }

    fn export_snapshot(&self, output: &VtkOutput, snapshot: &HeatSnapshot) -> eyre::Result<()> {
        let mesh = self.space.mesh();
        // Vertex degrees of freedom coincide with the mesh nodes
        let nodal = &snapshot.temperature.as_slice()[..mesh.number_of_nodes()];
        let path = output.snapshot_path(snapshot.step);
        MeshDataSetBuilder::from_mesh(mesh)
            .with_title(format!("{} t = {}", output.basename, snapshot.time))
            .with_point_scalar_attributes("temp", 1, nodal)
            .try_export(&path)
            .wrap_err_with(|| format!("failed to write heat snapshot {}", path.display()))
    }

    /// Runs all remaining time steps and returns their snapshots.
    pub fn solve(&mut self) -> eyre::Result<Vec<HeatSnapshot>> {
        let mut history = Vec::with_capacity(self.config.nt);
        while let Some(snapshot) = self.advance()? {
            history.push(snapshot);
        }
        Ok(history)
    }

    /// Maximum nodal deviation from the exact solution at the current time, if the problem
    /// provides one.
    pub fn max_nodal_error(&self) -> Option<f64> {
        let time = self.time(self.next_step.saturating_sub(1));
        let points = self.space.interpolation_points();
        let exact = self.problem.solution(&points, time)?;
        (exact.len() == self.temperature.len()).then(|| (&self.temperature - exact).amax())
    }
}
