//! Staggered solution of brittle fracture with a phase-field model.
//!
//! Every load step alternates between the displacement problem with a frozen phase field and
//! the phase-field problem
//! $$
//! \left(\frac{G_c}{l_0} + 2 \mathcal{H}\right) d - G_c l_0 \Delta d = 2 \mathcal{H}
//! $$
//! with the history field $\mathcal{H}$ frozen, until the change of both fields falls below the
//! tolerance.
use crate::elasticity::{ElasticTangent, LinearElasticityIntegrator};
use crate::materials::{
    voigt_dim, EnergyDegradation, FractureMaterial, HistoryField, MaterialState, ModelType, PhaseFieldParameters,
    PhaseFractureMaterial,
};
use eyre::{eyre, WrapErr};
use itertools::izip;
use log::{debug, info, warn};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use simfem::assembly::local::{
    default_quadrature_order, Coefficient, ScalarDiffusionIntegrator, ScalarMassIntegrator, ScalarSource,
    ScalarSourceIntegrator,
};
use simfem::assembly::{BilinearForm, DirichletBc, LinearForm};
use simfem::error::{Error, Result};
use simfem::io::vtk::{MeshDataSetBuilder, VtkOutput};
use simfem::mesh::SimplexMesh;
use simfem::quadrature::{quadrature_rule, QuadratureRule, Topology};
use simfem::solve::{spmv, CholeskySolver, LinearSolver};
use simfem::space::{DofOrdering, FeFunction, FunctionSpace, QuadratureField};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A coordinate direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "x")]
    X,
    #[serde(rename = "y")]
    Y,
    #[serde(rename = "z")]
    Z,
}

impl Direction {
    pub fn index(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "z" => Ok(Self::Z),
            _ => Err(Error::config(format!("unknown direction `{s}`, expected x, y or z"))),
        }
    }
}

/// Whether the reaction force is measured on a boundary.
///
/// Both roles prescribe displacements. The reaction force of a step is the sum of the internal
/// forces at the degrees of freedom of all `Force` boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryRole {
    Force,
    Displacement,
}

/// The prescribed displacement of a boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Load {
    /// The same value in every load step.
    Fixed(f64),
    /// One value per load step.
    Sequence(Vec<f64>),
}

impl Load {
    pub fn value(&self, step: usize) -> Option<f64> {
        match self {
            Self::Fixed(value) => Some(*value),
            Self::Sequence(values) => values.get(step).copied(),
        }
    }

    fn num_steps(&self) -> Option<usize> {
        match self {
            Self::Fixed(_) => None,
            Self::Sequence(values) => Some(values.len()),
        }
    }
}

/// Predicate on the coordinates of a degree of freedom.
pub type DofMarker = Arc<dyn Fn(&[f64]) -> bool + Send + Sync>;

#[derive(Clone)]
struct BoundaryCondition {
    role: BoundaryRole,
    marker: DofMarker,
    load: Load,
    direction: Option<Direction>,
}

impl fmt::Debug for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryCondition")
            .field("role", &self.role)
            .field("load", &self.load)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

/// Configuration of [`PhaseFieldSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseFieldConfig {
    pub degree: usize,
    /// Maximum number of staggered iterations per load step.
    pub maxit: usize,
    pub tolerance: f64,
    pub model_type: ModelType,
    pub ordering: DofOrdering,
    /// Order of the cell rule on which the history field lives. Defaults to the assembly order
    /// for the degree.
    pub quadrature_order: Option<usize>,
    pub degradation: EnergyDegradation,
    /// Fail a load step whose staggered iteration does not converge within `maxit`, instead of
    /// recording it and continuing.
    pub strict_convergence: bool,
    pub output: Option<VtkOutput>,
}

impl Default for PhaseFieldConfig {
    fn default() -> Self {
        Self {
            degree: 1,
            maxit: 30,
            tolerance: 1e-5,
            model_type: ModelType::Hybrid,
            ordering: DofOrdering::NodeMajor,
            quadrature_order: None,
            degradation: EnergyDegradation::default(),
            strict_convergence: false,
            output: None,
        }
    }
}

/// The outcome of a load step, one point of the force-displacement curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub applied_displacement: f64,
    pub reaction_force: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Change of the fields in the last staggered iteration.
    pub error: f64,
}

/// Selects cells for refinement.
pub trait CellMarker {
    fn mark(&self, mesh: &SimplexMesh, state: &MaterialState) -> Result<Vec<bool>>;
}

/// Marks cells close to the expected path of a straight crack.
///
/// A cell is marked when its measure exceeds `min_measure`, its closest vertex lies within
/// `half_width` of the plane `x[normal_axis] = offset`, and the smallest vertex coordinate
/// along `tangent_axis` lies strictly inside `tangent_range`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrackPathMarker {
    pub min_measure: f64,
    pub normal_axis: usize,
    pub offset: f64,
    pub half_width: f64,
    pub tangent_axis: usize,
    pub tangent_range: [f64; 2],
}

impl Default for CrackPathMarker {
    fn default() -> Self {
        Self {
            min_measure: 1e-5,
            normal_axis: 1,
            offset: 0.5,
            half_width: 0.005,
            tangent_axis: 0,
            tangent_range: [0.49, 1.01],
        }
    }
}

impl CellMarker for CrackPathMarker {
    fn mark(&self, mesh: &SimplexMesh, _state: &MaterialState) -> Result<Vec<bool>> {
        let gd = mesh.geo_dimension();
        for axis in [self.normal_axis, self.tangent_axis] {
            if axis >= gd {
                return Err(Error::dimension_mismatch("crack path axis", gd, axis));
            }
        }
        let measures = mesh.entity_measure();
        let marked = (0..mesh.number_of_cells())
            .map(|c| {
                let vertices = mesh.cell(c);
                let distance = vertices
                    .iter()
                    .map(|&v| (mesh.node(v)[self.normal_axis] - self.offset).abs())
                    .fold(f64::INFINITY, f64::min);
                let tangent_min = vertices
                    .iter()
                    .map(|&v| mesh.node(v)[self.tangent_axis])
                    .fold(f64::INFINITY, f64::min);
                let [t0, t1] = self.tangent_range;
                measures[c] > self.min_measure && distance < self.half_width && tangent_min > t0 && tangent_min < t1
            })
            .collect();
        Ok(marked)
    }
}

/// The result of refining a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Adaptation {
    pub mesh: SimplexMesh,
    /// Interpolates nodal values of the old mesh to the nodes of the new mesh (`new x old`).
    pub node_prolongation: CsrMatrix<f64>,
    /// The cell of the old mesh that contains each new cell.
    pub cell_parents: Vec<usize>,
}

/// Refines the marked cells of a mesh.
pub trait MeshAdaptor {
    fn refine(&self, mesh: &SimplexMesh, marked: &[bool]) -> Result<Adaptation>;
}

struct Refinement {
    marker: Box<dyn CellMarker>,
    adaptor: Box<dyn MeshAdaptor>,
}

/// Driver of quasi-static brittle fracture simulations.
pub struct PhaseFieldSolver {
    params: PhaseFieldParameters,
    config: PhaseFieldConfig,
    material: PhaseFractureMaterial,
    space: FunctionSpace,
    displacement: FeFunction,
    phase: FeFunction,
    history: HistoryField,
    conditions: Vec<BoundaryCondition>,
    records: Vec<StepRecord>,
    refinement: Option<Refinement>,
}

/// Displacement constraints of a load step.
struct StepConstraints {
    bc: DirichletBc,
    force_indices: Vec<usize>,
    applied_displacement: f64,
}

impl PhaseFieldSolver {
    /// # Errors
    ///
    /// Fails for geometry dimensions other than 2 and 3 and for inconsistent configurations.
    pub fn new(mesh: Arc<SimplexMesh>, params: PhaseFieldParameters, config: PhaseFieldConfig) -> Result<Self> {
        let gd = mesh.geo_dimension();
        voigt_dim(gd)?;
        if config.maxit == 0 {
            return Err(Error::config("maxit must be at least 1"));
        }
        if !(config.tolerance > 0.0) {
            return Err(Error::config(format!("tolerance must be positive, got {}", config.tolerance)));
        }
        let material = PhaseFractureMaterial::create(config.model_type, params.lame, config.degradation);
        let space = FunctionSpace::lagrange(mesh, config.degree)?;
        let rule = Self::cell_rule(&space, &config)?;
        let displacement = space.function(gd, config.ordering);
        let phase = space.function(1, DofOrdering::default());
        let history = HistoryField::zeros(space.mesh().number_of_cells(), rule.number_of_points());
        Ok(Self {
            params,
            config,
            material,
            space,
            displacement,
            phase,
            history,
            conditions: Vec::new(),
            records: Vec::new(),
            refinement: None,
        })
    }

    fn cell_rule(space: &FunctionSpace, config: &PhaseFieldConfig) -> Result<QuadratureRule> {
        let order = config
            .quadrature_order
            .unwrap_or_else(|| default_quadrature_order(space.degree()));
        quadrature_rule(order, Topology::from_dimension(space.mesh().top_dimension())?)
    }

    fn quadrature_order(&self) -> usize {
        self.config
            .quadrature_order
            .unwrap_or_else(|| default_quadrature_order(self.space.degree()))
    }

    /// Prescribes the displacement of the degrees of freedom selected by `marker`.
    ///
    /// Without a direction all components are prescribed. `Force` boundaries need a direction,
    /// which is also the direction of the measured reaction force.
    pub fn add_boundary_condition(
        &mut self,
        role: BoundaryRole,
        marker: impl Fn(&[f64]) -> bool + Send + Sync + 'static,
        load: Load,
        direction: Option<Direction>,
    ) -> Result<&mut Self> {
        let gd = self.space.mesh().geo_dimension();
        if let Some(direction) = direction {
            if direction.index() >= gd {
                return Err(Error::config(format!("direction {direction:?} does not exist in {gd}D")));
            }
        } else if role == BoundaryRole::Force {
            return Err(Error::config("force boundaries need a direction"));
        }
        if load.num_steps() == Some(0) {
            return Err(Error::config("load sequence is empty"));
        }
        self.conditions.push(BoundaryCondition {
            role,
            marker: Arc::new(marker),
            load,
            direction,
        });
        Ok(self)
    }

    /// Enables refinement of the cells selected by `marker` after every load step.
    ///
    /// Only available for degree one, where nodal values can be prolongated directly.
    pub fn set_adaptive_refinement(
        &mut self,
        marker: impl CellMarker + 'static,
        adaptor: impl MeshAdaptor + 'static,
    ) -> Result<()> {
        if self.space.degree() != 1 {
            return Err(Error::NotImplemented {
                capability: "adaptive refinement",
                variant: "degree other than 1",
            });
        }
        self.refinement = Some(Refinement {
            marker: Box::new(marker),
            adaptor: Box::new(adaptor),
        });
        Ok(())
    }

    pub fn params(&self) -> &PhaseFieldParameters {
        &self.params
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.space
    }

    pub fn mesh(&self) -> &Arc<SimplexMesh> {
        self.space.mesh()
    }

    pub fn displacement(&self) -> &FeFunction {
        &self.displacement
    }

    pub fn phase(&self) -> &FeFunction {
        &self.phase
    }

    pub fn history(&self) -> &HistoryField {
        &self.history
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// The force-displacement curve recorded so far.
    pub fn force_displacement_curve(&self) -> (Vec<f64>, Vec<f64>) {
        self.records
            .iter()
            .map(|record| (record.applied_displacement, record.reaction_force))
            .unzip()
    }

    /// Number of load steps, given by the length of the load sequences.
    pub fn number_of_steps(&self) -> Result<usize> {
        let mut lengths = self.conditions.iter().filter_map(|bc| bc.load.num_steps());
        match lengths.next() {
            None => Ok(1),
            Some(first) => match lengths.find(|&len| len != first) {
                Some(other) => Err(Error::dimension_mismatch("load sequence length", first, other)),
                None => Ok(first),
            },
        }
    }

    fn constraints(&self, step: usize) -> Result<StepConstraints> {
        let gd = self.space.mesh().geo_dimension();
        let gdof = self.space.number_of_global_dofs();
        let ordering = self.config.ordering;
        let points = self.space.interpolation_points();
        let coordinates: Vec<Vec<f64>> = (0..gdof).map(|i| points.row(i).iter().copied().collect()).collect();

        let mut bc = DirichletBc::unconstrained(gd * gdof);
        let mut force_indices = Vec::new();
        let mut applied_displacement = None;
        for condition in &self.conditions {
            let value = condition
                .load
                .value(step)
                .ok_or_else(|| Error::config(format!("no load value for step {step}")))?;
            let mask: Vec<bool> = coordinates.iter().map(|x| (condition.marker)(x)).collect();
            let components: Vec<usize> = match condition.direction {
                Some(direction) => vec![direction.index()],
                None => (0..gd).collect(),
            };
            for &k in &components {
                bc.constrain_component(&mask, k, gd, ordering, value)?;
            }
            if condition.role == BoundaryRole::Force {
                applied_displacement.get_or_insert(value);
                for i in (0..gdof).filter(|&i| mask[i]) {
                    for &k in &components {
                        force_indices.push(ordering.global_index(i, k, gd, gdof));
                    }
                }
            }
        }
        force_indices.sort_unstable();
        force_indices.dedup();
        Ok(StepConstraints {
            bc,
            force_indices,
            applied_displacement: applied_displacement.unwrap_or(0.0),
        })
    }

    fn state(&self) -> MaterialState<'_> {
        MaterialState {
            space: &self.space,
            displacement: &self.displacement,
            phase: &self.phase,
        }
    }

    /// Stiffness matrix of the displacement problem for the current phase field.
    fn displacement_stiffness(&self, rule: &QuadratureRule) -> Result<CsrMatrix<f64>> {
        let gd = self.space.mesh().geo_dimension();
        let tangent = self.material.elastic_matrix(&self.state(), rule.bcs())?;
        let integrator = LinearElasticityIntegrator::new(ElasticTangent::Quadrature(tangent), gd)?
            .with_quadrature_order(self.quadrature_order());
        let mut form = BilinearForm::new(&self.space).with_ordering(self.config.ordering);
        form.add_integrator(integrator);
        form.assembly()
    }

    /// Solves the phase-field problem for the current history field.
    fn solve_phase(&self) -> Result<DVector<f64>> {
        let PhaseFieldParameters { gc, l0, .. } = self.params;
        let order = self.quadrature_order();
        let history = self.history.values();
        let mut reaction = QuadratureField::zeros(history.num_cells(), history.num_points(), 1);
        let mut source = reaction.clone();
        for (r, s, &h) in izip!(reaction.as_mut_slice(), source.as_mut_slice(), history.as_slice()) {
            *r = gc / l0 + 2.0 * h;
            *s = 2.0 * h;
        }

        let mut bilinear = BilinearForm::new(&self.space);
        bilinear
            .add_integrator(ScalarMassIntegrator::new(Coefficient::Quadrature(reaction)).with_quadrature_order(order))
            .add_integrator(ScalarDiffusionIntegrator::new(gc * l0).with_quadrature_order(order));
        let a = bilinear.assembly()?;

        let mut linear = LinearForm::new(&self.space);
        linear.add_integrator(ScalarSourceIntegrator::new(ScalarSource::Quadrature(source)).with_quadrature_order(order));
        let b = linear.assembly()?;
        CholeskySolver.solve(&a, &b)
    }

    /// Performs the staggered iteration of a load step and records its outcome.
    pub fn advance(&mut self, step: usize) -> eyre::Result<StepRecord> {
        let constraints = self.constraints(step)?;
        let rule = Self::cell_rule(&self.space, &self.config)?;

        let mut stiffness = None;
        let mut converged = false;
        let mut error = f64::INFINITY;
        let mut iterations = 0;
        for iteration in 1..=self.config.maxit {
            iterations = iteration;

            let k = self.displacement_stiffness(&rule)?;
            let mut a = k.clone();
            let mut b = DVector::zeros(k.nrows());
            constraints.bc.apply(&mut a, &mut b)?;
            let u = CholeskySolver
                .solve(&a, &b)
                .wrap_err_with(|| format!("displacement solve failed in load step {step}"))?;
            stiffness = Some(k);
            let u_norm = u.norm();
            let u_change = (&u - self.displacement.coefficients()).norm() / u_norm.max(f64::MIN_POSITIVE);
            *self.displacement.coefficients_mut() = u;

            let energy = self.material.driving_energy(&self.state(), rule.bcs())?;
            self.history.update(&energy)?;

            let d = self
                .solve_phase()
                .wrap_err_with(|| format!("phase-field solve failed in load step {step}"))?;
            let d_change = (&d - self.phase.coefficients()).amax();
            *self.phase.coefficients_mut() = d;

            error = if u_norm > 0.0 { u_change.max(d_change) } else { d_change };
            debug!("Load step {step}, iteration {iteration}: error {error:.3e}");
            if error < self.config.tolerance {
                converged = true;
                break;
            }
        }

        let stiffness = stiffness.ok_or_else(|| eyre!("no staggered iteration was performed"))?;
        let internal_forces = spmv(&stiffness, self.displacement.coefficients())?;
        let reaction_force: f64 = constraints.force_indices.iter().map(|&i| internal_forces[i]).sum();

        if !converged {
            warn!(
                "Load step {step} did not converge within {} iterations (error {error:.3e})",
                self.config.maxit
            );
            if self.config.strict_convergence {
                return Err(eyre!(
                    "load step {step} did not converge within {} iterations (error {error:.3e})",
                    self.config.maxit
                ));
            }
        }

        let record = StepRecord {
            step,
            applied_displacement: constraints.applied_displacement,
            reaction_force,
            iterations,
            converged,
            error,
        };
        info!(
            "Load step {step}: displacement {:.6e}, reaction force {:.6e}, {} iterations",
            record.applied_displacement, record.reaction_force, record.iterations
        );

        if let Some(output) = &self.config.output {
            self.export(output, step)
                .wrap_err_with(|| format!("failed to write snapshot of load step {step}"))?;
        }
        self.records.push(record.clone());
        self.adapt()
            .wrap_err_with(|| format!("mesh adaptation after load step {step} failed"))?;
        Ok(record)
    }

    /// Runs all load steps and returns the records.
    pub fn solve(&mut self) -> eyre::Result<&[StepRecord]> {
        let num_steps = self.number_of_steps()?;
        for step in 0..num_steps {
            self.advance(step)?;
        }
        Ok(&self.records)
    }

    fn adapt(&mut self) -> Result<()> {
        let Some(refinement) = &self.refinement else {
            return Ok(());
        };
        let mesh = self.space.mesh().clone();
        let marked = refinement.marker.mark(&mesh, &self.state())?;
        if !marked.iter().any(|&flag| flag) {
            return Ok(());
        }
        let Adaptation {
            mesh: refined,
            node_prolongation,
            cell_parents,
        } = refinement.adaptor.refine(&mesh, &marked)?;

        let (old_nodes, new_nodes) = (mesh.number_of_nodes(), refined.number_of_nodes());
        if node_prolongation.nrows() != new_nodes || node_prolongation.ncols() != old_nodes {
            return Err(Error::dimension_mismatch(
                "node prolongation",
                new_nodes * old_nodes,
                node_prolongation.nrows() * node_prolongation.ncols(),
            ));
        }
        if cell_parents.len() != refined.number_of_cells() {
            return Err(Error::dimension_mismatch(
                "cell parents",
                refined.number_of_cells(),
                cell_parents.len(),
            ));
        }

        let gd = mesh.geo_dimension();
        let ordering = self.config.ordering;
        let components = (0..gd)
            .map(|k| spmv(&node_prolongation, &self.displacement.component(k)))
            .collect::<Result<Vec<_>>>()?;
        let mut displacement = DVector::zeros(gd * new_nodes);
        for (k, values) in components.iter().enumerate() {
            for (i, value) in values.iter().enumerate() {
                displacement[ordering.global_index(i, k, gd, new_nodes)] = *value;
            }
        }
        let phase = spmv(&node_prolongation, self.phase.coefficients())?;
        let history = self.history.transfer_to_children(&cell_parents)?;

        info!(
            "Refined {} of {} cells, the mesh now has {} cells",
            marked.iter().filter(|&&flag| flag).count(),
            mesh.number_of_cells(),
            refined.number_of_cells()
        );
        self.space = FunctionSpace::lagrange(Arc::new(refined), 1)?;
        self.displacement = FeFunction::new(displacement, gd, ordering)?;
        self.phase = FeFunction::scalar(phase);
        self.history = history;
        Ok(())
    }

    fn export(&self, output: &VtkOutput, step: usize) -> eyre::Result<()> {
        let mesh = self.space.mesh();
        let nn = mesh.number_of_nodes();
        let gd = mesh.geo_dimension();
        // Vertex degrees of freedom coincide with the mesh nodes
        let damage = &self.phase.coefficients().as_slice()[..nn];
        let mut displacement = Vec::with_capacity(3 * nn);
        for i in 0..nn {
            for k in 0..3 {
                displacement.push(if k < gd { self.displacement.component_value(i, k) } else { 0.0 });
            }
        }
        let history = self.history.values().cell_averages();
        MeshDataSetBuilder::from_mesh(mesh)
            .with_title(format!("{} step {step}", output.basename))
            .with_point_scalar_attributes("damage", 1, damage)
            .with_point_scalar_attributes("uh", 3, &displacement)
            .with_cell_scalar_attributes("H", 1, &history)
            .try_export(output.snapshot_path(step))
    }
}
