//! Solid mechanics on top of `simfem`: linear elasticity and brittle fracture with
//! phase-field models.
pub mod elasticity;
pub mod materials;
pub mod phase_field;

pub use phase_field::{PhaseFieldConfig, PhaseFieldSolver, StepRecord};
