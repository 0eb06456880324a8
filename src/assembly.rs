//! Assembly of global matrices and vectors from local integrators.
mod dirichlet;
pub mod form;
pub mod global;
pub mod local;

pub use dirichlet::DirichletBc;
pub use form::{BilinearForm, LinearForm};
