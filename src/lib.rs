//! Finite element discretizations on simplicial meshes.
//!
//! The pipeline runs from [`mesh`] and [`quadrature`] through [`basis`] evaluation and the
//! degrees of freedom of a [`space`] to the integrators and global operators of [`assembly`],
//! followed by a direct [`solve`]. The [`heat`] module drives the whole pipeline for the
//! heat equation.
pub mod assembly;
pub mod basis;
pub mod error;
pub mod estimate;
pub mod heat;
pub mod io;
pub mod mesh;
pub mod quadrature;
pub mod solve;
pub mod space;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate vtkio;

pub use error::{Error, Result};
