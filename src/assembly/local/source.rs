use crate::assembly::local::{cell_quadrature, LinearIntegrator, NeumannSource, ScalarSource};
use crate::error::{Error, Result};
use crate::mesh::BoundaryFace;
use crate::quadrature::{quadrature_rule, Topology};
use crate::space::FunctionSpace;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Integrator for the load vector $b^K_i = \int_K f(x) \\, \phi_i(x) \\, \mathrm{d} V$.
#[derive(Debug, Clone)]
pub struct ScalarSourceIntegrator {
    source: ScalarSource,
    quadrature_order: Option<usize>,
}

impl ScalarSourceIntegrator {
    pub fn new(source: ScalarSource) -> Self {
        Self {
            source,
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

impl LinearIntegrator for ScalarSourceIntegrator {
    fn assembly_cell_vector(&self, space: &FunctionSpace) -> Result<Vec<DVector<f64>>> {
        let rule = cell_quadrature(space, self.quadrature_order)?;
        let mesh = space.mesh();
        let values = self.source.evaluate(mesh, rule.bcs())?;
        let phi = space.reference_basis().values(rule.bcs())?;
        let measures = mesh.entity_measure();

        let vectors = (0..mesh.number_of_cells())
            .map(|c| {
                let mut local = DVector::zeros(space.number_of_local_dofs());
                for (q, w) in rule.weights().iter().enumerate() {
                    local.axpy(w * measures[c] * values[(c, q)], &phi.row(q).transpose(), 1.0);
                }
                local
            })
            .collect();
        Ok(vectors)
    }
}

/// Integrator for the Neumann boundary term $b_i = \int_{\Gamma_N} g_N(x, n) \\, \phi_i(x) \\, \mathrm{d} s$.
///
/// Face quadrature points are lifted into the owning cell by inserting a zero barycentric
/// coordinate for the opposite vertex, so the cell basis can be evaluated directly. Basis
/// functions that do not belong to the face vanish there.
#[derive(Clone)]
pub struct ScalarNeumannBoundaryIntegrator {
    source: NeumannSource,
    threshold: Option<Arc<dyn Fn(&[f64]) -> bool + Send + Sync>>,
    quadrature_order: Option<usize>,
}

impl Debug for ScalarNeumannBoundaryIntegrator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarNeumannBoundaryIntegrator")
            .field("source", &self.source)
            .field("has_threshold", &self.threshold.is_some())
            .field("quadrature_order", &self.quadrature_order)
            .finish()
    }
}

impl ScalarNeumannBoundaryIntegrator {
    pub fn new(source: NeumannSource) -> Self {
        Self {
            source,
            threshold: None,
            quadrature_order: None,
        }
    }

    /// Restricts the integrator to boundary faces whose barycenter satisfies `threshold`.
    pub fn with_threshold(self, threshold: impl Fn(&[f64]) -> bool + Send + Sync + 'static) -> Self {
        Self {
            threshold: Some(Arc::new(threshold)),
            ..self
        }
    }

    pub fn with_quadrature_order(self, order: usize) -> Self {
        Self {
            quadrature_order: Some(order),
            ..self
        }
    }

    fn selected_faces<'a>(&self, space: &'a FunctionSpace) -> Vec<&'a BoundaryFace> {
        let mesh = space.mesh();
        mesh.boundary_faces()
            .iter()
            .filter(|face| match &self.threshold {
                Some(threshold) => threshold(mesh.face_barycenter(face).as_slice()),
                None => true,
            })
            .collect()
    }

    /// Local vectors of all selected boundary faces, indexed by the local basis of the owning cell.
    pub fn assembly_face_vector<'a>(
        &self,
        space: &'a FunctionSpace,
    ) -> Result<(Vec<&'a BoundaryFace>, Vec<DVector<f64>>)> {
        let mesh = space.mesh();
        let td = mesh.top_dimension();
        let order = self.quadrature_order.unwrap_or(space.degree() + 1);
        let rule = quadrature_rule(order, Topology::from_dimension(td - 1)?)?;
        let faces = self.selected_faces(space);
        let nq = rule.number_of_points();

        let values = match &self.source {
            NeumannSource::Constant(value) => DMatrix::from_element(faces.len(), nq, *value),
            NeumannSource::Cartesian(g) => {
                let gd = mesh.geo_dimension();
                let mut points = DMatrix::zeros(faces.len() * nq, gd);
                let mut normals = DMatrix::zeros(faces.len() * nq, gd);
                for (f, face) in faces.iter().enumerate() {
                    let lifted = rule.lift_to_cell_face(face.local_index);
                    let normal = mesh.face_unit_normal(face).transpose();
                    for q in 0..nq {
                        let bc: Vec<f64> = lifted.row(q).iter().copied().collect();
                        points
                            .row_mut(f * nq + q)
                            .copy_from(&mesh.cell_point(face.cell, &bc).transpose());
                        normals.row_mut(f * nq + q).copy_from(&normal);
                    }
                }
                let values = g(&points, &normals);
                if values.len() != faces.len() * nq {
                    return Err(Error::dimension_mismatch(
                        "neumann flux values",
                        faces.len() * nq,
                        values.len(),
                    ));
                }
                DMatrix::from_row_slice(faces.len(), nq, values.as_slice())
            }
            NeumannSource::Barycentric(g) => {
                let values = g(rule.bcs(), &faces);
                if values.shape() != (faces.len(), nq) {
                    return Err(Error::dimension_mismatch(
                        "neumann flux values",
                        faces.len() * nq,
                        values.nrows() * values.ncols(),
                    ));
                }
                values
            }
        };

        let basis = space.reference_basis();
        let mut vectors = Vec::with_capacity(faces.len());
        for (f, face) in faces.iter().enumerate() {
            let phi = basis.values(&rule.lift_to_cell_face(face.local_index))?;
            let measure = mesh.face_measure(face);
            let mut local = DVector::zeros(space.number_of_local_dofs());
            for (q, w) in rule.weights().iter().enumerate() {
                local.axpy(w * measure * values[(f, q)], &phi.row(q).transpose(), 1.0);
            }
            vectors.push(local);
        }
        Ok((faces, vectors))
    }
}

impl LinearIntegrator for ScalarNeumannBoundaryIntegrator {
    fn assembly_cell_vector(&self, space: &FunctionSpace) -> Result<Vec<DVector<f64>>> {
        let (faces, face_vectors) = self.assembly_face_vector(space)?;
        let ldof = space.number_of_local_dofs();
        let mut vectors = vec![DVector::zeros(ldof); space.mesh().number_of_cells()];
        for (face, local) in faces.iter().zip(face_vectors) {
            vectors[face.cell] += local;
        }
        Ok(vectors)
    }
}
