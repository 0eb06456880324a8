use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use simfem::error::Error;
use simfem::mesh::procedural::create_unit_square_tri_mesh;
use simfem::quadrature::{quadrature_rule, Topology};
use simfem::space::{DofOrdering, FeFunction, FunctionSpace, QuadratureField};
use simfem_solid::materials::{
    linear_elastic_matrix, spectral_energy_split, strain_energy_density, AnisotropicModel, DeviatoricModel,
    EnergyDegradation, FractureMaterial, HistoryField, HybridModel, IsotropicModel, LameParameters, MaterialState,
    ModelType, PhaseFieldParameters, PhaseFractureMaterial, SpectralModel,
};
use std::collections::HashMap;
use std::sync::Arc;

fn params(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries.iter().map(|(key, value)| (key.to_string(), *value)).collect()
}

fn lame() -> LameParameters {
    LameParameters { mu: 2.0, lambda: 3.0 }
}

/// A P1 space on the unit square with the displacement `u = strain * x` and a constant phase.
fn homogeneous_state(strain: [[f64; 2]; 2], phase: f64) -> (FunctionSpace, FeFunction, FeFunction) {
    let mesh = Arc::new(create_unit_square_tri_mesh(2).unwrap());
    let space = FunctionSpace::lagrange(mesh, 1).unwrap();
    let points = space.interpolation_points();
    let n = space.number_of_global_dofs();
    let mut coefficients = DVector::zeros(2 * n);
    for i in 0..n {
        let (x, y) = (points[(i, 0)], points[(i, 1)]);
        for k in 0..2 {
            coefficients[DofOrdering::NodeMajor.global_index(i, k, 2, n)] = strain[k][0] * x + strain[k][1] * y;
        }
    }
    let displacement = FeFunction::new(coefficients, 2, DofOrdering::NodeMajor).unwrap();
    let phase = FeFunction::scalar(DVector::from_element(n, phase));
    (space, displacement, phase)
}

fn triangle_points() -> DMatrix<f64> {
    quadrature_rule(2, Topology::Triangle).unwrap().bcs().clone()
}

#[test]
fn lame_parameters_from_young_and_poisson() {
    let lame = LameParameters::from_map(&params(&[("E", 210.0), ("nu", 0.3)])).unwrap();
    assert_scalar_eq!(lame.mu, 210.0 / 2.6, comp = abs, tol = 1e-12);
    assert_scalar_eq!(lame.lambda, 1.5 * 210.0 / 2.6, comp = abs, tol = 1e-12);
}

#[test]
fn lame_parameters_take_precedence_over_young_and_poisson() {
    let lame = LameParameters::from_map(&params(&[("lam", 1.0), ("mu", 2.0), ("E", 210.0), ("nu", 0.3)])).unwrap();
    assert_eq!(lame, LameParameters { mu: 2.0, lambda: 1.0 });
}

#[test]
fn incomplete_or_invalid_elastic_parameters_are_rejected() {
    for entries in [
        vec![("E", 210.0)],
        vec![("lam", 1.0)],
        vec![("E", 210.0), ("nu", 0.5)],
        vec![("lam", 1.0), ("mu", -1.0)],
    ] {
        let result = LameParameters::from_map(&params(&entries));
        assert!(
            matches!(result, Err(Error::InvalidMaterialParameters(_))),
            "{entries:?} gave {result:?}"
        );
    }
}

#[test]
fn phase_field_parameters_require_fracture_parameters() {
    let complete = params(&[("E", 210.0), ("nu", 0.3), ("Gc", 2.7e-3), ("l0", 0.03)]);
    let parsed = PhaseFieldParameters::from_map(&complete).unwrap();
    assert_scalar_eq!(parsed.gc, 2.7e-3);
    assert_scalar_eq!(parsed.l0, 0.03);

    let mut missing = complete.clone();
    missing.remove("Gc");
    assert!(matches!(
        PhaseFieldParameters::from_map(&missing),
        Err(Error::InvalidMaterialParameters(_))
    ));

    let mut negative = complete;
    negative.insert("l0".to_string(), -0.1);
    assert!(PhaseFieldParameters::from_map(&negative).is_err());
}

#[test]
fn model_types_parse_from_tags() {
    for model in [
        ModelType::Isotropic,
        ModelType::Anisotropic,
        ModelType::Deviatoric,
        ModelType::Spectral,
        ModelType::Hybrid,
    ] {
        assert_eq!(model.tag().parse::<ModelType>().unwrap(), model);
        assert_eq!(model.to_string(), model.tag());
    }
    assert_eq!("HybridModel".parse::<ModelType>().unwrap(), ModelType::Hybrid);
    assert_eq!(
        "PlasticModel".parse::<ModelType>(),
        Err(Error::UnknownModel("PlasticModel".to_string()))
    );
}

#[test]
fn model_type_deserializes_from_tag() {
    let model: ModelType = serde_json::from_str("\"SpectralModel\"").unwrap();
    assert_eq!(model, ModelType::Spectral);
}

#[test]
fn material_factory_selects_model() {
    let material = PhaseFractureMaterial::from_tag("IsotropicModel", lame(), EnergyDegradation::default()).unwrap();
    assert_eq!(material.model_type(), ModelType::Isotropic);
    assert!(matches!(
        PhaseFractureMaterial::from_tag("Unknown", lame(), EnergyDegradation::default()),
        Err(Error::UnknownModel(_))
    ));
}

#[test]
fn linear_elastic_matrix_2d() {
    let d = linear_elastic_matrix(&lame(), 2).unwrap();
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 3, &[
        7.0, 3.0, 0.0,
        3.0, 7.0, 0.0,
        0.0, 0.0, 2.0,
    ]);
    assert_matrix_eq!(d, expected);
}

#[test]
fn linear_elastic_matrix_3d_has_shear_diagonal() {
    let d = linear_elastic_matrix(&lame(), 3).unwrap();
    assert_eq!(d.shape(), (6, 6));
    for i in 0..3 {
        assert_scalar_eq!(d[(i, i)], 7.0);
        assert_scalar_eq!(d[(i + 3, i + 3)], 2.0);
    }
    assert_scalar_eq!(d[(0, 2)], 3.0);
    assert_scalar_eq!(d[(3, 4)], 0.0);
}

#[test]
fn linear_elastic_matrix_rejects_unsupported_dimension() {
    assert!(matches!(
        linear_elastic_matrix(&lame(), 1),
        Err(Error::UnsupportedDimension { dim: 1, .. })
    ));
    assert!(matches!(
        linear_elastic_matrix(&lame(), 4),
        Err(Error::UnsupportedDimension { dim: 4, .. })
    ));
}

#[test]
fn spectral_split_separates_tension_and_compression() {
    let LameParameters { mu, lambda } = lame();
    let tension = DMatrix::from_diagonal(&DVector::from_column_slice(&[1.0, 0.0]));
    let (pos, neg) = spectral_energy_split(&tension, &lame());
    assert_scalar_eq!(pos, 0.5 * lambda + mu, comp = abs, tol = 1e-12);
    assert_scalar_eq!(neg, 0.0, comp = abs, tol = 1e-12);

    let compression = -tension;
    let (pos, neg) = spectral_energy_split(&compression, &lame());
    assert_scalar_eq!(pos, 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(neg, 0.5 * lambda + mu, comp = abs, tol = 1e-12);
}

#[test]
fn spectral_split_sums_to_total_energy_for_pure_shear() {
    let shear = DMatrix::from_row_slice(2, 2, &[0.0, 0.3, 0.3, 0.0]);
    let (pos, neg) = spectral_energy_split(&shear, &lame());
    assert_scalar_eq!(pos, neg, comp = abs, tol = 1e-12);
    assert_scalar_eq!(pos + neg, strain_energy_density(&shear, &lame()), comp = abs, tol = 1e-12);
}

#[test]
fn isotropic_model_degrades_stress_and_energy() {
    let eps = 1e-2;
    let (space, displacement, phase) = homogeneous_state([[eps, 0.0], [0.0, 0.0]], 0.5);
    let state = MaterialState {
        space: &space,
        displacement: &displacement,
        phase: &phase,
    };
    let model = IsotropicModel {
        lame: lame(),
        degradation: EnergyDegradation::default(),
    };
    let bcs = triangle_points();
    let LameParameters { mu, lambda } = lame();

    let stress = model.stress_value(&state, &bcs).unwrap();
    let energy = model.driving_energy(&state, &bcs).unwrap();
    let tangent = model.elastic_matrix(&state, &bcs).unwrap();
    for c in 0..stress.num_cells() {
        for q in 0..stress.num_points() {
            let sigma = stress.get(c, q);
            assert_scalar_eq!(sigma[0], 0.25 * (2.0 * mu + lambda) * eps, comp = abs, tol = 1e-12);
            assert_scalar_eq!(sigma[3], 0.25 * lambda * eps, comp = abs, tol = 1e-12);
            assert_scalar_eq!(sigma[1], 0.0, comp = abs, tol = 1e-12);
            // The driving energy is not degraded
            assert_scalar_eq!(
                energy.scalar(c, q),
                (mu + 0.5 * lambda) * eps * eps,
                comp = abs,
                tol = 1e-12
            );
            assert_scalar_eq!(tangent.get(c, q)[0], 0.25 * 7.0, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn hybrid_model_combines_isotropic_tangent_with_spectral_energy() {
    let (space, displacement, phase) = homogeneous_state([[-1e-2, 0.0], [0.0, 0.0]], 0.0);
    let state = MaterialState {
        space: &space,
        displacement: &displacement,
        phase: &phase,
    };
    let degradation = EnergyDegradation::default();
    let hybrid = HybridModel::new(lame(), degradation);
    let isotropic = IsotropicModel {
        lame: lame(),
        degradation,
    };
    let bcs = triangle_points();

    assert_eq!(
        hybrid.elastic_matrix(&state, &bcs).unwrap(),
        isotropic.elastic_matrix(&state, &bcs).unwrap()
    );
    assert_eq!(
        hybrid.stress_value(&state, &bcs).unwrap(),
        isotropic.stress_value(&state, &bcs).unwrap()
    );

    // Compression does not drive the crack
    let energy = hybrid.driving_energy(&state, &bcs).unwrap();
    assert!(energy.as_slice().iter().all(|&e| e.abs() < 1e-14));
    let total = isotropic.driving_energy(&state, &bcs).unwrap();
    assert!(total.as_slice().iter().all(|&e| e > 0.0));
}

#[test]
fn unavailable_capabilities_report_not_implemented() {
    let (space, displacement, phase) = homogeneous_state([[1e-2, 0.0], [0.0, 0.0]], 0.0);
    let state = MaterialState {
        space: &space,
        displacement: &displacement,
        phase: &phase,
    };
    let bcs = triangle_points();
    let degradation = EnergyDegradation::default();

    let anisotropic = AnisotropicModel {
        lame: lame(),
        degradation,
    };
    assert_eq!(
        anisotropic.elastic_matrix(&state, &bcs),
        Err(Error::NotImplemented {
            capability: "elastic_matrix",
            variant: "AnisotropicModel"
        })
    );
    let deviatoric = DeviatoricModel {
        lame: lame(),
        degradation,
    };
    assert!(matches!(
        deviatoric.driving_energy(&state, &bcs),
        Err(Error::NotImplemented { .. })
    ));
    assert!(matches!(
        deviatoric.stress_value(&state, &bcs),
        Err(Error::NotImplemented { .. })
    ));

    let spectral = SpectralModel {
        lame: lame(),
        degradation,
    };
    assert!(matches!(
        spectral.stress_value(&state, &bcs),
        Err(Error::NotImplemented { .. })
    ));
    assert!(spectral.driving_energy(&state, &bcs).is_ok());
}

#[test]
fn strain_requires_one_component_per_dimension() {
    let (space, _, phase) = homogeneous_state([[0.0; 2]; 2], 0.0);
    let scalar = space.function(1, DofOrdering::NodeMajor);
    let state = MaterialState {
        space: &space,
        displacement: &scalar,
        phase: &phase,
    };
    assert!(matches!(
        state.strain(&triangle_points()),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn energy_degradation() {
    let degradation = EnergyDegradation { residual: 1e-3 };
    assert_scalar_eq!(degradation.value(0.0), 1.001, comp = abs, tol = 1e-14);
    assert_scalar_eq!(degradation.value(1.0), 1e-3, comp = abs, tol = 1e-14);
    assert_scalar_eq!(degradation.derivative(0.5), -1.0, comp = abs, tol = 1e-14);
}

#[test]
fn history_transfers_to_children() {
    let mut history = HistoryField::zeros(2, 1);
    let mut energy = QuadratureField::zeros(2, 1, 1);
    energy.as_mut_slice().copy_from_slice(&[1.0, 2.0]);
    history.update(&energy).unwrap();

    let refined = history.transfer_to_children(&[0, 1, 1, 0]).unwrap();
    assert_eq!(refined.values().as_slice(), &[1.0, 2.0, 2.0, 1.0]);
    assert!(history.transfer_to_children(&[2]).is_err());
}

#[test]
fn history_rejects_mismatched_energy() {
    let mut history = HistoryField::zeros(2, 3);
    assert!(history.update(&QuadratureField::zeros(2, 1, 1)).is_err());
}

proptest! {
    #[test]
    fn history_is_running_maximum(energies in prop::collection::vec(prop::collection::vec(0.0..10.0f64, 6), 1..8)) {
        let mut history = HistoryField::zeros(2, 3);
        let mut expected = vec![0.0f64; 6];
        for values in energies {
            let previous = history.values().as_slice().to_vec();
            let mut energy = QuadratureField::zeros(2, 3, 1);
            energy.as_mut_slice().copy_from_slice(&values);
            history.update(&energy).unwrap();
            for ((h, p), (e, v)) in history.values().as_slice().iter().zip(&previous).zip(expected.iter_mut().zip(&values)) {
                *e = e.max(*v);
                prop_assert!(h >= p);
                prop_assert_eq!(*h, *e);
            }
        }
    }
}
