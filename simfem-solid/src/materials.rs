use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use simfem::error::{Error, Result};
use simfem::space::{FeFunction, FunctionSpace, QuadratureField};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LameParameters {
    pub mu: f64,
    pub lambda: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YoungPoisson {
    pub young: f64,
    pub poisson: f64,
}

impl From<YoungPoisson> for LameParameters {
    fn from(params: YoungPoisson) -> Self {
        let YoungPoisson { young, poisson } = params;
        let mu = 0.5 * young / (1.0 + poisson);
        let lambda = 2.0 * mu * poisson / (1.0 - 2.0 * poisson);
        Self { mu, lambda }
    }
}

fn lookup(params: &HashMap<String, f64>, key: &str) -> Option<f64> {
    params.get(key).copied()
}

impl LameParameters {
    /// Reads either `{lam, mu}` or `{E, nu}` from a parameter map.
    ///
    /// Lamé parameters take precedence when both sets are present.
    pub fn from_map(params: &HashMap<String, f64>) -> Result<Self> {
        let lame = match (lookup(params, "lam"), lookup(params, "mu")) {
            (Some(lambda), Some(mu)) => Self { mu, lambda },
            _ => match (lookup(params, "E"), lookup(params, "nu")) {
                (Some(young), Some(poisson)) => {
                    if !(poisson > -1.0 && poisson < 0.5) {
                        return Err(Error::InvalidMaterialParameters(format!(
                            "Poisson ratio {poisson} is outside (-1, 0.5)"
                        )));
                    }
                    YoungPoisson { young, poisson }.into()
                }
                _ => {
                    return Err(Error::InvalidMaterialParameters(
                        "expected either {lam, mu} or {E, nu}".to_string(),
                    ))
                }
            },
        };
        lame.validate()?;
        Ok(lame)
    }

    fn validate(&self) -> Result<()> {
        if !self.mu.is_finite() || !self.lambda.is_finite() || self.mu <= 0.0 {
            return Err(Error::InvalidMaterialParameters(format!(
                "Lamé parameters mu = {}, lambda = {} do not describe a stable material",
                self.mu, self.lambda
            )));
        }
        Ok(())
    }
}

/// Material parameters of a phase-field fracture model.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseFieldParameters {
    pub lame: LameParameters,
    /// Critical energy release rate.
    pub gc: f64,
    /// Length scale of the regularized crack.
    pub l0: f64,
}

impl PhaseFieldParameters {
    /// Reads the elastic parameters (see [`LameParameters::from_map`]) together with `Gc` and `l0`.
    pub fn from_map(params: &HashMap<String, f64>) -> Result<Self> {
        let lame = LameParameters::from_map(params)?;
        let positive = |key: &str| match lookup(params, key) {
            Some(value) if value > 0.0 && value.is_finite() => Ok(value),
            Some(value) => Err(Error::InvalidMaterialParameters(format!("{key} must be positive, got {value}"))),
            None => Err(Error::InvalidMaterialParameters(format!("missing parameter {key}"))),
        };
        Ok(Self {
            lame,
            gc: positive("Gc")?,
            l0: positive("l0")?,
        })
    }
}

/// The quadratic energy degradation function $g(d) = (1 - d)^2 + k$.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyDegradation {
    /// Residual stiffness $k$ of fully damaged material.
    pub residual: f64,
}

impl EnergyDegradation {
    pub fn value(&self, d: f64) -> f64 {
        (1.0 - d).powi(2) + self.residual
    }

    pub fn derivative(&self, d: f64) -> f64 {
        -2.0 * (1.0 - d)
    }
}

/// The constitutive models of the phase-field fracture family.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "IsotropicModel")]
    Isotropic,
    #[serde(rename = "AnisotropicModel")]
    Anisotropic,
    #[serde(rename = "DeviatoricModel")]
    Deviatoric,
    #[serde(rename = "SpectralModel")]
    Spectral,
    #[serde(rename = "HybridModel")]
    Hybrid,
}

impl ModelType {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Isotropic => "IsotropicModel",
            Self::Anisotropic => "AnisotropicModel",
            Self::Deviatoric => "DeviatoricModel",
            Self::Spectral => "SpectralModel",
            Self::Hybrid => "HybridModel",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::Isotropic,
            Self::Anisotropic,
            Self::Deviatoric,
            Self::Spectral,
            Self::Hybrid,
        ]
        .into_iter()
        .find(|model| model.tag() == s)
        .ok_or_else(|| Error::UnknownModel(s.to_string()))
    }
}

/// Number of independent strain components in Voigt notation.
pub fn voigt_dim(geometry_dim: usize) -> Result<usize> {
    match geometry_dim {
        2 => Ok(3),
        3 => Ok(6),
        dim => Err(Error::UnsupportedDimension {
            operation: "linear elastic matrix",
            dim,
        }),
    }
}

/// The isotropic linear elastic matrix in Voigt notation.
///
/// Strains are ordered as $(\epsilon_{xx}, \epsilon_{yy}, 2\epsilon_{xy})$ in 2D and
/// $(\epsilon_{xx}, \epsilon_{yy}, \epsilon_{zz}, 2\epsilon_{xy}, 2\epsilon_{yz}, 2\epsilon_{zx})$
/// in 3D.
pub fn linear_elastic_matrix(lame: &LameParameters, geometry_dim: usize) -> Result<DMatrix<f64>> {
    let n = voigt_dim(geometry_dim)?;
    let LameParameters { mu, lambda } = *lame;
    let mut d = DMatrix::zeros(n, n);
    for i in 0..geometry_dim {
        for j in 0..geometry_dim {
            d[(i, j)] = lambda;
        }
        d[(i, i)] = lambda + 2.0 * mu;
    }
    for i in geometry_dim..n {
        d[(i, i)] = mu;
    }
    Ok(d)
}

/// The positive and negative parts of the strain energy density after the spectral
/// decomposition of the strain,
/// $\psi^\pm = \frac{\lambda}{2} \langle \operatorname{tr} \epsilon \rangle_\pm^2 + \mu \operatorname{tr}(\epsilon_\pm^2)$.
pub fn spectral_energy_split(strain: &DMatrix<f64>, lame: &LameParameters) -> (f64, f64) {
    let LameParameters { mu, lambda } = *lame;
    let eigenvalues = SymmetricEigen::new(strain.clone()).eigenvalues;
    let trace = strain.trace();
    let (trace_plus, trace_minus) = (trace.max(0.0), trace.min(0.0));
    let positive: f64 = eigenvalues.iter().map(|e| e.max(0.0).powi(2)).sum();
    let negative: f64 = eigenvalues.iter().map(|e| e.min(0.0).powi(2)).sum();
    (
        0.5 * lambda * trace_plus.powi(2) + mu * positive,
        0.5 * lambda * trace_minus.powi(2) + mu * negative,
    )
}

/// Elastic strain energy density $\psi_0 = \mu \epsilon : \epsilon + \frac{\lambda}{2} \operatorname{tr}^2 \epsilon$.
pub fn strain_energy_density(strain: &DMatrix<f64>, lame: &LameParameters) -> f64 {
    lame.mu * strain.dot(strain) + 0.5 * lame.lambda * strain.trace().powi(2)
}

/// The fields a material is evaluated on.
///
/// `displacement` is a vector-valued function with one component per spatial dimension and
/// `phase` a scalar function, both in `space`.
#[derive(Debug, Clone, Copy)]
pub struct MaterialState<'a> {
    pub space: &'a FunctionSpace,
    pub displacement: &'a FeFunction,
    pub phase: &'a FeFunction,
}

impl<'a> MaterialState<'a> {
    /// Infinitesimal strain tensors ($GD \times GD$, row-major) at the given points of every cell.
    pub fn strain(&self, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        let gd = self.space.mesh().geo_dimension();
        if self.displacement.num_components() != gd {
            return Err(Error::dimension_mismatch(
                "displacement components",
                gd,
                self.displacement.num_components(),
            ));
        }
        let mut strain = self.space.grad_value(self.displacement, bcs)?;
        for c in 0..strain.num_cells() {
            for q in 0..strain.num_points() {
                let values = strain.get_mut(c, q);
                for i in 0..gd {
                    for j in (i + 1)..gd {
                        let sym = 0.5 * (values[i * gd + j] + values[j * gd + i]);
                        values[i * gd + j] = sym;
                        values[j * gd + i] = sym;
                    }
                }
            }
        }
        Ok(strain)
    }

    pub fn phase_values(&self, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.space.value(self.phase, bcs)
    }
}

/// A constitutive model of a phase-field fracture material.
///
/// All evaluations return one value per quadrature point of every cell. Stresses are stored as
/// row-major $GD \times GD$ tensors and tangents as row-major Voigt matrices, see
/// [`linear_elastic_matrix`].
pub trait FractureMaterial {
    fn model_type(&self) -> ModelType;

    /// The degraded stress.
    fn stress_value(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField>;

    /// The degraded tangent stiffness.
    fn elastic_matrix(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField>;

    /// The strain energy density that drives crack growth, from which the history field is updated.
    fn driving_energy(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField>;
}

/// Degrades the undamaged elastic response uniformly in all directions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IsotropicModel {
    pub lame: LameParameters,
    pub degradation: EnergyDegradation,
}

impl FractureMaterial for IsotropicModel {
    fn model_type(&self) -> ModelType {
        ModelType::Isotropic
    }

    fn stress_value(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        let gd = state.space.mesh().geo_dimension();
        let mut stress = state.strain(bcs)?;
        let phase = state.phase_values(bcs)?;
        let LameParameters { mu, lambda } = self.lame;
        for c in 0..stress.num_cells() {
            for q in 0..stress.num_points() {
                let g = self.degradation.value(phase.scalar(c, q));
                let values = stress.get_mut(c, q);
                let trace: f64 = (0..gd).map(|i| values[i * gd + i]).sum();
                for value in values.iter_mut() {
                    *value *= 2.0 * mu * g;
                }
                for i in 0..gd {
                    values[i * gd + i] += lambda * trace * g;
                }
            }
        }
        Ok(stress)
    }

    fn elastic_matrix(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        let d0 = linear_elastic_matrix(&self.lame, state.space.mesh().geo_dimension())?;
        let phase = state.phase_values(bcs)?;
        let mut tangent = QuadratureField::zeros(phase.num_cells(), phase.num_points(), d0.len());
        let d0_row_major: Vec<f64> = d0.transpose().iter().copied().collect();
        for c in 0..phase.num_cells() {
            for q in 0..phase.num_points() {
                let g = self.degradation.value(phase.scalar(c, q));
                for (value, d) in tangent.get_mut(c, q).iter_mut().zip(&d0_row_major) {
                    *value = g * d;
                }
            }
        }
        Ok(tangent)
    }

    fn driving_energy(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        let gd = state.space.mesh().geo_dimension();
        let strain = state.strain(bcs)?;
        let mut energy = QuadratureField::zeros(strain.num_cells(), strain.num_points(), 1);
        for c in 0..strain.num_cells() {
            for q in 0..strain.num_points() {
                energy.get_mut(c, q)[0] = strain_energy_density(&strain.matrix(c, q, gd), &self.lame);
            }
        }
        Ok(energy)
    }
}

macro_rules! unimplemented_model {
    ($name:ident, $model_type:expr, $doc:literal) => {
        #[doc = $doc]
        ///
        /// Not available yet: every capability fails with [`Error::NotImplemented`].
        #[derive(Copy, Clone, Debug, PartialEq)]
        pub struct $name {
            pub lame: LameParameters,
            pub degradation: EnergyDegradation,
        }

        impl FractureMaterial for $name {
            fn model_type(&self) -> ModelType {
                $model_type
            }

            fn stress_value(&self, _state: &MaterialState, _bcs: &DMatrix<f64>) -> Result<QuadratureField> {
                Err(Error::NotImplemented {
                    capability: "stress_value",
                    variant: $model_type.tag(),
                })
            }

            fn elastic_matrix(&self, _state: &MaterialState, _bcs: &DMatrix<f64>) -> Result<QuadratureField> {
                Err(Error::NotImplemented {
                    capability: "elastic_matrix",
                    variant: $model_type.tag(),
                })
            }

            fn driving_energy(&self, _state: &MaterialState, _bcs: &DMatrix<f64>) -> Result<QuadratureField> {
                Err(Error::NotImplemented {
                    capability: "driving_energy",
                    variant: $model_type.tag(),
                })
            }
        }
    };
}

unimplemented_model!(
    AnisotropicModel,
    ModelType::Anisotropic,
    "Degrades only the tensile part of the response, with a volumetric-deviatoric split."
);
unimplemented_model!(
    DeviatoricModel,
    ModelType::Deviatoric,
    "Degrades the deviatoric part of the response."
);

/// Drives crack growth by the positive part of the spectrally decomposed strain energy.
///
/// Only the driving energy is available, stress and tangent fail with [`Error::NotImplemented`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpectralModel {
    pub lame: LameParameters,
    pub degradation: EnergyDegradation,
}

impl FractureMaterial for SpectralModel {
    fn model_type(&self) -> ModelType {
        ModelType::Spectral
    }

    fn stress_value(&self, _state: &MaterialState, _bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        Err(Error::NotImplemented {
            capability: "stress_value",
            variant: ModelType::Spectral.tag(),
        })
    }

    fn elastic_matrix(&self, _state: &MaterialState, _bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        Err(Error::NotImplemented {
            capability: "elastic_matrix",
            variant: ModelType::Spectral.tag(),
        })
    }

    fn driving_energy(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        let gd = state.space.mesh().geo_dimension();
        let strain = state.strain(bcs)?;
        let mut energy = QuadratureField::zeros(strain.num_cells(), strain.num_points(), 1);
        for c in 0..strain.num_cells() {
            for q in 0..strain.num_points() {
                let (positive, _) = spectral_energy_split(&strain.matrix(c, q, gd), &self.lame);
                energy.get_mut(c, q)[0] = positive;
            }
        }
        Ok(energy)
    }
}

/// Isotropic stress and tangent combined with the spectral driving energy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HybridModel {
    isotropic: IsotropicModel,
    spectral: SpectralModel,
}

impl HybridModel {
    pub fn new(lame: LameParameters, degradation: EnergyDegradation) -> Self {
        Self {
            isotropic: IsotropicModel { lame, degradation },
            spectral: SpectralModel { lame, degradation },
        }
    }
}

impl FractureMaterial for HybridModel {
    fn model_type(&self) -> ModelType {
        ModelType::Hybrid
    }

    fn stress_value(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.isotropic.stress_value(state, bcs)
    }

    fn elastic_matrix(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.isotropic.elastic_matrix(state, bcs)
    }

    fn driving_energy(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.spectral.driving_energy(state, bcs)
    }
}

/// A phase-field fracture material selected by [`ModelType`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PhaseFractureMaterial {
    Isotropic(IsotropicModel),
    Anisotropic(AnisotropicModel),
    Deviatoric(DeviatoricModel),
    Spectral(SpectralModel),
    Hybrid(HybridModel),
}

impl PhaseFractureMaterial {
    pub fn create(model_type: ModelType, lame: LameParameters, degradation: EnergyDegradation) -> Self {
        match model_type {
            ModelType::Isotropic => Self::Isotropic(IsotropicModel { lame, degradation }),
            ModelType::Anisotropic => Self::Anisotropic(AnisotropicModel { lame, degradation }),
            ModelType::Deviatoric => Self::Deviatoric(DeviatoricModel { lame, degradation }),
            ModelType::Spectral => Self::Spectral(SpectralModel { lame, degradation }),
            ModelType::Hybrid => Self::Hybrid(HybridModel::new(lame, degradation)),
        }
    }

    /// Creates the material from a model tag such as `"HybridModel"`.
    pub fn from_tag(tag: &str, lame: LameParameters, degradation: EnergyDegradation) -> Result<Self> {
        Ok(Self::create(tag.parse()?, lame, degradation))
    }

    fn as_material(&self) -> &dyn FractureMaterial {
        match self {
            Self::Isotropic(model) => model,
            Self::Anisotropic(model) => model,
            Self::Deviatoric(model) => model,
            Self::Spectral(model) => model,
            Self::Hybrid(model) => model,
        }
    }
}

impl FractureMaterial for PhaseFractureMaterial {
    fn model_type(&self) -> ModelType {
        self.as_material().model_type()
    }

    fn stress_value(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.as_material().stress_value(state, bcs)
    }

    fn elastic_matrix(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.as_material().elastic_matrix(state, bcs)
    }

    fn driving_energy(&self, state: &MaterialState, bcs: &DMatrix<f64>) -> Result<QuadratureField> {
        self.as_material().driving_energy(state, bcs)
    }
}

/// The maximum driving energy seen so far at every quadrature point.
///
/// Values never decrease: the only mutation is [`HistoryField::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryField {
    values: QuadratureField,
}

impl HistoryField {
    pub fn zeros(num_cells: usize, num_points: usize) -> Self {
        Self {
            values: QuadratureField::zeros(num_cells, num_points, 1),
        }
    }

    pub fn values(&self) -> &QuadratureField {
        &self.values
    }

    /// Replaces every value by the maximum of itself and the given energy.
    pub fn update(&mut self, energy: &QuadratureField) -> Result<()> {
        let expected = (self.values.num_cells(), self.values.num_points(), 1);
        let actual = (energy.num_cells(), energy.num_points(), energy.num_components());
        if expected != actual {
            return Err(Error::dimension_mismatch(
                "history field update",
                self.values.as_slice().len(),
                energy.as_slice().len(),
            ));
        }
        for (h, &e) in self.values.as_mut_slice().iter_mut().zip(energy.as_slice()) {
            // NaN energies must not erase the history
            *h = h.max(e);
        }
        Ok(())
    }

    /// The history on a refined mesh, where every child cell inherits the values of its parent.
    pub fn transfer_to_children(&self, cell_parents: &[usize]) -> Result<Self> {
        let nq = self.values.num_points();
        let mut values = QuadratureField::zeros(cell_parents.len(), nq, 1);
        for (child, &parent) in cell_parents.iter().enumerate() {
            if parent >= self.values.num_cells() {
                return Err(Error::dimension_mismatch(
                    "cell parent",
                    self.values.num_cells(),
                    parent,
                ));
            }
            for q in 0..nq {
                values.get_mut(child, q)[0] = self.values.scalar(parent, q);
            }
        }
        Ok(Self { values })
    }
}
