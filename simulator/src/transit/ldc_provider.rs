//! Sources of per-wavelength limb-darkening coefficients.

use std::collections::HashMap;

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;
use shared::algo::{linspace, trapz};
use thiserror::Error;

use super::{LimbDarkeningLaw, StellarParameters};
use crate::error::{SkipReason, SkippedUnit};
use crate::instrument::{OrderModel, SpectralOrder};
use crate::photometry::planck_flambda;
use crate::units::{Temperature, TemperatureExt};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LimbDarkeningError {
    #[error("effective temperature {0} K outside the supported range")]
    TeffOutOfRange(f64),
    #[error("log g {0} outside the supported range")]
    LoggOutOfRange(f64),
    #[error("[Fe/H] {0} outside the supported range")]
    FehOutOfRange(f64),
    #[error("wavelength {0} um is not covered")]
    NoCoverage(f64),
    #[error("table holds {table} coefficients, {requested} requested")]
    LawMismatch {
        table: LimbDarkeningLaw,
        requested: LimbDarkeningLaw,
    },
    #[error("least-squares fit failed: {0}")]
    FitFailed(String),
    #[error("invalid coefficient table: {0}")]
    InvalidTable(String),
}

/// Limb-darkening coefficients as a function of wavelength and host star
pub trait LimbDarkeningProvider: Send + Sync {
    fn coefficients(
        &self,
        wavelength_um: f64,
        law: LimbDarkeningLaw,
        stellar: &StellarParameters,
    ) -> Result<Vec<f64>, LimbDarkeningError>;
}

/// Eddington grey-atmosphere intensity profile fitted with the requested law
///
/// The temperature structure follows `T⁴ = ¾ Teff⁴ (τ + ⅔)` and the source
/// function is the Planck function, so the emergent intensity is
/// `I(μ) = ∫ B_λ(T(μx)) e^{-x} dx`.
#[derive(Debug, Clone, PartialEq)]
pub struct GreyAtmosphere {
    pub teff_range: (f64, f64),
    pub logg_range: (f64, f64),
    pub feh_range: (f64, f64),
    /// μ samples used in the fit
    pub mu_samples: usize,
    /// Depth samples along each ray
    pub depth_samples: usize,
}

impl Default for GreyAtmosphere {
    fn default() -> Self {
        Self {
            teff_range: (2_000.0, 50_000.0),
            logg_range: (0.0, 6.0),
            feh_range: (-4.0, 1.0),
            mu_samples: 40,
            depth_samples: 240,
        }
    }
}

/// Lowest μ used in the fit; the extreme limb is poorly described by the laws
const MIN_FIT_MU: f64 = 0.08;

/// Optical depth (in units of μ) at which rays are truncated
const MAX_RAY_DEPTH: f64 = 30.0;

impl GreyAtmosphere {
    fn check_bounds(&self, stellar: &StellarParameters) -> Result<(), LimbDarkeningError> {
        let within = |v: f64, (lo, hi): (f64, f64)| v.is_finite() && v >= lo && v <= hi;
        if !within(stellar.teff, self.teff_range) {
            return Err(LimbDarkeningError::TeffOutOfRange(stellar.teff));
        }
        if !within(stellar.logg, self.logg_range) {
            return Err(LimbDarkeningError::LoggOutOfRange(stellar.logg));
        }
        if !within(stellar.feh, self.feh_range) {
            return Err(LimbDarkeningError::FehOutOfRange(stellar.feh));
        }
        Ok(())
    }

    /// Emergent intensity at `mu`, unnormalized.
    pub fn intensity(&self, wavelength_um: f64, teff: f64, mu: f64) -> f64 {
        let xs = linspace(0.0, MAX_RAY_DEPTH, self.depth_samples.max(2));
        let integrand: Vec<f64> = xs
            .iter()
            .map(|&x| {
                let tau = mu * x;
                let t = (0.75 * teff.powi(4) * (tau + 2.0 / 3.0)).powf(0.25);
                planck_flambda(wavelength_um, Temperature::from_kelvin(t)) * (-x).exp()
            })
            .collect();
        trapz(&xs, &integrand)
    }
}

impl LimbDarkeningProvider for GreyAtmosphere {
    fn coefficients(
        &self,
        wavelength_um: f64,
        law: LimbDarkeningLaw,
        stellar: &StellarParameters,
    ) -> Result<Vec<f64>, LimbDarkeningError> {
        self.check_bounds(stellar)?;
        if !(wavelength_um.is_finite() && wavelength_um > 0.0) {
            return Err(LimbDarkeningError::NoCoverage(wavelength_um));
        }
        let ncoeff = law.n_coeffs();
        if ncoeff == 0 {
            return Ok(Vec::new());
        }

        let center = self.intensity(wavelength_um, stellar.teff, 1.0);
        if !(center.is_finite() && center > 0.0) {
            return Err(LimbDarkeningError::FitFailed(format!(
                "central intensity {center} at {wavelength_um} um"
            )));
        }

        // 1 − I(μ)/I(1) = Σ c_k f_k(μ)
        let mus = linspace(MIN_FIT_MU, 1.0, self.mu_samples.max(ncoeff + 1));
        let design = DMatrix::from_fn(mus.len(), ncoeff, |i, k| law.basis(mus[i])[k]);
        let target = DVector::from_iterator(
            mus.len(),
            mus.iter()
                .map(|&mu| 1.0 - self.intensity(wavelength_um, stellar.teff, mu) / center),
        );

        let solution = design
            .svd(true, true)
            .solve(&target, 1e-12)
            .map_err(|e| LimbDarkeningError::FitFailed(e.to_string()))?;
        let coeffs: Vec<f64> = solution.iter().copied().collect();
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(LimbDarkeningError::FitFailed(
                "non-finite coefficients".to_string(),
            ));
        }
        Ok(coeffs)
    }
}

/// Coefficients tabulated in wavelength bins for a single law
#[derive(Debug, Clone, PartialEq)]
pub struct StaticLdcTable {
    law: LimbDarkeningLaw,
    /// (lower edge, upper edge, coefficients), half-open bins in µm
    bins: Vec<(f64, f64, Vec<f64>)>,
}

impl StaticLdcTable {
    pub fn new(law: LimbDarkeningLaw, bins: Vec<(f64, f64, Vec<f64>)>) -> Result<Self, LimbDarkeningError> {
        for (lo, hi, coeffs) in &bins {
            if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
                return Err(LimbDarkeningError::InvalidTable(format!(
                    "bin [{lo}, {hi}) is empty"
                )));
            }
            if coeffs.len() != law.n_coeffs() {
                return Err(LimbDarkeningError::InvalidTable(format!(
                    "bin [{lo}, {hi}) has {} coefficients, {law} needs {}",
                    coeffs.len(),
                    law.n_coeffs()
                )));
            }
        }
        Ok(Self { law, bins })
    }

    pub fn law(&self) -> LimbDarkeningLaw {
        self.law
    }
}

impl LimbDarkeningProvider for StaticLdcTable {
    fn coefficients(
        &self,
        wavelength_um: f64,
        law: LimbDarkeningLaw,
        _stellar: &StellarParameters,
    ) -> Result<Vec<f64>, LimbDarkeningError> {
        if law != self.law {
            return Err(LimbDarkeningError::LawMismatch {
                table: self.law,
                requested: law,
            });
        }
        self.bins
            .iter()
            .find(|(lo, hi, _)| wavelength_um >= *lo && wavelength_um < *hi)
            .map(|(_, _, coeffs)| coeffs.clone())
            .ok_or(LimbDarkeningError::NoCoverage(wavelength_um))
    }
}

/// Per-(order, column) coefficients with a validity mask
#[derive(Debug, Clone, PartialEq)]
pub struct LdcMap {
    law: LimbDarkeningLaw,
    /// (order, column, coefficient)
    coeffs: Array3<f64>,
    /// (order, column)
    valid: Array2<bool>,
    failures: HashMap<(usize, usize), SkipReason>,
}

impl LdcMap {
    /// Caller-supplied coefficients; every entry is valid.
    pub fn explicit(law: LimbDarkeningLaw, coeffs: Array3<f64>) -> Self {
        let (norders, ncols, _) = coeffs.dim();
        Self {
            law,
            coeffs,
            valid: Array2::from_elem((norders, ncols), true),
            failures: HashMap::new(),
        }
    }

    /// The same coefficients for every column of every order.
    pub fn broadcast(law: LimbDarkeningLaw, u: &[f64], ncols: usize) -> Self {
        let norders = SpectralOrder::ALL.len();
        let mut coeffs = Array3::zeros((norders, ncols, u.len()));
        for mut lane in coeffs.lanes_mut(Axis(2)) {
            lane.assign(&ArrayView1::from(u));
        }
        Self::explicit(law, coeffs)
    }

    pub fn law(&self) -> LimbDarkeningLaw {
        self.law
    }

    pub fn coeffs(&self) -> &Array3<f64> {
        &self.coeffs
    }

    pub fn valid(&self) -> &Array2<bool> {
        &self.valid
    }

    /// Coefficients of one column, or why none are available.
    pub fn column(&self, order: SpectralOrder, column: usize) -> Result<Vec<f64>, SkipReason> {
        let idx = order.index();
        if self.valid.get((idx, column)).copied().unwrap_or(false) {
            return Ok(self.coeffs.slice(ndarray::s![idx, column, ..]).to_vec());
        }
        Err(self
            .failures
            .get(&(idx, column))
            .cloned()
            .unwrap_or(SkipReason::MissingCoefficients))
    }

    /// Columns whose derivation failed, ordered by (order, column).
    pub fn failures(&self, wavelength_of: impl Fn(SpectralOrder, usize) -> f64) -> Vec<SkippedUnit> {
        let mut keys: Vec<_> = self.failures.keys().copied().collect();
        keys.sort_unstable();
        keys.into_iter()
            .map(|(idx, column)| {
                let order = SpectralOrder::ALL[idx];
                SkippedUnit {
                    order: order.number(),
                    column,
                    wavelength_um: wavelength_of(order, column),
                    reason: self.failures[&(idx, column)].clone(),
                }
            })
            .collect()
    }
}

/// Evaluate `provider` at every illuminated column inside each order's
/// valid trace range.
///
/// Other columns are left invalid without a failure record; they never
/// carry stellar signal.
pub fn derive_coefficient_map(
    provider: &dyn LimbDarkeningProvider,
    models: &[&OrderModel],
    law: LimbDarkeningLaw,
    stellar: &StellarParameters,
) -> LdcMap {
    let ncols = models.iter().map(|m| m.ncols()).max().unwrap_or(0);
    let ncoeff = law.n_coeffs();
    let mut coeffs = Array3::zeros((SpectralOrder::ALL.len(), ncols, ncoeff));
    let mut valid = Array2::from_elem((SpectralOrder::ALL.len(), ncols), false);
    let mut failures = HashMap::new();

    for model in models {
        let idx = model.order().index();
        let results: Vec<(usize, Result<Vec<f64>, LimbDarkeningError>)> = model
            .valid_columns()
            .into_par_iter()
            .filter_map(|column| {
                let w = model.wavelength(column);
                (w > 0.0).then(|| (column, provider.coefficients(w, law, stellar)))
            })
            .collect();

        let mut derived = 0usize;
        for (column, result) in results {
            match result {
                Ok(c) if c.len() == ncoeff => {
                    for (k, value) in c.into_iter().enumerate() {
                        coeffs[[idx, column, k]] = value;
                    }
                    valid[[idx, column]] = true;
                    derived += 1;
                }
                Ok(c) => {
                    failures.insert(
                        (idx, column),
                        SkipReason::LimbDarkening(format!(
                            "provider returned {} coefficients, {law} needs {ncoeff}",
                            c.len()
                        )),
                    );
                }
                Err(e) => {
                    failures.insert((idx, column), SkipReason::LimbDarkening(e.to_string()));
                }
            }
        }
        debug!("Derived {law} coefficients for {derived} columns of {}", model.order());
    }

    if !failures.is_empty() {
        warn!(
            "Limb darkening derivation failed for {} columns (Teff={}, logg={}, [Fe/H]={})",
            failures.len(),
            stellar.teff,
            stellar.logg,
            stellar.feh
        );
    }

    LdcMap {
        law,
        coeffs,
        valid,
        failures,
    }
}
