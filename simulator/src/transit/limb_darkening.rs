//! Limb-darkening laws.
//!
//! Every law is written as `I(μ)/I(1) = 1 − Σ c_k f_k(μ)` where `μ` is the
//! cosine of the angle between the line of sight and the surface normal.
//! The basis functions `f_k` follow the usual transit-modelling conventions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Largest number of coefficients any law takes
pub const MAX_COEFFS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimbDarkeningLaw {
    Uniform,
    Linear,
    #[default]
    Quadratic,
    #[serde(rename = "square-root")]
    SquareRoot,
    Logarithmic,
    Exponential,
    Nonlinear,
}

impl LimbDarkeningLaw {
    pub const ALL: [LimbDarkeningLaw; 7] = [
        LimbDarkeningLaw::Uniform,
        LimbDarkeningLaw::Linear,
        LimbDarkeningLaw::Quadratic,
        LimbDarkeningLaw::SquareRoot,
        LimbDarkeningLaw::Logarithmic,
        LimbDarkeningLaw::Exponential,
        LimbDarkeningLaw::Nonlinear,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LimbDarkeningLaw::Uniform => "uniform",
            LimbDarkeningLaw::Linear => "linear",
            LimbDarkeningLaw::Quadratic => "quadratic",
            LimbDarkeningLaw::SquareRoot => "square-root",
            LimbDarkeningLaw::Logarithmic => "logarithmic",
            LimbDarkeningLaw::Exponential => "exponential",
            LimbDarkeningLaw::Nonlinear => "nonlinear",
        }
    }

    pub fn n_coeffs(self) -> usize {
        match self {
            LimbDarkeningLaw::Uniform => 0,
            LimbDarkeningLaw::Linear => 1,
            LimbDarkeningLaw::Quadratic
            | LimbDarkeningLaw::SquareRoot
            | LimbDarkeningLaw::Logarithmic
            | LimbDarkeningLaw::Exponential => 2,
            LimbDarkeningLaw::Nonlinear => 4,
        }
    }

    /// Basis functions `f_k(μ)`; only the first [`n_coeffs`](Self::n_coeffs) are meaningful.
    pub fn basis(self, mu: f64) -> [f64; MAX_COEFFS] {
        let one_minus = 1.0 - mu;
        match self {
            LimbDarkeningLaw::Uniform => [0.0; MAX_COEFFS],
            LimbDarkeningLaw::Linear => [one_minus, 0.0, 0.0, 0.0],
            LimbDarkeningLaw::Quadratic => [one_minus, one_minus * one_minus, 0.0, 0.0],
            LimbDarkeningLaw::SquareRoot => [one_minus, 1.0 - mu.sqrt(), 0.0, 0.0],
            LimbDarkeningLaw::Logarithmic => {
                let mu_ln_mu = if mu > 0.0 { mu * mu.ln() } else { 0.0 };
                [one_minus, mu_ln_mu, 0.0, 0.0]
            }
            LimbDarkeningLaw::Exponential => [one_minus, 1.0 / (1.0 - mu.exp()), 0.0, 0.0],
            LimbDarkeningLaw::Nonlinear => [
                1.0 - mu.sqrt(),
                one_minus,
                1.0 - mu.powf(1.5),
                1.0 - mu * mu,
            ],
        }
    }

    /// Normalized specific intensity at `mu`.
    pub fn intensity(self, mu: f64, coeffs: &[f64]) -> f64 {
        let basis = self.basis(mu);
        1.0 - coeffs
            .iter()
            .zip(basis.iter())
            .take(self.n_coeffs())
            .map(|(c, f)| c * f)
            .sum::<f64>()
    }
}

impl fmt::Display for LimbDarkeningLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LimbDarkeningLaw {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let key = match key.as_str() {
            "squareroot" | "sqrt" | "square_root" => "square-root",
            "log" => "logarithmic",
            "exp" => "exponential",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|law| law.name() == key)
            .ok_or_else(|| ValidationError::TransitParameter {
                name: "limb_dark",
                reason: format!("unknown limb darkening law '{s}'"),
            })
    }
}
