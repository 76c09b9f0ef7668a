//! Planetary transit modelling: orbital geometry, limb-darkening laws,
//! the occultation light-curve model and limb-darkening coefficient
//! providers.

pub mod ldc_provider;
pub mod limb_darkening;
pub mod model;
pub mod orbit;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use ldc_provider::{
    derive_coefficient_map, GreyAtmosphere, LdcMap, LimbDarkeningError, LimbDarkeningProvider,
    StaticLdcTable,
};
pub use limb_darkening::LimbDarkeningLaw;
pub use model::{IntegratedTransitModel, TransitModel};
pub use orbit::Orbit;

/// Unit of `t0` and `period` in [`TransitParams`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    /// Number of this unit in one day
    pub fn per_day(self) -> f64 {
        match self {
            TimeUnit::Days => 1.0,
            TimeUnit::Hours => 24.0,
            TimeUnit::Minutes => 1_440.0,
            TimeUnit::Seconds => 86_400.0,
        }
    }

    pub fn from_days(self, days: f64) -> f64 {
        days * self.per_day()
    }

    pub fn to_days(self, value: f64) -> f64 {
        value / self.per_day()
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Days => "days",
            TimeUnit::Hours => "hours",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Seconds => "seconds",
        };
        f.write_str(name)
    }
}

impl FromStr for TimeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            "h" | "hr" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "min" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "s" | "sec" | "second" | "seconds" => Ok(TimeUnit::Seconds),
            other => Err(ValidationError::TransitParameter {
                name: "time_unit",
                reason: format!("unknown time unit '{other}'"),
            }),
        }
    }
}

/// Host star parameters used to derive limb-darkening coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StellarParameters {
    /// Effective temperature (K)
    pub teff: f64,
    /// Surface gravity, log10(cgs)
    pub logg: f64,
    /// Metallicity [Fe/H] (dex)
    pub feh: f64,
}

/// Orbital and limb-darkening parameters of a transiting planet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitParams {
    /// Time of inferior conjunction; `None` places it at the mid-exposure frame
    #[serde(default)]
    pub t0: Option<f64>,
    /// Orbital period
    pub period: f64,
    /// Planet radius in stellar radii, used when no transmission spectrum is given
    pub rp: f64,
    /// Semi-major axis in stellar radii
    pub a: f64,
    /// Orbital inclination (degrees)
    pub inc: f64,
    #[serde(default)]
    pub ecc: f64,
    /// Argument of periastron (degrees)
    #[serde(default = "default_periastron")]
    pub w: f64,
    #[serde(default)]
    pub limb_dark: LimbDarkeningLaw,
    /// Limb-darkening coefficients broadcast to every column
    #[serde(default)]
    pub u: Vec<f64>,
    #[serde(default)]
    pub stellar: Option<StellarParameters>,
    #[serde(default)]
    pub time_unit: TimeUnit,
}

fn default_periastron() -> f64 {
    90.0
}

impl TransitParams {
    /// Circular orbit with quadratic limb darkening and no coefficients set.
    pub fn circular(period: f64, rp: f64, a: f64, inc: f64) -> Self {
        Self {
            t0: None,
            period,
            rp,
            a,
            inc,
            ecc: 0.0,
            w: default_periastron(),
            limb_dark: LimbDarkeningLaw::Quadratic,
            u: vec![0.0; LimbDarkeningLaw::Quadratic.n_coeffs()],
            stellar: None,
            time_unit: TimeUnit::Days,
        }
    }

    pub fn with_t0(mut self, t0: f64) -> Self {
        self.t0 = Some(t0);
        self
    }

    pub fn with_limb_darkening(mut self, law: LimbDarkeningLaw, u: Vec<f64>) -> Self {
        self.limb_dark = law;
        self.u = u;
        self
    }

    pub fn with_stellar(mut self, stellar: StellarParameters) -> Self {
        self.stellar = Some(stellar);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        fn bad(name: &'static str, reason: String) -> ValidationError {
            ValidationError::TransitParameter { name, reason }
        }

        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(bad("period", format!("must be positive, got {}", self.period)));
        }
        if !(self.a.is_finite() && self.a > 1.0) {
            return Err(bad("a", format!("must exceed 1 stellar radius, got {}", self.a)));
        }
        if !(self.inc.is_finite() && self.inc > 0.0 && self.inc <= 90.0) {
            return Err(bad("inc", format!("must lie in (0, 90] degrees, got {}", self.inc)));
        }
        if !(self.ecc.is_finite() && (0.0..1.0).contains(&self.ecc)) {
            return Err(bad("ecc", format!("must lie in [0, 1), got {}", self.ecc)));
        }
        if !self.w.is_finite() {
            return Err(bad("w", format!("must be finite, got {}", self.w)));
        }
        if !(self.rp.is_finite() && self.rp >= 0.0) {
            return Err(bad("rp", format!("must be non-negative, got {}", self.rp)));
        }
        if let Some(t0) = self.t0 {
            if !t0.is_finite() {
                return Err(bad("t0", format!("must be finite, got {t0}")));
            }
        }
        let expected = self.limb_dark.n_coeffs();
        if self.u.len() != expected {
            return Err(bad(
                "u",
                format!(
                    "{} limb darkening takes {expected} coefficients, got {}",
                    self.limb_dark,
                    self.u.len()
                ),
            ));
        }
        if self.u.iter().any(|c| !c.is_finite()) {
            return Err(bad("u", "coefficients must be finite".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hot_jupiter() -> TransitParams {
        TransitParams::circular(3.5, 0.1, 8.8, 89.0)
    }

    #[test]
    fn test_valid_params() {
        assert!(hot_jupiter().validate().is_ok());
        assert!(hot_jupiter().with_t0(0.01).validate().is_ok());
    }

    #[test]
    fn test_rejects_unphysical_orbits() {
        let cases = [
            TransitParams { period: 0.0, ..hot_jupiter() },
            TransitParams { a: 0.9, ..hot_jupiter() },
            TransitParams { inc: 95.0, ..hot_jupiter() },
            TransitParams { ecc: 1.0, ..hot_jupiter() },
            TransitParams { rp: -0.1, ..hot_jupiter() },
        ];
        for params in cases {
            assert!(matches!(
                params.validate(),
                Err(ValidationError::TransitParameter { .. })
            ));
        }
    }

    #[test]
    fn test_coefficient_count_must_match_law() {
        let params = hot_jupiter().with_limb_darkening(LimbDarkeningLaw::Nonlinear, vec![0.1, 0.2]);
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("4 coefficients"));
    }

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Hours.from_days(0.5), 12.0);
        assert_eq!(TimeUnit::Seconds.to_days(43_200.0), 0.5);
        assert_eq!("minutes".parse::<TimeUnit>().unwrap(), TimeUnit::Minutes);
        assert!("fortnights".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let params: TransitParams = serde_json::from_str(
            r#"{"period": 3.5, "rp": 0.1, "a": 8.8, "inc": 89.0, "u": [0.1, 0.1]}"#,
        )
        .unwrap();
        assert_eq!(params.limb_dark, LimbDarkeningLaw::Quadratic);
        assert_eq!(params.w, 90.0);
        assert_eq!(params.t0, None);
        assert!(params.validate().is_ok());
    }
}
