//! Analytic stellar spectra.

use std::f64::consts::PI;

use shared::algo::linspace;

use super::spectrum::{Spectrum, CGS};
use crate::error::ValidationError;
use crate::units::{Temperature, TemperatureExt};

/// Wavelength grid used for synthetic blackbody stars, in µm.
pub const BLACKBODY_GRID_UM: (f64, f64) = (0.5, 2.9);

/// Number of samples on [`BLACKBODY_GRID_UM`].
pub const BLACKBODY_GRID_SAMPLES: usize = 1000;

/// Flux scale applied to synthetic blackbody stars.
pub const BLACKBODY_FLUX_SCALE: f64 = 1e-8;

/// Planck spectral radiance B_λ in erg s⁻¹ cm⁻² Å⁻¹ sr⁻¹.
///
/// Returns 0.0 for non-positive wavelength or temperature.
pub fn planck_flambda(wavelength_um: f64, temperature: Temperature) -> f64 {
    let t = temperature.as_kelvin();
    if wavelength_um <= 0.0 || t <= 0.0 {
        return 0.0;
    }
    let wavelength_cm = wavelength_um * 1e-4;

    let numerator = 2.0 * CGS::PLANCK_CONSTANT * CGS::SPEED_OF_LIGHT * CGS::SPEED_OF_LIGHT;
    let exponent = (CGS::PLANCK_CONSTANT * CGS::SPEED_OF_LIGHT)
        / (wavelength_cm * CGS::BOLTZMANN_CONSTANT * t);
    let per_cm = numerator / (wavelength_cm.powi(5) * exponent.exp_m1());

    // per cm of wavelength -> per Å
    per_cm * 1e-8
}

/// Sample a blackbody of unit bolometric flux (erg s⁻¹ cm⁻²), times `scale`,
/// onto the given wavelength grid. F_λ = π B_λ / (σ T⁴).
pub fn blackbody_spectrum(
    temperature: Temperature,
    wavelength_um: Vec<f64>,
    scale: f64,
) -> Result<Spectrum, ValidationError> {
    let teff = temperature.as_kelvin();
    if teff.is_nan() || teff <= 0.0 {
        return Err(ValidationError::Config {
            name: "teff",
            reason: format!("must be positive, got {teff}"),
        });
    }
    let norm = PI / (CGS::STEFAN_BOLTZMANN * teff.powi(4)) * scale;
    let flux = wavelength_um
        .iter()
        .map(|&w| planck_flambda(w, temperature) * norm)
        .collect();
    Spectrum::new(wavelength_um, flux, None)
}

/// The standard synthetic star: 1000 samples over 0.5–2.9 µm scaled by 1e-8.
pub fn default_blackbody(temperature: Temperature) -> Result<Spectrum, ValidationError> {
    let (lo, hi) = BLACKBODY_GRID_UM;
    blackbody_spectrum(
        temperature,
        linspace(lo, hi, BLACKBODY_GRID_SAMPLES),
        BLACKBODY_FLUX_SCALE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wien_peak() {
        // Wien's displacement law: λ_max = 2897.77 µm K / T
        let t = Temperature::from_kelvin(3000.0);
        let grid = linspace(0.3, 3.0, 2701);
        let peak = grid
            .iter()
            .copied()
            .max_by(|a, b| planck_flambda(*a, t).total_cmp(&planck_flambda(*b, t)))
            .unwrap();
        assert_relative_eq!(peak, 2897.77 / 3000.0, epsilon = 2e-3);
    }

    #[test]
    fn test_rayleigh_jeans_limit() {
        // B_λ ≈ 2ckT/λ⁴ for hc/λkT << 1
        let t = Temperature::from_kelvin(50000.0);
        let wavelength_um: f64 = 1000.0;
        let lam_cm: f64 = wavelength_um * 1e-4;
        let rj = 2.0 * CGS::SPEED_OF_LIGHT * CGS::BOLTZMANN_CONSTANT * 50000.0 / lam_cm.powi(4)
            * 1e-8;
        assert_relative_eq!(planck_flambda(wavelength_um, t), rj, max_relative = 2e-3);
    }

    #[test]
    fn test_default_blackbody_grid() {
        let star = default_blackbody(Temperature::from_kelvin(1000.0)).unwrap();
        assert_eq!(star.len(), BLACKBODY_GRID_SAMPLES);
        let (lo, hi) = star.wavelength_range();
        assert_relative_eq!(lo, 0.5);
        assert_relative_eq!(hi, 2.9, epsilon = 1e-12);
        assert!(star.flux().iter().all(|&f| f > 0.0));
    }

    #[test]
    fn test_unit_bolometric_flux() {
        let grid = linspace(0.05, 200.0, 400_000);
        let star = blackbody_spectrum(Temperature::from_kelvin(3000.0), grid, 1.0).unwrap();
        // F_λ is per Å; the grid is in µm
        let total = shared::algo::trapz(star.wavelength_um(), star.flux()) * 1e4;
        assert_relative_eq!(total, 1.0, max_relative = 1e-3);
    }

    #[test]
    fn test_rejects_non_positive_temperature() {
        assert!(default_blackbody(Temperature::from_kelvin(0.0)).is_err());
    }
}
