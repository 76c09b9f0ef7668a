//! Sampled stellar and planetary spectra.
//!
//! All spectra are stored in canonical units once validated:
//! - **Wavelength**: micrometers, strictly increasing, finite and positive
//! - **Flux density**: erg s⁻¹ cm⁻² Å⁻¹ (F_λ)
//!
//! Callers hand in unit-tagged columns ([`UnitColumn`]); the unit strings are
//! resolved through [`crate::units`] and rejected when they are not a length
//! and an energy flux density per unit wavelength respectively.

use shared::algo::{interp_clamped, interp_or};

use crate::error::ValidationError;
use crate::units::{FluxDensityUnit, WavelengthUnit};

/// Physical constants in CGS units.
pub struct CGS {}

impl CGS {
    /// Planck's constant
    /// Units: erg⋅s
    pub const PLANCK_CONSTANT: f64 = 6.62607015e-27;

    /// Speed of light in vacuum
    /// Units: cm/s
    pub const SPEED_OF_LIGHT: f64 = 2.99792458e10;

    /// Boltzmann constant
    /// Units: erg/K
    pub const BOLTZMANN_CONSTANT: f64 = 1.380649e-16;

    /// Stefan-Boltzmann constant
    /// Units: erg⋅s⁻¹⋅cm⁻²⋅K⁻⁴
    pub const STEFAN_BOLTZMANN: f64 = 5.670374419e-5;

    /// λ/(h·c) for λ in micrometers
    /// Units: photons per erg per µm of wavelength
    pub const PHOTONS_PER_ERG_PER_UM: f64 = 503_411_665_111.454_3;
}

/// Convert an F_λ value at `wavelength_um` into a photon flux density
/// (photons s⁻¹ cm⁻² Å⁻¹).
pub fn energy_to_photon_flux(flux: f64, wavelength_um: f64) -> f64 {
    flux * wavelength_um * CGS::PHOTONS_PER_ERG_PER_UM
}

/// One column of a tabulated spectrum with its physical unit
#[derive(Debug, Clone, PartialEq)]
pub struct UnitColumn {
    pub values: Vec<f64>,
    pub unit: String,
}

impl UnitColumn {
    pub fn new(values: Vec<f64>, unit: &str) -> Self {
        Self {
            values,
            unit: unit.to_string(),
        }
    }
}

fn validate_wavelengths(wavelength_um: &[f64]) -> Result<(), ValidationError> {
    if wavelength_um.len() < 2 {
        return Err(ValidationError::TooFewSamples(wavelength_um.len()));
    }
    for (index, &value) in wavelength_um.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::BadValue {
                column: "wavelength",
                index,
                value,
            });
        }
    }
    if let Some(idx) = wavelength_um.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ValidationError::NonMonotonicWavelength(idx + 1));
    }
    Ok(())
}

fn validate_column(
    column: &'static str,
    values: &[f64],
    expected: usize,
) -> Result<(), ValidationError> {
    if values.len() != expected {
        return Err(ValidationError::ColumnLength {
            column,
            expected,
            got: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::BadValue {
            column,
            index,
            value: values[index],
        });
    }
    Ok(())
}

/// A stellar spectrum in canonical units
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    wavelength_um: Vec<f64>,
    flux: Vec<f64>,
    uncertainty: Option<Vec<f64>>,
}

impl Spectrum {
    /// Build a spectrum already expressed in µm and erg s⁻¹ cm⁻² Å⁻¹.
    pub fn new(
        wavelength_um: Vec<f64>,
        flux: Vec<f64>,
        uncertainty: Option<Vec<f64>>,
    ) -> Result<Self, ValidationError> {
        validate_wavelengths(&wavelength_um)?;
        validate_column("flux", &flux, wavelength_um.len())?;
        if let Some(err) = &uncertainty {
            validate_column("uncertainty", err, wavelength_um.len())?;
        }
        Ok(Self {
            wavelength_um,
            flux,
            uncertainty,
        })
    }

    /// Build a spectrum from `[W, F]` or `[W, F, E]` unit-tagged columns.
    ///
    /// The wavelength unit must be a length and the flux (and uncertainty)
    /// units must be energy flux densities per unit wavelength.
    pub fn from_columns(columns: &[UnitColumn]) -> Result<Self, ValidationError> {
        if !(2..=3).contains(&columns.len()) {
            return Err(ValidationError::ColumnCount(columns.len()));
        }

        let wave_unit =
            WavelengthUnit::parse(&columns[0].unit).map_err(ValidationError::WavelengthUnit)?;
        let wavelength_um: Vec<f64> = columns[0]
            .values
            .iter()
            .map(|&w| wave_unit.to_micrometers(w))
            .collect();

        let to_flam = |col: &UnitColumn| -> Result<Vec<f64>, ValidationError> {
            let unit = FluxDensityUnit::parse(&col.unit).map_err(ValidationError::FluxUnit)?;
            let factor = unit.to_cgs_angstrom_factor();
            Ok(col.values.iter().map(|v| v * factor).collect())
        };

        let flux = to_flam(&columns[1])?;
        let uncertainty = columns.get(2).map(to_flam).transpose()?;

        Self::new(wavelength_um, flux, uncertainty)
    }

    pub fn wavelength_um(&self) -> &[f64] {
        &self.wavelength_um
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn uncertainty(&self) -> Option<&[f64]> {
        self.uncertainty.as_deref()
    }

    pub fn len(&self) -> usize {
        self.wavelength_um.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength_um.is_empty()
    }

    /// Inclusive wavelength range covered by the samples, in µm.
    pub fn wavelength_range(&self) -> (f64, f64) {
        (
            self.wavelength_um[0],
            self.wavelength_um[self.wavelength_um.len() - 1],
        )
    }

    /// True if `wavelength_um` lies inside the sampled range.
    pub fn covers(&self, wavelength_um: f64) -> bool {
        let (lo, hi) = self.wavelength_range();
        wavelength_um >= lo && wavelength_um <= hi
    }

    /// Linearly interpolated F_λ at `wavelength_um`, zero outside the grid.
    pub fn flux_at(&self, wavelength_um: f64) -> f64 {
        // sorted, equal-length and at least 2 samples since construction
        let flux = interp_or(wavelength_um, &self.wavelength_um, &self.flux, 0.0, 0.0);
        debug_assert!(flux.is_ok(), "invalid spectrum grid: {flux:?}");
        flux.unwrap_or(0.0)
    }
}

/// Planet radius ratio Rp/R* as a function of wavelength
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionSpectrum {
    wavelength_um: Vec<f64>,
    radius_ratio: Vec<f64>,
}

impl TransmissionSpectrum {
    pub fn from_radius_ratio(
        wavelength_um: Vec<f64>,
        radius_ratio: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        validate_wavelengths(&wavelength_um)?;
        validate_column("radius ratio", &radius_ratio, wavelength_um.len())?;
        if let Some(index) = radius_ratio.iter().position(|&r| r < 0.0) {
            return Err(ValidationError::BadValue {
                column: "radius ratio",
                index,
                value: radius_ratio[index],
            });
        }
        Ok(Self {
            wavelength_um,
            radius_ratio,
        })
    }

    /// Build from transit depths (Rp/R*)², the usual tabulation of
    /// transmission spectra.
    pub fn from_depth(wavelength_um: Vec<f64>, depth: Vec<f64>) -> Result<Self, ValidationError> {
        if let Some(index) = depth.iter().position(|&d| d < 0.0) {
            return Err(ValidationError::BadValue {
                column: "transit depth",
                index,
                value: depth[index],
            });
        }
        let radius_ratio = depth.iter().map(|d| d.sqrt()).collect();
        Self::from_radius_ratio(wavelength_um, radius_ratio)
    }

    /// Same as [`Self::from_depth`] with a unit-tagged wavelength column.
    pub fn from_depth_columns(
        wavelength: &UnitColumn,
        depth: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        let unit = WavelengthUnit::parse(&wavelength.unit).map_err(ValidationError::WavelengthUnit)?;
        let wavelength_um = wavelength
            .values
            .iter()
            .map(|&w| unit.to_micrometers(w))
            .collect();
        Self::from_depth(wavelength_um, depth)
    }

    pub fn wavelength_um(&self) -> &[f64] {
        &self.wavelength_um
    }

    pub fn radius_ratio(&self) -> &[f64] {
        &self.radius_ratio
    }

    /// Rp/R* at `wavelength_um`, holding the edge values outside the table.
    pub fn radius_ratio_at(&self, wavelength_um: f64) -> f64 {
        let ratio = interp_clamped(wavelength_um, &self.wavelength_um, &self.radius_ratio);
        debug_assert!(ratio.is_ok(), "invalid transmission grid: {ratio:?}");
        ratio.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn columns(wave_unit: &str, flux_unit: &str) -> Vec<UnitColumn> {
        vec![
            UnitColumn::new(vec![1.0, 2.0, 3.0], wave_unit),
            UnitColumn::new(vec![10.0, 20.0, 30.0], flux_unit),
        ]
    }

    #[test]
    fn test_photon_factor_matches_constants() {
        let expected = 1e-4 / (CGS::PLANCK_CONSTANT * CGS::SPEED_OF_LIGHT);
        assert_relative_eq!(CGS::PHOTONS_PER_ERG_PER_UM, expected, max_relative = 1e-6);
        assert_relative_eq!(
            energy_to_photon_flux(1.0, 2.0),
            2.0 * CGS::PHOTONS_PER_ERG_PER_UM
        );
    }

    #[test]
    fn test_from_columns_converts_units() {
        let spec = Spectrum::from_columns(&columns("um", "W/m2/um")).unwrap();
        assert_eq!(spec.wavelength_um(), &[1.0, 2.0, 3.0]);
        assert_relative_eq!(spec.flux()[0], 1.0, epsilon = 1e-12);
        assert!(spec.uncertainty().is_none());

        let spec = Spectrum::from_columns(&columns("nm", "erg/s/cm2/AA")).unwrap();
        assert_relative_eq!(spec.wavelength_um()[2], 0.003, epsilon = 1e-15);
    }

    #[test]
    fn test_from_columns_with_uncertainty() {
        let mut cols = columns("um", "erg/s/cm2/AA");
        cols.push(UnitColumn::new(vec![1.0, 1.0, 1.0], "erg/s/cm2/nm"));
        let spec = Spectrum::from_columns(&cols).unwrap();
        assert_relative_eq!(spec.uncertainty().unwrap()[1], 0.1, epsilon = 1e-14);
    }

    #[test]
    fn test_from_columns_rejects_bad_shapes_and_units() {
        assert_eq!(
            Spectrum::from_columns(&columns("um", "erg/s/cm2/AA")[..1]),
            Err(ValidationError::ColumnCount(1))
        );
        assert!(matches!(
            Spectrum::from_columns(&columns("kg", "erg/s/cm2/AA")),
            Err(ValidationError::WavelengthUnit(_))
        ));
        assert!(matches!(
            Spectrum::from_columns(&columns("um", "Jy")),
            Err(ValidationError::FluxUnit(_))
        ));

        let cols = vec![
            UnitColumn::new(vec![1.0, 2.0, 3.0], "um"),
            UnitColumn::new(vec![1.0, 2.0], "erg/s/cm2/AA"),
        ];
        assert!(matches!(
            Spectrum::from_columns(&cols),
            Err(ValidationError::ColumnLength { got: 2, .. })
        ));
    }

    #[test]
    fn test_wavelengths_must_increase() {
        let err = Spectrum::new(vec![1.0, 3.0, 2.0], vec![1.0; 3], None).unwrap_err();
        assert_eq!(err, ValidationError::NonMonotonicWavelength(2));

        let err = Spectrum::new(vec![-1.0, 3.0], vec![1.0; 2], None).unwrap_err();
        assert!(matches!(err, ValidationError::BadValue { index: 0, .. }));
    }

    #[test]
    fn test_flux_interpolation_zero_outside() {
        let spec = Spectrum::new(vec![1.0, 2.0], vec![4.0, 8.0], None).unwrap();
        assert_relative_eq!(spec.flux_at(1.5), 6.0);
        assert_eq!(spec.flux_at(0.5), 0.0);
        assert_eq!(spec.flux_at(2.5), 0.0);
        assert!(spec.covers(2.0));
        assert!(!spec.covers(2.0001));
    }

    #[test]
    fn test_transmission_from_depth() {
        let planet = TransmissionSpectrum::from_depth(vec![1.0, 2.0], vec![0.01, 0.04]).unwrap();
        assert_relative_eq!(planet.radius_ratio()[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(planet.radius_ratio_at(1.5), 0.15, epsilon = 1e-12);
        assert_relative_eq!(planet.radius_ratio_at(5.0), 0.2, epsilon = 1e-12);

        assert!(TransmissionSpectrum::from_depth(vec![1.0, 2.0], vec![0.01, -0.1]).is_err());

        let col = UnitColumn::new(vec![10000.0, 20000.0], "AA");
        let planet = TransmissionSpectrum::from_depth_columns(&col, vec![0.01, 0.01]).unwrap();
        assert_relative_eq!(planet.wavelength_um()[1], 2.0, epsilon = 1e-12);
    }
}
