//! Type-safe physical units for spectra and stellar parameters
//!
//! Wavelengths and temperatures use the `uom` crate so conversions are
//! checked at compile time. Flux densities arrive as unit strings from the
//! caller and are mapped onto the canonical F_λ unit (erg s⁻¹ cm⁻² Å⁻¹)
//! through [`FluxDensityUnit`].

use thiserror::Error;
use uom::si::f64::*;
use uom::si::length::{angstrom, centimeter, meter, micrometer, nanometer};
use uom::si::thermodynamic_temperature::kelvin;

/// Type alias for temperature with convenient methods
pub type Temperature = ThermodynamicTemperature;

/// Type alias for length measurements with convenient methods
pub type Length = uom::si::f64::Length;

/// Extension trait for temperature conversions
pub trait TemperatureExt {
    /// Create temperature from Kelvin
    fn from_kelvin(kelvin: f64) -> Self;

    /// Get temperature in Kelvin
    fn as_kelvin(&self) -> f64;
}

/// Extension trait for the wavelength units spectra are quoted in
pub trait LengthExt {
    fn from_micrometers(um: f64) -> Self;
    fn as_micrometers(&self) -> f64;
    fn from_nanometers(nm: f64) -> Self;
    fn as_nanometers(&self) -> f64;
    fn from_angstroms(aa: f64) -> Self;
    fn as_angstroms(&self) -> f64;
    fn as_centimeters(&self) -> f64;
}

impl TemperatureExt for Temperature {
    fn from_kelvin(k: f64) -> Self {
        Temperature::new::<kelvin>(k)
    }

    fn as_kelvin(&self) -> f64 {
        self.get::<kelvin>()
    }
}

impl LengthExt for Length {
    fn from_micrometers(um: f64) -> Self {
        Length::new::<micrometer>(um)
    }

    fn as_micrometers(&self) -> f64 {
        self.get::<micrometer>()
    }

    fn from_nanometers(nm: f64) -> Self {
        Length::new::<nanometer>(nm)
    }

    fn as_nanometers(&self) -> f64 {
        self.get::<nanometer>()
    }

    fn from_angstroms(aa: f64) -> Self {
        Length::new::<angstrom>(aa)
    }

    fn as_angstroms(&self) -> f64 {
        self.get::<angstrom>()
    }

    fn as_centimeters(&self) -> f64 {
        self.get::<centimeter>()
    }
}

/// Errors raised while interpreting unit strings
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("'{0}' is not a recognised length unit")]
    UnknownLength(String),
    #[error("'{0}' is not a recognised flux density unit")]
    UnknownFlux(String),
    #[error("'{0}' is a per-frequency flux density; a per-wavelength (F_lambda) unit is required")]
    FrequencyDensity(String),
}

/// Strip whitespace, lowercase and normalise exponent spellings.
fn normalise(unit: &str) -> String {
    unit.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .replace("**", "")
        .replace('^', "")
        .replace('µ', "u")
        .replace('å', "aa")
}

/// Length units accepted for spectrum wavelength columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavelengthUnit {
    Micrometer,
    Nanometer,
    Angstrom,
    Meter,
    Centimeter,
}

impl WavelengthUnit {
    pub fn parse(unit: &str) -> Result<Self, UnitError> {
        match normalise(unit).as_str() {
            "um" | "micron" | "microns" | "micrometer" | "micrometers" => Ok(Self::Micrometer),
            "nm" | "nanometer" | "nanometers" => Ok(Self::Nanometer),
            "aa" | "angstrom" | "angstroms" => Ok(Self::Angstrom),
            "m" | "meter" | "meters" => Ok(Self::Meter),
            "cm" | "centimeter" | "centimeters" => Ok(Self::Centimeter),
            _ => Err(UnitError::UnknownLength(unit.to_string())),
        }
    }

    /// Wrap a raw value in this unit as a typed length.
    pub fn length(self, value: f64) -> Length {
        match self {
            Self::Micrometer => Length::new::<micrometer>(value),
            Self::Nanometer => Length::new::<nanometer>(value),
            Self::Angstrom => Length::new::<angstrom>(value),
            Self::Meter => Length::new::<meter>(value),
            Self::Centimeter => Length::new::<centimeter>(value),
        }
    }

    pub fn to_micrometers(self, value: f64) -> f64 {
        self.length(value).as_micrometers()
    }
}

/// Energy flux density per unit wavelength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxDensityUnit {
    /// erg s⁻¹ cm⁻² Å⁻¹, the canonical unit
    ErgPerAngstrom,
    ErgPerMicrometer,
    ErgPerNanometer,
    WattPerMicrometer,
    WattPerNanometer,
    WattPerMeter,
}

impl FluxDensityUnit {
    pub fn parse(unit: &str) -> Result<Self, UnitError> {
        let norm = normalise(unit);
        let norm = norm.as_str();

        if norm == "jy"
            || norm == "mjy"
            || norm == "ujy"
            || norm.ends_with("/hz")
            || norm.ends_with("hz-1")
        {
            return Err(UnitError::FrequencyDensity(unit.to_string()));
        }

        match norm {
            "erg/s/cm2/aa" | "erg/s/cm2/angstrom" | "flam" => Ok(Self::ErgPerAngstrom),
            "erg/s/cm2/um" | "erg/s/cm2/micron" => Ok(Self::ErgPerMicrometer),
            "erg/s/cm2/nm" => Ok(Self::ErgPerNanometer),
            "w/m2/um" | "w/m2/micron" => Ok(Self::WattPerMicrometer),
            "w/m2/nm" => Ok(Self::WattPerNanometer),
            "w/m2/m" | "w/m3" => Ok(Self::WattPerMeter),
            _ => Err(UnitError::UnknownFlux(unit.to_string())),
        }
    }

    /// Multiplicative factor taking a value in this unit to erg s⁻¹ cm⁻² Å⁻¹.
    pub fn to_cgs_angstrom_factor(self) -> f64 {
        // W m⁻² expressed in erg s⁻¹ cm⁻²
        const WATT_PER_M2_IN_CGS: f64 = 1.0e3;

        let per_length = |denominator: Length| {
            // Value per `denominator` of wavelength, re-expressed per Ångström
            Length::from_angstroms(1.0).get::<meter>() / denominator.get::<meter>()
        };

        match self {
            Self::ErgPerAngstrom => 1.0,
            Self::ErgPerMicrometer => per_length(Length::from_micrometers(1.0)),
            Self::ErgPerNanometer => per_length(Length::from_nanometers(1.0)),
            Self::WattPerMicrometer => {
                WATT_PER_M2_IN_CGS * per_length(Length::from_micrometers(1.0))
            }
            Self::WattPerNanometer => WATT_PER_M2_IN_CGS * per_length(Length::from_nanometers(1.0)),
            Self::WattPerMeter => WATT_PER_M2_IN_CGS * per_length(Length::new::<meter>(1.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_temperature_roundtrip() {
        let t = Temperature::from_kelvin(1000.0);
        assert_relative_eq!(t.as_kelvin(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_length_conversions() {
        let wavelength = Length::from_micrometers(1.5);
        assert_relative_eq!(wavelength.as_nanometers(), 1500.0, epsilon = 1e-9);
        assert_relative_eq!(wavelength.as_angstroms(), 15000.0, epsilon = 1e-6);
        assert_relative_eq!(wavelength.as_centimeters(), 1.5e-4, epsilon = 1e-15);
    }

    #[test]
    fn test_wavelength_unit_parse() {
        assert_eq!(WavelengthUnit::parse("um").unwrap(), WavelengthUnit::Micrometer);
        assert_eq!(WavelengthUnit::parse("Micron").unwrap(), WavelengthUnit::Micrometer);
        assert_eq!(WavelengthUnit::parse("AA").unwrap(), WavelengthUnit::Angstrom);
        assert_eq!(WavelengthUnit::parse(" nm ").unwrap(), WavelengthUnit::Nanometer);
        assert!(WavelengthUnit::parse("parsec").is_err());

        assert_relative_eq!(
            WavelengthUnit::Angstrom.to_micrometers(12000.0),
            1.2,
            epsilon = 1e-12
        );
        assert_relative_eq!(WavelengthUnit::Meter.to_micrometers(2e-6), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flux_unit_factors() {
        let f = |u: &str| FluxDensityUnit::parse(u).unwrap().to_cgs_angstrom_factor();
        assert_relative_eq!(f("erg/s/cm2/AA"), 1.0);
        assert_relative_eq!(f("erg/s/cm2/um"), 1e-4, epsilon = 1e-16);
        assert_relative_eq!(f("erg/s/cm2/nm"), 0.1, epsilon = 1e-14);
        assert_relative_eq!(f("W/m2/um"), 0.1, epsilon = 1e-14);
        assert_relative_eq!(f("W / m^2 / nm"), 100.0, epsilon = 1e-10);
        assert_relative_eq!(f("W/m2/m"), 1e-7, epsilon = 1e-19);
    }

    #[test]
    fn test_frequency_density_rejected() {
        assert!(matches!(
            FluxDensityUnit::parse("Jy"),
            Err(UnitError::FrequencyDensity(_))
        ));
        assert!(matches!(
            FluxDensityUnit::parse("erg/s/cm2/Hz"),
            Err(UnitError::FrequencyDensity(_))
        ));
        assert!(matches!(
            FluxDensityUnit::parse("furlong"),
            Err(UnitError::UnknownFlux(_))
        ));
    }
}
