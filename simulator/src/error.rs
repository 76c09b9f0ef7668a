//! Error taxonomy for the simulator.
//!
//! Validation and reference-data failures are fatal and surface before any
//! worker pool starts. Per-column numeric failures are not errors; they are
//! reported as [`SkipReason`]s and collected into the run report.

use thiserror::Error;

use crate::units::UnitError;

/// Malformed input detected before computation begins
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("spectrum must be a sequence of 2 or 3 columns ([W, F] or [W, F, E]), got {0}")]
    ColumnCount(usize),
    #[error("spectrum column '{column}' has {got} samples, expected {expected}")]
    ColumnLength {
        column: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("spectrum needs at least 2 samples, got {0}")]
    TooFewSamples(usize),
    #[error("wavelengths must be strictly increasing (violated at index {0})")]
    NonMonotonicWavelength(usize),
    #[error("{column} value at index {index} is not finite and positive: {value}")]
    BadValue {
        column: &'static str,
        index: usize,
        value: f64,
    },
    #[error("wavelength column: {0}")]
    WavelengthUnit(UnitError),
    #[error("flux column: {0}")]
    FluxUnit(UnitError),
    #[error("spectral order {0} is not supported; choose 1 and/or 2")]
    UnsupportedOrder(u8),
    #[error("at least one spectral order must be selected")]
    NoOrders,
    #[error("unknown subarray '{0}'; expected SUBSTRIP96, SUBSTRIP256 or FULL")]
    UnknownSubarray(String),
    #[error("unknown filter '{0}'; expected CLEAR or F277W")]
    UnknownFilter(String),
    #[error("{0} must be at least 1")]
    ExposureCount(&'static str),
    #[error("invalid transit parameter '{name}': {reason}")]
    TransitParameter { name: &'static str, reason: String },
    #[error("limb darkening coefficients have shape {got:?}, expected {expected:?}")]
    LdcShape {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },
    #[error("a planet spectrum was supplied without transit parameters")]
    PlanetWithoutTransit,
    #[error("invalid configuration value '{name}': {reason}")]
    Config { name: &'static str, reason: String },
}

/// Fatal simulator error
#[derive(Debug, Error)]
pub enum TsoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("missing reference data: {0}")]
    MissingReferenceData(String),
    #[error("malformed reference data: {0}")]
    MalformedReferenceData(String),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tensor reshape failed: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[cfg(feature = "fits")]
    #[error(transparent)]
    Fits(#[from] crate::io::fits::FitsError),
}

/// Why a single (order, column) unit produced no light curve
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("limb darkening derivation failed: {0}")]
    LimbDarkening(String),
    #[error("no limb darkening coefficients available for this column")]
    MissingCoefficients,
    #[error("transit light curve is not finite")]
    DegenerateTransit,
}

/// A skipped unit with enough context to identify the offending input
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedUnit {
    pub order: u8,
    pub column: usize,
    pub wavelength_um: f64,
    pub reason: SkipReason,
}

impl std::fmt::Display for SkippedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order {} column {} ({:.4} um): {}",
            self.order, self.column, self.wavelength_um, self.reason
        )
    }
}
