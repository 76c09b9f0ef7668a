//! Time-series observation simulator for a slitless near-infrared spectrograph
//!
//! This crate turns a 1D stellar spectrum (optionally transited by a planet)
//! into a stack of 4D detector ramps `(integrations, groups, rows, cols)`.
//! Each spectral order is dispersed along its trace and convolved with a
//! wavelength-dependent PSF. The result is then passed through a detector
//! noise model (dark ramp, non-linearity, pedestal, zodiacal background and
//! photon yield).
//!
//! The main entry point is [`tso::Tso`].

pub mod config;
pub mod error;
pub mod instrument;
#[cfg(feature = "fits")]
pub mod io;
pub mod photometry;
pub mod transit;
pub mod tso;
pub mod units;

pub use config::{NoiseConfig, SimulationConfig};
pub use error::{SkipReason, SkippedUnit, TsoError, ValidationError};
pub use instrument::{Filter, SpectralOrder, Subarray};
pub use photometry::{Spectrum, TransmissionSpectrum, UnitColumn};
pub use transit::{LimbDarkeningLaw, StellarParameters, TimeUnit, TransitParams};
pub use tso::{RunOptions, RunReport, Tso};
