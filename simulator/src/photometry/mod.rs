//! Photometry: sampled spectra, unit handling and analytic stellar models

pub mod spectrum;
pub mod stellar;

pub use spectrum::{energy_to_photon_flux, Spectrum, TransmissionSpectrum, UnitColumn, CGS};
pub use stellar::{blackbody_spectrum, default_blackbody, planck_flambda};
