//! Shared numerical components for the SOSS time-series simulator.
//!
//! Holds the generic pieces that are not specific to the spectrograph model:
//! 1D interpolation and polynomial helpers, seeded parallel chunk processing,
//! worker pool construction and random noise-field generation.

pub mod algo;
pub mod image_proc;
