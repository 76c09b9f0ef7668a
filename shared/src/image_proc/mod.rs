//! Image-plane helpers shared by the simulator.
//!
//! - **noise**: seeded Gaussian noise fields for detector calibration patterns
//!   and read noise

pub mod noise;

pub use noise::{add_gaussian_noise, gaussian_field};
