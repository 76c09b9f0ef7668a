//! Noise generation for detector simulation
//!
//! - **generate**: seeded Gaussian fields and in-place noise injection

pub mod generate;

pub use generate::{add_gaussian_noise, gaussian_field};
