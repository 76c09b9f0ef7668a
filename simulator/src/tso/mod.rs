//! Time-series observation pipeline: per-column light curves, frame
//! assembly along the traces, detector noise and the controller that ties
//! them together.

pub mod controller;
pub mod frames;
pub mod lightcurve;
pub mod metadata;
pub mod noise;
pub mod report;

pub use controller::{RunOptions, Tso};
pub use frames::FrameAssembler;
pub use lightcurve::{LightcurveSynthesizer, PlanetRadius, TransitInputs};
pub use metadata::ExposureMetadata;
pub use noise::{apply_reference_pixels, NoiseModel};
pub use report::{LdcSource, NoiseReport, RunReport};
