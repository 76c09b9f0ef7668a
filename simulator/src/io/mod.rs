//! File I/O for exposures and detector calibration

pub mod fits;

pub use fits::{
    load_calibration, load_reference, read_exposure, read_image, write_exposure,
    write_primary_image, FitsError,
};
