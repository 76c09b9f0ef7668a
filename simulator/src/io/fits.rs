//! FITS export of simulated exposures and import of detector calibration maps
//!
//! Arrays are stored in row-major order: an `(nints, ngroups, rows, cols)`
//! tensor is written with NAXIS1 = cols, NAXIS4 = nints.

use std::path::Path;

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use log::{debug, info};
use ndarray::{Array4, ArrayD, ArrayView, Axis, Dimension, Ix2, Ix3, Ix4, IxDyn, Slice};
use thiserror::Error;

use crate::error::TsoError;
use crate::instrument::{
    CalibrationSet, Filter, OrderReference, ReferenceData, SpectralOrder, Subarray,
    SubarrayGeometry,
};
use crate::tso::metadata::{
    DETECTOR, EXPOSURE_TYPE, INSTRUMENT, PUPIL, READ_PATTERN, TELESCOPE,
};
use crate::tso::{ExposureMetadata, Tso};

/// Errors that can occur during FITS file operations
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::errors::Error),
    #[error("HDU not found: {0}")]
    HduNotFound(String),
    #[error("HDU '{0}' does not hold an image")]
    NotAnImage(String),
    #[error("cannot shape data of HDU '{hdu}' as {shape:?}")]
    Reshape { hdu: String, shape: Vec<usize> },
}

pub const DARK_SIGNAL_FILE: &str = "dark_signal.fits";
pub const NONLINEARITY_FILE: &str = "nonlinearity.fits";
pub const PEDESTAL_FILE: &str = "pedestal.fits";
pub const ZODIACAL_FILE: &str = "zodiacal.fits";
pub const PHOTON_YIELD_FILE: &str = "photon_yield.fits";

/// Read an image HDU, the primary one when `hdu_name` is `None`.
pub fn read_image<P: AsRef<Path>>(path: P, hdu_name: Option<&str>) -> Result<ArrayD<f64>, FitsError> {
    let mut fptr = FitsFile::open(path.as_ref())?;
    let (hdu, label) = match hdu_name {
        Some(name) => (
            fptr.hdu(name)
                .map_err(|_| FitsError::HduNotFound(name.to_string()))?,
            name.to_string(),
        ),
        None => (fptr.primary_hdu()?, "PRIMARY".to_string()),
    };

    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => shape.clone(),
        _ => return Err(FitsError::NotAnImage(label)),
    };
    let data: Vec<f64> = hdu.read_image(&mut fptr)?;
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| FitsError::Reshape { hdu: label, shape })
}

/// The `SCI` extension of an exposure written by [`write_exposure`].
pub fn read_exposure<P: AsRef<Path>>(path: P) -> Result<Array4<f64>, FitsError> {
    let data = read_image(path, Some("SCI"))?;
    let shape = data.shape().to_vec();
    data.into_dimensionality::<Ix4>().map_err(|_| FitsError::Reshape {
        hdu: "SCI".to_string(),
        shape,
    })
}

/// Write `array` as the primary image of a new file.
pub fn write_primary_image<P, D>(path: P, array: ArrayView<'_, f64, D>) -> Result<(), FitsError>
where
    P: AsRef<Path>,
    D: Dimension,
{
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: array.shape(),
    };
    let mut fptr = FitsFile::create(path.as_ref())
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;
    let flat: Vec<f64> = array.iter().copied().collect();
    hdu.write_image(&mut fptr, &flat)?;
    Ok(())
}

fn write_image_hdu<D: Dimension>(
    fptr: &mut FitsFile,
    name: &str,
    array: ArrayView<'_, f64, D>,
) -> Result<(), FitsError> {
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: array.shape(),
    };
    let hdu = fptr.create_image(name.to_string(), &description)?;
    let flat: Vec<f64> = array.iter().copied().collect();
    hdu.write_image(fptr, &flat)?;
    Ok(())
}

fn write_header(fptr: &mut FitsFile, hdu: &FitsHdu, meta: &ExposureMetadata) -> Result<(), FitsError> {
    let text = [
        ("TELESCOP", TELESCOPE.to_string()),
        ("INSTRUME", INSTRUMENT.to_string()),
        ("DETECTOR", DETECTOR.to_string()),
        ("FILTER", meta.filter.to_string()),
        ("PUPIL", PUPIL.to_string()),
        ("EXP_TYPE", EXPOSURE_TYPE.to_string()),
        ("READPATT", READ_PATTERN.to_string()),
        ("SUBARRAY", meta.subarray.to_string()),
        ("TARGNAME", meta.target.clone()),
        ("TITLE", meta.title.clone()),
        ("DATE-OBS", meta.obs_date.clone()),
        ("TIME-OBS", meta.obs_time.clone()),
    ];
    for (key, value) in text {
        hdu.write_key(fptr, key, value)?;
    }

    let integers = [
        ("NINTS", meta.nints as i64),
        ("NGROUPS", meta.ngroups as i64),
        ("NFRAMES", meta.nframes as i64),
        ("GROUPGAP", meta.group_gap as i64),
        ("SUBSTRT1", meta.substart.0 as i64),
        ("SUBSTRT2", meta.substart.1 as i64),
        ("SUBSIZE1", meta.subsize.0 as i64),
        ("SUBSIZE2", meta.subsize.1 as i64),
        ("FASTAXIS", meta.fast_axis as i64),
        ("SLOWAXIS", meta.slow_axis as i64),
    ];
    for (key, value) in integers {
        hdu.write_key(fptr, key, value)?;
    }

    let floats = [
        ("TFRAME", meta.frame_time_s),
        ("TGROUP", meta.group_time_s),
        ("EXPSTART", meta.exp_start),
        ("EXPMID", meta.exp_mid),
        ("EXPEND", meta.exp_end),
        ("GAIN", meta.gain),
    ];
    for (key, value) in floats {
        hdu.write_key(fptr, key, value)?;
    }
    Ok(())
}

/// Write the exposure of `tso` with its descriptive header.
///
/// The `SCI` extension always holds the final ramps. With `include_ideal`
/// the noise-free sum (`IDEAL`) and each simulated order (`ORDER1`,
/// `ORDER2`) are added.
pub fn write_exposure<P: AsRef<Path>>(path: P, tso: &Tso, include_ideal: bool) -> Result<(), FitsError> {
    let path = path.as_ref();
    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let primary = fptr.primary_hdu()?;
    write_header(&mut fptr, &primary, &tso.metadata())?;

    write_image_hdu(&mut fptr, "SCI", tso.exposure().view())?;
    if include_ideal {
        write_image_hdu(&mut fptr, "IDEAL", tso.ideal().view())?;
        for &order in tso.orders() {
            let name = format!("ORDER{}", order.number());
            write_image_hdu(&mut fptr, &name, tso.order_ideal(order).view())?;
        }
    }

    info!("Wrote exposure {:?} to {}", tso.exposure().dim(), path.display());
    Ok(())
}

/// Read one calibration map and cut it to the subarray rows.
///
/// Maps may cover either the subarray or the full detector.
fn load_map(dir: &Path, file: &str, ndim: usize, geometry: &SubarrayGeometry) -> Result<ArrayD<f64>, TsoError> {
    let path = dir.join(file);
    if !path.is_file() {
        return Err(TsoError::MissingReferenceData(path.display().to_string()));
    }
    let map = read_image(&path, None)?;
    if map.ndim() != ndim {
        return Err(TsoError::MalformedReferenceData(format!(
            "{file} has {} axes, expected {ndim}",
            map.ndim()
        )));
    }

    let rows_axis = Axis(ndim - 2);
    let plane = (map.len_of(rows_axis), map.len_of(Axis(ndim - 1)));
    if plane == geometry.shape() {
        return Ok(map);
    }
    if plane == Subarray::Full.geometry().shape() && plane.1 == geometry.cols {
        let start = geometry.yloc - 1;
        debug!("Cropping full-frame {file} to rows {start}..{}", start + geometry.rows);
        return Ok(map
            .slice_axis(rows_axis, Slice::from(start..start + geometry.rows))
            .to_owned());
    }
    Err(TsoError::MalformedReferenceData(format!(
        "{file} covers {plane:?} pixels, expected {:?} or the full frame",
        geometry.shape()
    )))
}

fn malformed(file: &str) -> TsoError {
    TsoError::MalformedReferenceData(format!("{file} has the wrong dimensionality"))
}

/// Load the detector calibration maps from `dir`.
pub fn load_calibration(dir: &Path, geometry: &SubarrayGeometry) -> Result<CalibrationSet, TsoError> {
    let dark = load_map(dir, DARK_SIGNAL_FILE, 2, geometry)?
        .into_dimensionality::<Ix2>()
        .map_err(|_| malformed(DARK_SIGNAL_FILE))?;
    let nonlinearity = load_map(dir, NONLINEARITY_FILE, 3, geometry)?
        .into_dimensionality::<Ix3>()
        .map_err(|_| malformed(NONLINEARITY_FILE))?;
    let pedestal = load_map(dir, PEDESTAL_FILE, 2, geometry)?
        .into_dimensionality::<Ix2>()
        .map_err(|_| malformed(PEDESTAL_FILE))?;
    let zodiacal = load_map(dir, ZODIACAL_FILE, 2, geometry)?
        .into_dimensionality::<Ix2>()
        .map_err(|_| malformed(ZODIACAL_FILE))?;
    let photon_yield = load_map(dir, PHOTON_YIELD_FILE, 3, geometry)?
        .into_dimensionality::<Ix3>()
        .map_err(|_| malformed(PHOTON_YIELD_FILE))?;

    info!("Loaded detector calibration from {}", dir.display());
    CalibrationSet::new(
        geometry.shape(),
        dark,
        nonlinearity,
        pedestal,
        zodiacal,
        photon_yield,
    )
}

/// Built-in optics with detector calibration read from `dir`.
pub fn load_reference(dir: &Path, subarray: Subarray, filter: Filter) -> Result<ReferenceData, TsoError> {
    let geometry = subarray.geometry();
    let calibration = load_calibration(dir, &geometry)?;
    let orders = SpectralOrder::ALL.map(|o| OrderReference::synthetic(o, subarray, filter));
    ReferenceData::new(geometry, orders, calibration)
}
