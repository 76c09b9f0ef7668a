//! Per-order quantities precomputed once per session.
//!
//! Everything the light-curve and frame-assembly stages need per column is
//! resolved here: the column wavelength, throughput, photon-to-ADU factor
//! and where on the detector the column's PSF kernel lands.

use std::ops::Range;

use log::debug;

use super::reference::OrderReference;
use super::wavelength::column_dispersion_angstrom;
use super::{SpectralOrder, SubarrayGeometry, MIRROR_AREA_CM2};
use crate::error::TsoError;

/// Where a column's kernel is deposited
///
/// Kernel row `i` lands on detector rows `base_row + i` (weight `1 - frac`)
/// and `base_row + i + 1` (weight `frac`); kernel column `j` lands on
/// `column - half_width + j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnPlacement {
    pub column: usize,
    pub psf_index: usize,
    pub base_row: isize,
    pub frac: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderModel {
    order: SpectralOrder,
    shape: (usize, usize),
    column_wavelengths: Vec<f64>,
    response: Vec<f64>,
    pfd2adu: Vec<f64>,
    valid_columns: Range<usize>,
    placements: Vec<ColumnPlacement>,
}

impl OrderModel {
    /// Fails with [`TsoError::MalformedReferenceData`] when the wavelength
    /// map is too sparse to derive a dispersion.
    pub fn build(
        reference: &OrderReference,
        geometry: &SubarrayGeometry,
        gain: f64,
    ) -> Result<Self, TsoError> {
        let column_wavelengths = reference.wavelength_map.column_wavelengths();

        let response = column_wavelengths
            .iter()
            .map(|&w| if w > 0.0 { reference.response.at(w) } else { 0.0 })
            .collect();

        let pfd2adu = column_dispersion_angstrom(&column_wavelengths)
            .map_err(|e| {
                TsoError::MalformedReferenceData(format!(
                    "{} wavelength map: cannot fit dispersion: {e}",
                    reference.order
                ))
            })?
            .into_iter()
            .map(|d_lambda| d_lambda * MIRROR_AREA_CM2 / gain)
            .collect();

        let (kernel_rows, _) = reference.psf.kernel_shape();
        let half_rows = (kernel_rows / 2) as isize;
        let valid = reference.trace.valid_columns();
        let valid_columns = valid.start.min(geometry.cols)..valid.end.min(geometry.cols);

        let placements: Vec<ColumnPlacement> = valid_columns
            .clone()
            .map(|column| {
                let row = reference.trace.row_at(column as f64);
                let floor = row.floor();
                ColumnPlacement {
                    column,
                    psf_index: reference.psf.nearest_index(column_wavelengths[column]),
                    base_row: floor as isize - half_rows,
                    frac: row - floor,
                }
            })
            .collect();

        debug!(
            "Built {} model: {} placed columns in {:?}",
            reference.order,
            placements.len(),
            valid_columns
        );

        Ok(Self {
            order: reference.order,
            shape: geometry.shape(),
            column_wavelengths,
            response,
            pfd2adu,
            valid_columns,
            placements,
        })
    }

    pub fn order(&self) -> SpectralOrder {
        self.order
    }

    /// Detector (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn ncols(&self) -> usize {
        self.column_wavelengths.len()
    }

    pub fn column_wavelengths(&self) -> &[f64] {
        &self.column_wavelengths
    }

    pub fn wavelength(&self, column: usize) -> f64 {
        self.column_wavelengths[column]
    }

    pub fn response(&self, column: usize) -> f64 {
        self.response[column]
    }

    /// Photon flux density (photons s⁻¹ cm⁻² Å⁻¹) to ADU/s for `column`.
    pub fn pfd2adu(&self, column: usize) -> f64 {
        self.pfd2adu[column]
    }

    pub fn valid_columns(&self) -> Range<usize> {
        self.valid_columns.clone()
    }

    pub fn placements(&self) -> &[ColumnPlacement] {
        &self.placements
    }
}
