//! Reference data bundle owned by a simulation session.

use super::calibration::{CalibrationSet, SYNTHETIC_CALIBRATION_SEED};
use super::psf::PsfCube;
use super::response::SpectralResponse;
use super::trace::TracePolynomial;
use super::wavelength::WavelengthMap;
use super::{Filter, SpectralOrder, Subarray, SubarrayGeometry};
use crate::error::TsoError;

/// Everything needed to place one order on the detector
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReference {
    pub order: SpectralOrder,
    pub wavelength_map: WavelengthMap,
    pub trace: TracePolynomial,
    pub psf: PsfCube,
    pub response: SpectralResponse,
}

impl OrderReference {
    pub fn synthetic(order: SpectralOrder, subarray: Subarray, filter: Filter) -> Self {
        let geometry = subarray.geometry();
        let trace = TracePolynomial::synthetic(order, subarray);
        let wavelength_map = WavelengthMap::synthetic(order, &geometry, &trace);
        Self {
            order,
            wavelength_map,
            trace,
            psf: PsfCube::synthetic(),
            response: SpectralResponse::synthetic(order, filter),
        }
    }
}

/// Per-order optics plus detector calibration for one subarray/filter
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceData {
    pub geometry: SubarrayGeometry,
    /// Order 1 then order 2
    pub orders: [OrderReference; 2],
    pub calibration: CalibrationSet,
}

impl ReferenceData {
    /// Assemble reference data, checking every map against the geometry.
    pub fn new(
        geometry: SubarrayGeometry,
        orders: [OrderReference; 2],
        calibration: CalibrationSet,
    ) -> Result<Self, TsoError> {
        let data = Self {
            geometry,
            orders,
            calibration,
        };
        data.validate()?;
        Ok(data)
    }

    /// Built-in reference data; needs no files.
    pub fn synthetic(subarray: Subarray, filter: Filter) -> Result<Self, TsoError> {
        let geometry = subarray.geometry();
        let orders = SpectralOrder::ALL.map(|o| OrderReference::synthetic(o, subarray, filter));
        let calibration = CalibrationSet::synthetic(
            &geometry,
            [&orders[0].wavelength_map, &orders[1].wavelength_map],
            SYNTHETIC_CALIBRATION_SEED,
        )?;
        Self::new(geometry, orders, calibration)
    }

    pub fn order(&self, order: SpectralOrder) -> &OrderReference {
        &self.orders[order.index()]
    }

    pub fn validate(&self) -> Result<(), TsoError> {
        let shape = self.geometry.shape();
        for (idx, reference) in self.orders.iter().enumerate() {
            if reference.order.index() != idx {
                return Err(TsoError::MalformedReferenceData(format!(
                    "reference slot {} holds {}",
                    idx + 1,
                    reference.order
                )));
            }
            if reference.wavelength_map.shape() != shape {
                return Err(TsoError::MalformedReferenceData(format!(
                    "{} wavelength map has shape {:?}, expected {:?}",
                    reference.order,
                    reference.wavelength_map.shape(),
                    shape
                )));
            }
            if reference.trace.valid_columns().end > shape.1 {
                return Err(TsoError::MalformedReferenceData(format!(
                    "{} trace valid range {:?} exceeds {} columns",
                    reference.order,
                    reference.trace.valid_columns(),
                    shape.1
                )));
            }
        }
        if self.calibration.shape() != shape {
            return Err(TsoError::MalformedReferenceData(format!(
                "calibration maps have shape {:?}, expected {:?}",
                self.calibration.shape(),
                shape
            )));
        }
        Ok(())
    }
}
