//! Exposure time axis.
//!
//! Each integration starts with `nresets` reset frames followed by `ngroups`
//! read frames, all spaced by the frame time. Reset frames carry no data and
//! are dropped from the axis.

use crate::error::ValidationError;

use super::Subarray;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Timestamps (days) of every read frame in an exposure
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    frame_time_s: f64,
    ngroups: usize,
    nints: usize,
    nresets: usize,
    start_days: f64,
    timestamps: Vec<f64>,
}

impl TimeAxis {
    pub fn new(
        frame_time_s: f64,
        ngroups: usize,
        nints: usize,
        nresets: usize,
        start_days: f64,
    ) -> Result<Self, ValidationError> {
        if ngroups == 0 {
            return Err(ValidationError::ExposureCount("ngroups"));
        }
        if nints == 0 {
            return Err(ValidationError::ExposureCount("nints"));
        }
        if !(frame_time_s.is_finite() && frame_time_s > 0.0) {
            return Err(ValidationError::Config {
                name: "frame_time",
                reason: format!("must be positive, got {frame_time_s}"),
            });
        }
        if !start_days.is_finite() {
            return Err(ValidationError::Config {
                name: "start_time",
                reason: "must be finite".to_string(),
            });
        }

        let frames_per_int = nresets + ngroups;
        let timestamps = (0..nints)
            .flat_map(|n| {
                (0..ngroups).map(move |g| {
                    let frame = n * frames_per_int + nresets + g;
                    start_days + frame as f64 * frame_time_s / SECONDS_PER_DAY
                })
            })
            .collect();

        Ok(Self {
            frame_time_s,
            ngroups,
            nints,
            nresets,
            start_days,
            timestamps,
        })
    }

    /// Time axis of a subarray readout with a single reset per integration.
    pub fn for_subarray(
        subarray: Subarray,
        ngroups: usize,
        nints: usize,
        start_days: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(
            subarray.geometry().frame_time_s,
            ngroups,
            nints,
            1,
            start_days,
        )
    }

    pub fn frame_time_s(&self) -> f64 {
        self.frame_time_s
    }

    pub fn ngroups(&self) -> usize {
        self.ngroups
    }

    pub fn nints(&self) -> usize {
        self.nints
    }

    pub fn nresets(&self) -> usize {
        self.nresets
    }

    pub fn nframes(&self) -> usize {
        self.timestamps.len()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Flat frame index of group `g` in integration `n`.
    pub fn frame_index(&self, n: usize, g: usize) -> usize {
        n * self.ngroups + g
    }

    /// Accumulated exposure (s) at group `g` of an integration.
    pub fn group_elapsed_s(&self, g: usize) -> f64 {
        (g + 1) as f64 * self.frame_time_s
    }

    /// Accumulated exposure (s) for every frame of the flattened axis.
    pub fn frame_elapsed_s(&self) -> Vec<f64> {
        (0..self.nframes())
            .map(|f| self.group_elapsed_s(f % self.ngroups))
            .collect()
    }

    pub fn start_days(&self) -> f64 {
        self.start_days
    }

    pub fn first(&self) -> f64 {
        self.timestamps[0]
    }

    pub fn last(&self) -> f64 {
        self.timestamps[self.timestamps.len() - 1]
    }

    /// Timestamp of the middle frame, the default transit epoch.
    pub fn mid(&self) -> f64 {
        self.timestamps[self.nframes() / 2]
    }

    /// End of the final read frame in days.
    pub fn end_days(&self) -> f64 {
        self.last() + self.frame_time_s / SECONDS_PER_DAY
    }

    pub fn contains(&self, t_days: f64) -> bool {
        t_days >= self.first() && t_days <= self.last()
    }
}
