//! Frame assembly: deposit each column's PSF kernel along the trace.

use ndarray::{Array2, Array3, ArrayViewMut2, Axis};
use rayon::prelude::*;

use crate::instrument::{OrderModel, PsfCube};

/// Builds accumulated-count frames of one order
pub struct FrameAssembler<'a> {
    model: &'a OrderModel,
    psf: &'a PsfCube,
}

impl<'a> FrameAssembler<'a> {
    pub fn new(model: &'a OrderModel, psf: &'a PsfCube) -> Self {
        Self { model, psf }
    }

    /// Add one frame of counts into `frame`.
    ///
    /// `rates` is (cols, frames) in ADU/s; `elapsed_s` is the accumulation
    /// time of this frame. Kernel pixels landing off the detector are lost.
    pub fn deposit(
        &self,
        rates: &Array2<f64>,
        frame_idx: usize,
        elapsed_s: f64,
        mut frame: ArrayViewMut2<'_, f64>,
    ) {
        let (rows, cols) = frame.dim();
        let (rows, cols) = (rows as isize, cols as isize);
        let (_, kernel_cols) = self.psf.kernel_shape();
        let half_cols = (kernel_cols / 2) as isize;

        for placement in self.model.placements() {
            let scale = rates[[placement.column, frame_idx]] * elapsed_s;
            if scale == 0.0 {
                continue;
            }
            let kernel = self.psf.slice(placement.psf_index);
            let lower = scale * (1.0 - placement.frac);
            let upper = scale * placement.frac;

            for ((i, j), &k) in kernel.indexed_iter() {
                let col = placement.column as isize - half_cols + j as isize;
                if col < 0 || col >= cols {
                    continue;
                }
                let row = placement.base_row + i as isize;
                if (0..rows).contains(&row) {
                    frame[[row as usize, col as usize]] += k * lower;
                }
                if upper != 0.0 && (0..rows).contains(&(row + 1)) {
                    frame[[row as usize + 1, col as usize]] += k * upper;
                }
            }
        }
    }

    /// All frames of the order, shaped (frames, rows, cols).
    pub fn assemble(&self, rates: &Array2<f64>, elapsed_s: &[f64]) -> Array3<f64> {
        let (rows, cols) = self.model.shape();
        let mut frames = Array3::zeros((elapsed_s.len(), rows, cols));
        frames
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(idx, frame)| self.deposit(rates, idx, elapsed_s[idx], frame));
        frames
    }
}
