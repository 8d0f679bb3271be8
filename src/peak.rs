use crate::error::{HoloError, Result};
use crate::filter::gaussian_filter;
use ndarray::prelude::*;
use ndrustfft::Complex;
use tracing::debug;



// Find the off-axis sideband in the spectrum of an apodized hologram.
// Returns (x, y), i.e. (column, row), in full-array coordinates.
pub fn find_peak(spectrum: ArrayView2<Complex<f64>>, margin: usize, sigma: f64) -> Result<(usize, usize)> {
    let (h, w) = spectrum.dim();

    if 2*margin >= h || 2*margin >= w {
        return Err(HoloError::EmptyPeakRegion { n: h.min(w), margin });
    }

    let magnitude = spectrum
        .slice(s![margin..h-margin, margin..w-margin])
        .mapv(|v| v.norm());
    let blurred = gaussian_filter(magnitude.view(), sigma);

    let mut best = (0, 0);
    let mut best_value = f64::NEG_INFINITY;

    // Columns outer, rows inner. First strict maximum wins.
    for (x, column) in blurred.columns().into_iter().enumerate() {
        for (y, &v) in column.iter().enumerate() {
            if v > best_value {
                best_value = v;
                best = (x, y);
            }
        }
    }

    let peak = (best.0+margin, best.1+margin);

    debug!(x = peak.0, y = peak.1, value = best_value, "located spectral peak");

    Ok(peak)
}
