mod dct;
mod quality;

use ndarray::prelude::*;
use std::f64::consts::TAU;

pub use dct::unwrap as unwrap_dct;
pub use quality::unwrap as unwrap_quality;



#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnwrapMethod {
    /// Reliability-guided flood fill, seeded for reproducible tie breaking.
    /// Ranks pixels by phase smoothness alone and ignores the weights.
    #[default]
    QualityGuided,
    /// Weighted least squares through DCT Poisson solves, refined by up to
    /// `iterations` Picard steps
    Dct { iterations: usize }
}

// Unwrap a 2D array of phases wrapped to [-pi, pi]. `weights` in [0, 1]
// mark how far each pixel's phase can be trusted.
pub fn unwrap(wrapped: ArrayView2<f64>, weights: ArrayView2<f64>, method: UnwrapMethod, seed: u64) -> Array2<f64> {
    let mut unwrapped = Array2::<f64>::zeros(wrapped.dim());

    if wrapped.is_empty() { return unwrapped; }

    match method {
        UnwrapMethod::QualityGuided => unwrap_quality(wrapped, seed, unwrapped.view_mut()),
        UnwrapMethod::Dct { iterations } => unwrap_dct(wrapped, weights, iterations, unwrapped.view_mut())
    }

    unwrapped
}

// Wrap a phase difference to [-pi, pi]
pub(crate) fn wrap(v: f64) -> f64 {
    v-TAU*(v/TAU).round()
}
