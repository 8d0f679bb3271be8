use crate::error::{HoloError, Result};
use crate::params::ArctanMode;
use crate::unwrap::{unwrap, UnwrapMethod};
use ndarray::prelude::*;
use ndrustfft::Complex;



// Twice the wrapped phase of a complex field. The half-period arctan loses
// the sign of the field, which doubling turns into a whole period; this
// removes the alternating sign left by recentring the spectrum.
pub fn doubled_phase(field: ArrayView2<Complex<f64>>, mode: ArctanMode) -> Result<Array2<f64>> {
    let mut out = Array2::<f64>::zeros(field.dim());

    for ((row, col), v) in field.indexed_iter() {
        let phase = match mode {
            ArctanMode::HalfPeriod => (v.im/v.re).atan(),
            ArctanMode::FourQuadrant => v.im.atan2(v.re)
        };

        if phase.is_nan() {
            return Err(HoloError::IndeterminatePhase { row, col, re: v.re, im: v.im });
        }

        out[[row, col]] = 2.*phase;
    }

    Ok(out)
}

// Field magnitude relative to its largest value, so that the phase of dark
// pixels counts for less when unwrapping
pub fn amplitude_weights(field: ArrayView2<Complex<f64>>) -> Array2<f64> {
    let amplitude = field.mapv(|v| v.norm());
    let peak = amplitude.fold(0f64, |m, &v| m.max(v));

    if peak > 0. { amplitude/peak } else { Array2::ones(field.dim()) }
}

// Continuous phase of a complex field, determined modulo pi
pub fn unwrapped_phase(
    field: ArrayView2<Complex<f64>>,
    mode: ArctanMode,
    method: UnwrapMethod,
    seed: u64
) -> Result<Array2<f64>> {
    let doubled = doubled_phase(field, mode)?;
    let weights = amplitude_weights(field);
    let mut phase = unwrap(doubled.view(), weights.view(), method, seed);

    phase.mapv_inplace(|v| v/2.);
    Ok(phase)
}
