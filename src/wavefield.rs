use crate::error::Result;
use crate::params::ArctanMode;
use crate::phase::unwrapped_phase;
use crate::unwrap::UnwrapMethod;
use ndarray::prelude::*;
use ndrustfft::Complex;
use std::sync::OnceLock;



/// A reconstructed complex wavefield. Intensity and phase are derived on
/// first access and kept for the lifetime of the value.
#[derive(Debug)]
pub struct ReconstructedWavefield {
    field: Array2<Complex<f64>>,
    arctan: ArctanMode,
    unwrap_method: UnwrapMethod,
    seed: u64,
    intensity: OnceLock<Array2<f64>>,
    phase: OnceLock<Array2<f64>>
}

impl ReconstructedWavefield {
    pub fn new(field: Array2<Complex<f64>>) -> Self {
        Self::with_phase_options(field, ArctanMode::default(), UnwrapMethod::default(), 42)
    }

    pub fn with_phase_options(
        field: Array2<Complex<f64>>,
        arctan: ArctanMode,
        unwrap_method: UnwrapMethod,
        seed: u64
    ) -> Self {
        Self {
            field,
            arctan,
            unwrap_method,
            seed,
            intensity: OnceLock::new(),
            phase: OnceLock::new()
        }
    }

    pub fn field(&self) -> ArrayView2<Complex<f64>> {
        self.field.view()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.field.dim()
    }

    // Elementwise magnitude
    pub fn intensity(&self) -> ArrayView2<f64> {
        self.intensity.get_or_init(|| self.field.mapv(|v| v.norm())).view()
    }

    // Unwrapped phase, determined modulo pi
    pub fn phase(&self) -> Result<ArrayView2<f64>> {
        if let Some(phase) = self.phase.get() {
            return Ok(phase.view());
        }

        let phase = unwrapped_phase(self.field.view(), self.arctan, self.unwrap_method, self.seed)?;

        Ok(self.phase.get_or_init(|| phase).view())
    }
}

impl PartialEq for ReconstructedWavefield {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}
