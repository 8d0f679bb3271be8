use crate::error::{HoloError, Result};
use crate::unwrap::UnwrapMethod;



/// Physical description of a recorded hologram
#[derive(Clone, Debug, PartialEq)]
pub struct HologramParams {
    /// Laser wavelength [m]
    pub wavelength: f64,
    /// Pixel width in x, unbinned [m]
    pub dx: f64,
    /// Pixel width in y, unbinned [m]
    pub dy: f64,
    /// Fraction of the detector width to ignore at every edge when searching
    /// for the spectral peak
    pub detector_edge_margin: f64,
    /// Spacing of the rows/columns that are candidates for background fitting
    pub background_interval: usize,
    /// Block size for down-sampling the raw hologram
    pub rebin_factor: usize
}

impl Default for HologramParams {
    fn default() -> Self {
        Self {
            wavelength: 405e-9,
            dx: 3.45e-6,
            dy: 3.45e-6,
            detector_edge_margin: 0.1,
            background_interval: 3,
            rebin_factor: 1
        }
    }
}

impl HologramParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.wavelength.is_finite() && self.wavelength > 0.) {
            return Err(HoloError::config(format!("wavelength must be positive, got {}", self.wavelength)));
        }

        if !(self.dx.is_finite() && self.dx > 0. && self.dy.is_finite() && self.dy > 0.) {
            return Err(HoloError::config(format!("pixel pitch must be positive, got ({}, {})", self.dx, self.dy)));
        }

        if !(0.0..0.5).contains(&self.detector_edge_margin) {
            return Err(HoloError::config(format!(
                "detector edge margin must be in [0, 0.5), got {}", self.detector_edge_margin
            )));
        }

        if self.background_interval == 0 {
            return Err(HoloError::config("background interval must be positive"));
        }

        if self.rebin_factor == 0 {
            return Err(HoloError::config("rebin factor must be positive"));
        }

        Ok(())
    }
}



/// Which arctangent to take of the complex field before unwrapping the
/// doubled phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArctanMode {
    /// `atan(im/re)`, the half-period form. 0/0 is reported as an error.
    #[default]
    HalfPeriod,
    /// `atan2(im, re)`. Identical to the half-period form modulo 2π once doubled.
    FourQuadrant
}

/// How rows/columns are scored when looking for specimen-free background
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoughnessMetric {
    /// Sum of absolute first differences along the line
    Absolute,
    /// Sum of signed first differences (end-to-end change along the line)
    #[default]
    Signed
}



/// Tuning constants of the reconstruction. The defaults reproduce the
/// reference behaviour; changing them changes the reconstructed image.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconstructionParams {
    /// Radius of the sideband mask before division by the rebin factor [px]
    pub mask_radius: f64,
    /// Blur applied to the spectrum magnitude before the peak search
    pub peak_sigma: f64,
    /// Blur applied to the unwrapped path-length map
    pub phase_sigma: f64,
    /// Blur applied to the 1D background profiles
    pub profile_sigma: f64,
    pub polynomial_order: usize,
    /// Number of background rows (and columns) used for the fit
    pub background_count: usize,
    pub refinement_iterations: usize,
    pub seed: u64,
    pub arctan: ArctanMode,
    pub roughness: RoughnessMetric,
    pub unwrap_method: UnwrapMethod
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        Self {
            mask_radius: 150.,
            peak_sigma: 10.,
            phase_sigma: 3.,
            profile_sigma: 50.,
            polynomial_order: 3,
            background_count: 100,
            refinement_iterations: 0,
            seed: 42,
            arctan: ArctanMode::HalfPeriod,
            roughness: RoughnessMetric::Signed,
            unwrap_method: UnwrapMethod::QualityGuided
        }
    }
}

impl ReconstructionParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.mask_radius.is_finite() && self.mask_radius > 0.) {
            return Err(HoloError::config(format!("mask radius must be positive, got {}", self.mask_radius)));
        }

        for (name, sigma) in [("peak", self.peak_sigma), ("phase", self.phase_sigma), ("profile", self.profile_sigma)] {
            if !(sigma.is_finite() && sigma >= 0.) {
                return Err(HoloError::config(format!("{name} sigma must be non-negative, got {sigma}")));
            }
        }

        if self.background_count == 0 {
            return Err(HoloError::config("background count must be positive"));
        }

        if self.polynomial_order >= self.background_count {
            return Err(HoloError::config(format!(
                "polynomial order {} needs more than {} background samples",
                self.polynomial_order, self.background_count
            )));
        }

        Ok(())
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(HologramParams::default().validate().is_ok());
        assert!(ReconstructionParams::default().validate().is_ok());
    }

    #[test]
    fn half_margin_is_rejected() {
        let params = HologramParams { detector_edge_margin: 0.5, ..Default::default() };
        assert!(params.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn zero_rebin_is_rejected() {
        let params = HologramParams { rebin_factor: 0, ..Default::default() };
        assert!(params.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn order_must_be_below_sample_count() {
        let params = ReconstructionParams { polynomial_order: 5, background_count: 5, ..Default::default() };
        assert!(params.validate().unwrap_err().is_configuration());
    }
}
