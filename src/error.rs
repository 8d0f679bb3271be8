use std::io;
use thiserror::Error;



pub type Result<T> = std::result::Result<T, HoloError>;

/// Everything that can go wrong while reconstructing a hologram
#[derive(Error, Debug)]
pub enum HoloError {
    /// Bad input shape or parameters, detected before any transform runs
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The half-period arctan hit 0/0
    #[error("indeterminate phase at row {row}, column {col} (re = {re}, im = {im})")]
    IndeterminatePhase { row: usize, col: usize, re: f64, im: f64 },

    #[error("spectral peak search region is empty (n = {n}, margin = {margin})")]
    EmptyPeakRegion { n: usize, margin: usize },

    /// Vandermonde matrix of the polynomial fit is numerically rank deficient
    #[error("polynomial fit is ill-conditioned (singular value ratio {ratio:e})")]
    IllConditionedFit { ratio: f64 },

    /// Two different parameter sets landed on the same cache slot
    #[error("cache key collision at propagation distance {distance} m")]
    CacheKeyCollision { distance: f64 },

    #[error("failed to read hologram: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode .npy array: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError)
}

impl HoloError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::IndeterminatePhase { .. } | Self::EmptyPeakRegion { .. } | Self::IllConditionedFit { .. }
        )
    }
}
