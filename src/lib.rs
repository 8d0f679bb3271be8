//! Reconstruction of intensity and phase from off-axis digital holograms with
//! the convolution approach (Schnars & Juptner 2002, section 3.3), followed by
//! digital correction of reference-beam aberrations.
//!
//! ```no_run
//! use holorecon::{Hologram, HologramParams, ReconstructionEngine, ReconstructionParams};
//!
//! # fn main() -> holorecon::Result<()> {
//! let hologram = Hologram::open("hologram.tif", HologramParams::default())?;
//! let engine = ReconstructionEngine::new(hologram, ReconstructionParams::default())?;
//! let wavefield = engine.reconstruct(0.01, None)?;
//!
//! println!("{:?}", wavefield.phase()?.dim());
//! # Ok(())
//! # }
//! ```

pub mod aberration;
pub mod engine;
pub mod error;
pub mod filter;
pub mod grid;
pub mod io;
pub mod kernel;
pub mod mask;
pub mod params;
pub mod peak;
pub mod phase;
pub mod polyfit;
pub mod unwrap;
pub mod util;
pub mod wavefield;

pub use engine::{Hologram, PeakInfo, ReconstructionEngine, ReferenceWave};
pub use error::{HoloError, Result};
pub use params::{ArctanMode, HologramParams, ReconstructionParams, RoughnessMetric};
pub use unwrap::UnwrapMethod;
pub use wavefield::ReconstructedWavefield;
