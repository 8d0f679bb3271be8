//! Hologram sessions: the reconstruction pipeline, the retained reference
//! wave, and the optional cache of finished reconstructions.

use crate::aberration::{background_candidates, AberrationCorrector};
use crate::error::{HoloError, Result};
use crate::grid::Grid;
use crate::kernel::transfer_function;
use crate::mask::{mask_radius, real_image_mask};
use crate::params::{HologramParams, ReconstructionParams};
use crate::peak::find_peak;
use crate::util::{fft2, ifft2, rebin};
use crate::wavefield::ReconstructedWavefield;
use ndarray::prelude::*;
use ndarray::par_azip;
use ndrustfft::Complex;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};



pub type ReferenceWave = Arc<Array2<Complex<f64>>>;

/// A square hologram after binning, with its physical parameters
#[derive(Clone, Debug)]
pub struct Hologram {
    data: Array2<f64>,
    params: HologramParams,
    grid: Grid
}

impl Hologram {
    pub fn new(raw: ArrayView2<f64>, params: HologramParams) -> Result<Self> {
        params.validate()?;

        let (h, w) = raw.dim();

        if h != w {
            return Err(HoloError::config(format!("hologram must be square, got ({h}, {w})")));
        }

        if h == 0 {
            return Err(HoloError::config("hologram is empty"));
        }

        if let Some(((row, col), v)) = raw.indexed_iter().find(|(_, v)| !(v.is_finite() && **v >= 0.)) {
            return Err(HoloError::config(format!(
                "pixel ({row}, {col}) holds {v}; intensities must be finite and non-negative"
            )));
        }

        let data = rebin(raw, params.rebin_factor)?;
        let factor = params.rebin_factor as f64;
        let grid = Grid::new(data.nrows(), params.dx*factor, params.dy*factor, params.wavelength);

        Ok(Self { data, params, grid })
    }

    pub fn open(path: impl AsRef<Path>, params: HologramParams) -> Result<Self> {
        let raw = crate::io::load_hologram(path)?;
        Self::new(raw.view(), params)
    }

    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn params(&self) -> &HologramParams {
        &self.params
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn n(&self) -> usize {
        self.grid.n
    }

    pub fn edge_margin(&self) -> usize {
        self.grid.edge_margin(self.params.detector_edge_margin)
    }
}



/// Every parameter a reconstruction depends on besides the reference wave.
/// Floats compare by bit pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    distance: u64,
    wavelength: u64,
    background_rows: Vec<usize>,
    background_columns: Vec<usize>,
    dx: u64,
    dy: u64,
    edge_margin: usize
}

impl CacheKey {
    fn new(hologram: &Hologram, distance: f64, candidates: &[usize]) -> Self {
        let grid = hologram.grid();

        Self {
            distance: distance.to_bits(),
            wavelength: grid.wavelength.to_bits(),
            background_rows: candidates.to_vec(),
            background_columns: candidates.to_vec(),
            dx: grid.dx.to_bits(),
            dy: grid.dy.to_bits(),
            edge_margin: hologram.edge_margin()
        }
    }

    // Cache slot. Entries keep their full key so a shared slot is detected.
    fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

struct CacheEntry {
    key: CacheKey,
    // Reference-wave generation the entry was reconstructed with
    generation: u64,
    wavefield: Arc<ReconstructedWavefield>
}

/// Where the sideband was found in the most recent reconstruction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakInfo {
    pub centroid: (usize, usize),
    pub mask_radius: f64
}

#[derive(Default)]
struct Session {
    reference: Option<ReferenceWave>,
    generation: u64,
    cache: HashMap<u64, CacheEntry>,
    last_peak: Option<PeakInfo>
}



pub struct ReconstructionEngine {
    hologram: Hologram,
    params: ReconstructionParams,
    candidates: Vec<usize>,
    caching: bool,
    session: Mutex<Session>
}

impl ReconstructionEngine {
    pub fn new(hologram: Hologram, params: ReconstructionParams) -> Result<Self> {
        params.validate()?;

        let candidates = background_candidates(hologram.n(), hologram.params().background_interval)?;

        // Fails early when too few background rows/columns exist for the fit
        AberrationCorrector::new(hologram.grid(), &params)?;

        if 2*hologram.edge_margin() >= hologram.n() {
            return Err(HoloError::config(format!(
                "edge margin of {} px leaves no room to search a {} px spectrum",
                hologram.edge_margin(), hologram.n()
            )));
        }

        Ok(Self { hologram, params, candidates, caching: false, session: Mutex::default() })
    }

    pub fn with_cache(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    pub fn hologram(&self) -> &Hologram {
        &self.hologram
    }

    pub fn params(&self) -> &ReconstructionParams {
        &self.params
    }

    pub fn reference_wave(&self) -> Option<ReferenceWave> {
        self.lock().reference.clone()
    }

    pub fn last_peak(&self) -> Option<PeakInfo> {
        self.lock().last_peak
    }

    pub fn cached(&self) -> usize {
        self.lock().cache.len()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconstruct the wavefield at `distance` metres from the hologram.
    ///
    /// A supplied reference wave replaces the retained one if it differs from
    /// it. Without one, the retained wave is reused, or derived once by
    /// aberration correction at this distance. Cached results made with an
    /// earlier reference wave are recomputed.
    pub fn reconstruct(&self, distance: f64, reference: Option<ReferenceWave>) -> Result<Arc<ReconstructedWavefield>> {
        if !distance.is_finite() || distance == 0. {
            return Err(HoloError::config(format!("propagation distance must be finite and non-zero, got {distance}")));
        }

        let n = self.hologram.n();

        if let Some(r) = &reference {
            if r.dim() != (n, n) {
                return Err(HoloError::config(format!("reference wave has shape {:?}, expected ({n}, {n})", r.dim())));
            }
        }

        let key = CacheKey::new(&self.hologram, distance, &self.candidates);
        let slot = key.digest();

        {
            let mut session = self.lock();

            if let Some(r) = reference {
                let unchanged = session.reference.as_ref().map_or(false, |old| Arc::ptr_eq(old, &r) || **old == *r);

                if !unchanged {
                    session.reference = Some(r);
                    session.generation += 1;
                }
            }

            if self.caching {
                if let Some(entry) = session.cache.get(&slot) {
                    if entry.key != key {
                        return Err(HoloError::CacheKeyCollision { distance });
                    }

                    if entry.generation == session.generation {
                        info!(distance, "reconstruction served from cache");
                        return Ok(entry.wavefield.clone());
                    }

                    debug!(distance, "cached reconstruction predates the reference wave, recomputing");
                }
            }
        }

        let grid = self.hologram.grid();
        let apodized = grid.apodize(self.hologram.data());
        let spectrum = fft2(apodized.mapv(|v| Complex::new(v, 0.)).view());

        let centroid = find_peak(spectrum.view(), self.hologram.edge_margin(), self.params.peak_sigma)?;
        let radius = mask_radius(self.params.mask_radius, self.hologram.params().rebin_factor);
        let mask = real_image_mask(n, centroid, radius);
        let g = transfer_function(grid, distance)?;

        debug!(x = centroid.0, y = centroid.1, radius, "sideband mask");

        let (reference, generation) = {
            let mut session = self.lock();

            session.last_peak = Some(PeakInfo { centroid, mask_radius: radius });

            let reference = if let Some(r) = session.reference.clone() {
                r
            }
            else {
                let r = Arc::new(self.estimate_reference(spectrum.view(), mask.view(), centroid, g.view())?);
                session.reference = Some(r.clone());
                r
            };

            (reference, session.generation)
        };

        let mut corrected = apodized.mapv(|v| Complex::new(v, 0.));
        par_azip!((v in &mut corrected, &r in reference.as_ref()) { *v *= r; });

        let mut masked = fft2(corrected.view());
        par_azip!((v in &mut masked, &m in &mask) { *v *= m; });

        let mut psi = grid.shift_to_centre(masked.view(), centroid);
        par_azip!((v in &mut psi, &k in &g) { *v *= k; });

        let field = grid.recentre(ifft2(psi.view()).view());
        let wavefield = Arc::new(ReconstructedWavefield::with_phase_options(
            field, self.params.arctan, self.params.unwrap_method, self.params.seed
        ));

        if !self.caching {
            return Ok(wavefield);
        }

        let mut session = self.lock();

        // The reference wave changed while this one was computed
        if session.generation != generation {
            return Ok(wavefield);
        }

        match session.cache.entry(slot) {
            Entry::Occupied(entry) if entry.get().key != key => Err(HoloError::CacheKeyCollision { distance }),
            Entry::Occupied(entry) if entry.get().generation == generation => Ok(entry.get().wavefield.clone()),
            Entry::Occupied(mut entry) => {
                entry.insert(CacheEntry { key, generation, wavefield: wavefield.clone() });
                Ok(wavefield)
            },
            Entry::Vacant(entry) => {
                entry.insert(CacheEntry { key, generation, wavefield: wavefield.clone() });
                Ok(wavefield)
            }
        }
    }

    fn estimate_reference(
        &self,
        spectrum: ArrayView2<Complex<f64>>,
        mask: ArrayView2<f64>,
        centroid: (usize, usize),
        g: ArrayView2<Complex<f64>>
    ) -> Result<Array2<Complex<f64>>> {
        let grid = self.hologram.grid();
        let corrector = AberrationCorrector::new(grid, &self.params)?;

        let mut masked = spectrum.to_owned();
        par_azip!((v in &mut masked, &m in &mask) { *v *= m; });

        let mut psi = grid.shift_to_centre(masked.view(), centroid);
        par_azip!((v in &mut psi, &k in &g) { *v *= k; });

        info!("estimating reference wave by aberration correction");

        corrector.reference_wave(grid.apodize_complex(psi.view()).view())
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    fn fringes(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, n), |(i, j)| {
            let phase = 2.*std::f64::consts::PI*(n as f64/4.)*(i+j) as f64/n as f64;
            2.+2.*phase.cos()
        })
    }

    fn engine(n: usize) -> ReconstructionEngine {
        let hologram = Hologram::new(fringes(n).view(), HologramParams::default()).unwrap();
        let params = ReconstructionParams { mask_radius: n as f64/6., background_count: 10, ..Default::default() };

        ReconstructionEngine::new(hologram, params).unwrap()
    }

    #[test]
    fn rejects_non_square_input() {
        let raw = Array2::<f64>::zeros((8, 6));
        assert!(Hologram::new(raw.view(), HologramParams::default()).unwrap_err().is_configuration());
    }

    #[test]
    fn binning_scales_pitch() {
        let params = HologramParams { rebin_factor: 2, ..Default::default() };
        let hologram = Hologram::new(Array2::<f64>::ones((16, 16)).view(), params).unwrap();

        assert_eq!(hologram.n(), 8);
        assert_eq!(hologram.grid().dx, 6.9e-6);
    }

    #[test]
    fn bad_distance_fails_before_work() {
        let engine = engine(64);

        assert!(engine.reconstruct(0., None).unwrap_err().is_configuration());
        assert!(engine.last_peak().is_none());
        assert!(engine.reference_wave().is_none());
    }

    #[test]
    fn reference_wave_is_retained_across_distances() {
        let engine = engine(64);

        engine.reconstruct(0.01, None).unwrap();
        let first = engine.reference_wave().unwrap();

        engine.reconstruct(0.02, None).unwrap();
        let second = engine.reference_wave().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn sideband_is_found() {
        let engine = engine(64);

        engine.reconstruct(0.01, None).unwrap();

        let peak = engine.last_peak().unwrap();
        assert!(peak.centroid == (16, 16) || peak.centroid == (48, 48));
    }

    #[test]
    fn cache_returns_same_object() {
        let engine = engine(64).with_cache(true);

        let a = engine.reconstruct(0.01, None).unwrap();
        let b = engine.reconstruct(0.01, None).unwrap();
        let c = engine.reconstruct(0.015, None).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_ne!(*a, *c);
        assert_eq!(engine.cached(), 2);
    }

    #[test]
    fn new_reference_recomputes_cached_key() {
        let engine = engine(64).with_cache(true);
        let estimated = engine.reconstruct(0.01, None).unwrap();

        let flat = Arc::new(Array2::from_elem((64, 64), Complex::new(1., 0.)));
        let replaced = engine.reconstruct(0.01, Some(flat.clone())).unwrap();

        assert_ne!(*estimated, *replaced);
        assert_eq!(engine.cached(), 1);
        assert!(Arc::ptr_eq(&engine.reference_wave().unwrap(), &flat));
        assert!(Arc::ptr_eq(&replaced, &engine.reconstruct(0.01, None).unwrap()));
    }

    #[test]
    fn same_reference_twice_hits_cache() {
        let engine = engine(64).with_cache(true);
        let flat = Arc::new(Array2::from_elem((64, 64), Complex::new(1., 0.)));

        let a = engine.reconstruct(0.01, Some(flat.clone())).unwrap();
        let b = engine.reconstruct(0.01, Some(flat.clone())).unwrap();

        // An equal wave in a different allocation counts as the same one
        let copy = Arc::new(flat.as_ref().clone());
        let c = engine.reconstruct(0.01, Some(copy)).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert!(Arc::ptr_eq(&engine.reference_wave().unwrap(), &flat));
    }

    #[test]
    fn foreign_entry_in_slot_is_a_collision() {
        let engine = engine(64).with_cache(true);
        let other = engine.reconstruct(0.02, None).unwrap();

        let key = CacheKey::new(&engine.hologram, 0.01, &engine.candidates);
        let foreign = CacheKey::new(&engine.hologram, 0.02, &engine.candidates);

        engine.lock().cache.insert(key.digest(), CacheEntry { key: foreign, generation: 0, wavefield: other });

        let err = engine.reconstruct(0.01, None).unwrap_err();
        assert!(matches!(err, HoloError::CacheKeyCollision { .. }));
    }

    #[test]
    fn bad_pixels_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, -1.] {
            let mut raw = fringes(16);
            raw[[3, 5]] = bad;

            let err = Hologram::new(raw.view(), HologramParams::default()).unwrap_err();
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn wrong_reference_shape_is_rejected() {
        let engine = engine(64);
        let small = Arc::new(Array2::from_elem((8, 8), Complex::new(1., 0.)));

        assert!(engine.reconstruct(0.01, Some(small)).unwrap_err().is_configuration());
    }
}
