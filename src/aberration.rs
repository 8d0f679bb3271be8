//! Digital phase mask that cancels the systematic wavefront curvature of a
//! misaligned reference beam (Colomb et al. 2006, Appl. Opt. 45(5), eq. 26).
//!
//! The phase of a provisional reconstruction is unwrapped and converted to an
//! optical path length. Rows and columns whose path length varies least are
//! taken to be specimen-free background; their mean profiles along x and y
//! are fitted with polynomials, and the mask is the conjugate of the fitted
//! surface.

use crate::error::{HoloError, Result};
use crate::filter::{gaussian_filter, gaussian_filter1d};
use crate::grid::Grid;
use crate::params::{ReconstructionParams, RoughnessMetric};
use crate::phase::unwrapped_phase;
use crate::polyfit::Polynomial;
use crate::util::ifft2;
use ndarray::prelude::*;
use ndrustfft::Complex;
use tracing::{debug, warn};



/// Rows and columns chosen as background for the aberration fit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Background {
    pub rows: Vec<usize>,
    pub columns: Vec<usize>
}

/// Fitted aberration surface, P_x(x) + P_y(y) in metres of path length
#[derive(Clone, Debug)]
pub struct AberrationFit {
    pub x: Polynomial,
    pub y: Polynomial,
    pub background: Background
}

pub struct AberrationCorrector<'a> {
    grid: &'a Grid,
    params: &'a ReconstructionParams
}

impl<'a> AberrationCorrector<'a> {
    pub fn new(grid: &'a Grid, params: &'a ReconstructionParams) -> Result<Self> {
        let count = params.background_count.min(grid.n);

        if params.polynomial_order >= count {
            return Err(HoloError::config(format!(
                "polynomial order {} needs more than {count} background rows/columns",
                params.polynomial_order
            )));
        }

        Ok(Self { grid, params })
    }

    // `psi` is the apodized, centred sideband spectrum times the transfer
    // function at the current distance
    pub fn reference_wave(&self, psi: ArrayView2<Complex<f64>>) -> Result<Array2<Complex<f64>>> {
        let path = self.path_length(psi)?;
        let fit = self.fit(path.view())?;

        debug!(rows = fit.background.rows.len(), columns = fit.background.columns.len(), "fitted aberration surface");

        Ok(self.phase_mask(&fit))
    }

    // Smoothed optical path length map of the provisional reconstruction
    pub fn path_length(&self, psi: ArrayView2<Complex<f64>>) -> Result<Array2<f64>> {
        let field = self.grid.recentre(ifft2(psi).view());
        let k = self.grid.wavenumber();
        let mut path = unwrapped_phase(field.view(), self.params.arctan, self.params.unwrap_method, self.params.seed)?;

        path.mapv_inplace(|v| v/k);

        Ok(gaussian_filter(path.view(), self.params.phase_sigma))
    }

    // Every row and column competes; the interval grid only feeds the cache key
    pub fn select_background(&self, path: ArrayView2<f64>) -> Background {
        let metric = self.params.roughness;

        Background {
            rows: least_rough(&roughness(path, Axis(1), metric), self.params.background_count),
            columns: least_rough(&roughness(path, Axis(0), metric), self.params.background_count)
        }
    }

    pub fn fit(&self, path: ArrayView2<f64>) -> Result<AberrationFit> {
        let background = self.select_background(path);
        let sigma = self.params.profile_sigma;
        let coords = Array1::from_shape_fn(self.grid.n, |i| self.grid.centred(i));

        // Mean over background rows is a profile along x, and vice versa
        let profile_x = gaussian_filter1d(mean_of(path.select(Axis(0), &background.rows), Axis(0)).view(), sigma);
        let profile_y = gaussian_filter1d(mean_of(path.select(Axis(1), &background.columns), Axis(1)).view(), sigma);

        let x = self.fit_profile(coords.view(), profile_x.view())?;
        let y = self.fit_profile(coords.view(), profile_y.view())?;

        Ok(AberrationFit { x, y, background })
    }

    // Fit, then optionally refit the residual while that keeps reducing it
    fn fit_profile(&self, coords: ArrayView1<f64>, profile: ArrayView1<f64>) -> Result<Polynomial> {
        let order = self.params.polynomial_order;
        let mut poly = Polynomial::fit(coords, profile, order)?;
        let mut rms = poly.rms_residual(coords, profile);

        for i in 0..self.params.refinement_iterations {
            let residual = &profile-&poly.eval_all(coords);
            let refined = poly.add(&Polynomial::fit(coords, residual.view(), order)?);
            let refined_rms = refined.rms_residual(coords, profile);

            if !(refined_rms < rms) {
                warn!(iteration = i, rms, "aberration refinement stopped improving");
                break;
            }

            poly = refined;
            rms = refined_rms;
        }

        Ok(poly)
    }

    pub fn phase_mask(&self, fit: &AberrationFit) -> Array2<Complex<f64>> {
        let k = self.grid.wavenumber();
        let px: Vec<f64> = (0..self.grid.n).map(|j| fit.x.eval(self.grid.centred(j))).collect();
        let py: Vec<f64> = (0..self.grid.n).map(|i| fit.y.eval(self.grid.centred(i))).collect();

        Array2::from_shape_fn((self.grid.n, self.grid.n), |(i, j)| {
            Complex::new(0., -k*(px[j]+py[i])).exp()
        })
    }
}

// Interval grid of rows/columns recorded in the cache key
pub fn background_candidates(n: usize, interval: usize) -> Result<Vec<usize>> {
    if interval == 0 {
        return Err(HoloError::config("background interval must be positive"));
    }

    Ok((0..n).step_by(interval).collect())
}

// Roughness of every lane running along `axis`: Axis(1) scores rows,
// Axis(0) scores columns
fn roughness(path: ArrayView2<f64>, axis: Axis, metric: RoughnessMetric) -> Array1<f64> {
    let lanes = path.lanes(axis);

    Array1::from_iter(lanes.into_iter().map(|lane| {
        lane.windows(2).into_iter()
            .map(|pair| pair[1]-pair[0])
            .map(|d| match metric {
                RoughnessMetric::Absolute => d.abs(),
                RoughnessMetric::Signed => d
            })
            .sum::<f64>()
    }))
}

// Indices of the `count` lowest scores, ties kept in index order
fn least_rough(scores: &Array1<f64>, count: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..scores.len()).collect();

    ranked.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    ranked.truncate(count);
    ranked
}

fn mean_of(arr: Array2<f64>, axis: Axis) -> Array1<f64> {
    let len = arr.len_of(axis).max(1) as f64;
    arr.sum_axis(axis)/len
}



#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Grid {
        Grid::new(n, 3.45e-6, 3.45e-6, 405e-9)
    }

    #[test]
    fn candidates_follow_interval() {
        assert_eq!(background_candidates(10, 3).unwrap(), vec![0, 3, 6, 9]);
        assert!(background_candidates(10, 0).unwrap_err().is_configuration());
    }

    #[test]
    fn roughness_scores_lanes() {
        let path = array![[0., 1., 0.], [0., 0., 0.], [5., 5., 5.]];

        assert_eq!(roughness(path.view(), Axis(1), RoughnessMetric::Absolute), array![2., 0., 0.]);
        assert_eq!(roughness(path.view(), Axis(1), RoughnessMetric::Signed), array![0., 0., 0.]);
        assert_eq!(roughness(path.view(), Axis(0), RoughnessMetric::Absolute), array![5., 6., 5.]);
    }

    #[test]
    fn quietest_rows_win_with_stable_ties() {
        let scores = array![3., 0., 1., 0., 2.];
        assert_eq!(least_rough(&scores, 3), vec![1, 3, 2]);
        assert_eq!(least_rough(&scores, 10), vec![1, 3, 2, 4, 0]);
    }

    #[test]
    fn too_few_lines_for_order() {
        let g = grid(3);
        let params = ReconstructionParams::default();

        let err = AberrationCorrector::new(&g, &params).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn quiet_row_off_interval_grid_is_selected() {
        let g = grid(256);
        let params = ReconstructionParams::default();
        let corrector = AberrationCorrector::new(&g, &params).unwrap();

        // Every row climbs along x, more steeply further down, except row 100
        let path = Array2::from_shape_fn((256, 256), |(i, j)| {
            if i == 100 { 0. } else { 1e-9*(i+1) as f64*j as f64 }
        });
        let background = corrector.select_background(path.view());

        assert_eq!(background.rows.len(), 100);
        assert_eq!(background.rows[0], 100);
        assert_eq!(background.columns.len(), 100);
    }

    #[test]
    fn separable_curvature_is_recovered() {
        let g = grid(64);
        let params = ReconstructionParams { profile_sigma: 0., ..Default::default() };
        let corrector = AberrationCorrector::new(&g, &params).unwrap();

        let fx = |x: f64| 1e-9*x*x;
        let fy = |y: f64| -2e-9*y+3e-12*y*y*y;
        let path = Array2::from_shape_fn((64, 64), |(i, j)| fx(g.centred(j))+fy(g.centred(i)));

        let fit = corrector.fit(path.view()).unwrap();
        let surface = Array2::from_shape_fn((64, 64), |(i, j)| fit.x.eval(g.centred(j))+fit.y.eval(g.centred(i)));

        // Both profiles carry the mean of the other axis; only the sum's shape matters
        let offset = (&surface-&path).mean().unwrap();
        azip!((&s in &surface, &p in &path) assert!((s-p-offset).abs() < 1e-13));
    }

    #[test]
    fn mask_flattens_a_tilted_field() {
        let g = grid(64);
        let params = ReconstructionParams { profile_sigma: 0., ..Default::default() };
        let corrector = AberrationCorrector::new(&g, &params).unwrap();
        let k = g.wavenumber();

        // Tilt of a few radians across the frame, in path length
        let path = Array2::from_shape_fn((64, 64), |(i, j)| (0.05*g.centred(j)+0.03*g.centred(i))/k);
        let fit = corrector.fit(path.view()).unwrap();
        let mask = corrector.phase_mask(&fit);

        let corrected = Array2::from_shape_fn((64, 64), |(i, j)| {
            Complex::new(0., k*path[[i, j]]).exp()*mask[[i, j]]
        });
        let reference = corrected[[32, 32]];

        corrected.iter().for_each(|v| assert!((v-reference).norm() < 1e-6));
    }
}
