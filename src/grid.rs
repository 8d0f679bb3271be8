use crate::util::roll;
use ndarray::prelude::*;
use ndarray::par_azip;
use ndrustfft::Complex;
use std::f64::consts::PI;



/// Square pixel grid of side `n`, centred at n/2. Row index is y, column
/// index is x, for every array in the pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    pub n: usize,
    pub dx: f64,
    pub dy: f64,
    pub wavelength: f64
}

impl Grid {
    pub fn new(n: usize, dx: f64, dy: f64, wavelength: f64) -> Self {
        Self { n, dx, dy, wavelength }
    }

    pub fn wavenumber(&self) -> f64 {
        2.*PI/self.wavelength
    }

    pub fn centre(&self) -> f64 {
        self.n as f64/2.
    }

    // Offset of pixel index `i` from the grid centre
    pub fn centred(&self, i: usize) -> f64 {
        i as f64-self.centre()
    }

    pub fn edge_margin(&self, fraction: f64) -> usize {
        (self.n as f64*fraction).floor() as usize
    }

    // Separable cosine taper that is ~0 on row 0 and column 0 and 1 at the centre
    pub fn window(&self) -> Array2<f64> {
        let n = self.n as f64;
        let taper: Vec<f64> = (0..self.n)
            .map(|i| ((i as f64-n/2.)*PI/n).cos().max(0.).sqrt())
            .collect();

        Array2::from_shape_fn((self.n, self.n), |(i, j)| taper[i]*taper[j])
    }

    pub fn apodize(&self, arr: ArrayView2<f64>) -> Array2<f64> {
        let mut out = arr.to_owned();
        let window = self.window();

        par_azip!((v in &mut out, &w in &window) { *v *= w; });
        out
    }

    pub fn apodize_complex(&self, arr: ArrayView2<Complex<f64>>) -> Array2<Complex<f64>> {
        let mut out = arr.to_owned();
        let window = self.window();

        par_azip!((v in &mut out, &w in &window) { *v *= w; });
        out
    }

    // Roll so that pixel (cx, cy) ends up at (n/2, n/2). Shifts truncate
    // toward zero for odd n.
    pub fn shift_to_centre<F: Clone>(&self, arr: ArrayView2<F>, centroid: (usize, usize)) -> Array2<F> {
        let (cx, cy) = centroid;
        let s0 = (self.centre()-cy as f64) as isize;
        let s1 = (self.centre()-cx as f64) as isize;

        roll(arr, (s0, s1))
    }

    // Swap quadrants after an inverse transform
    pub fn recentre<F: Clone>(&self, arr: ArrayView2<F>) -> Array2<F> {
        let s = self.centre() as isize;

        roll(arr, (s, s))
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Grid {
        Grid::new(n, 3.45e-6, 3.45e-6, 405e-9)
    }

    #[test]
    fn apodized_edges_vanish() {
        let g = grid(16);
        let a = g.apodize(Array2::from_elem((16, 16), 3.).view());

        assert!(a[[0, 0]].abs() < 1e-7);
        assert!(a[[0, 15]].abs() < 1e-7);
        assert!(a[[15, 0]].abs() < 1e-7);
        assert!(a.row(0).iter().all(|v| v.abs() < 1e-7));
        assert!(a.column(0).iter().all(|v| v.abs() < 1e-7));
        assert!((a[[15, 15]]-3.*(PI/16.).sin()).abs() < 1e-12);
        assert_eq!(a[[8, 8]], 3.);
    }

    #[test]
    fn window_is_real_and_finite() {
        let w = grid(33).window();
        assert!(w.iter().all(|v| v.is_finite() && *v >= 0. && *v <= 1.));
    }

    #[test]
    fn centroid_moves_to_centre() {
        let g = grid(8);
        let mut a = Array2::<f64>::zeros((8, 8));
        a[[2, 6]] = 1.;

        let b = g.shift_to_centre(a.view(), (6, 2));

        assert_eq!(b[[4, 4]], 1.);
        assert_eq!(b.sum(), 1.);
    }

    #[test]
    fn margin_floors() {
        assert_eq!(grid(256).edge_margin(0.1), 25);
        assert_eq!(grid(16).edge_margin(0.), 0);
    }
}
