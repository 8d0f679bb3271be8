use ndarray::prelude::*;



// Binary disk isolating the real-image sideband. Points exactly on the
// circle are excluded.
pub fn real_image_mask(n: usize, centroid: (usize, usize), radius: f64) -> Array2<f64> {
    let (cx, cy) = (centroid.0 as f64, centroid.1 as f64);
    let r2 = radius*radius;

    Array2::from_shape_fn((n, n), |(i, j)| {
        let (x, y) = (j as f64-cx, i as f64-cy);
        if x*x+y*y < r2 { 1. } else { 0. }
    })
}

// Default radius policy: a fixed width that shrinks with binning
pub fn mask_radius(base: f64, rebin_factor: usize) -> f64 {
    base/rebin_factor as f64
}
