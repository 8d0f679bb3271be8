use crate::error::{HoloError, Result};
use crate::grid::Grid;
use ndarray::prelude::*;
use ndrustfft::Complex;



// Fourier transform of the free-space impulse response for propagation
// over `distance` metres (Schnars & Juptner 2002, eq. 3.22).
pub fn transfer_function(grid: &Grid, distance: f64) -> Result<Array2<Complex<f64>>> {
    if !distance.is_finite() || distance == 0. {
        return Err(HoloError::config(format!("propagation distance must be finite and non-zero, got {distance}")));
    }

    let n = grid.n as f64;
    let (lambda, k) = (grid.wavelength, grid.wavenumber());
    let (wx, wy) = (n*n*grid.dx*grid.dx, n*n*grid.dy*grid.dy);

    let a: Vec<f64> = (0..grid.n)
        .map(|j| lambda*lambda*(grid.centred(j)+wx/(2.*distance*lambda)).powi(2)/wx)
        .collect();
    let b: Vec<f64> = (0..grid.n)
        .map(|i| lambda*lambda*(grid.centred(i)+wy/(2.*distance*lambda)).powi(2)/wy)
        .collect();

    Ok(Array2::from_shape_fn((grid.n, grid.n), |(i, j)| {
        let root = evanescent_root(1.-a[j]-b[i], distance);
        (Complex::new(0., -k*distance)*root).exp()
    }))
}

// Complex square root of `arg`. For negative arguments the branch is picked
// so that exp(-i k z root) decays, whatever the sign of z.
fn evanescent_root(arg: f64, distance: f64) -> Complex<f64> {
    let root = Complex::new(arg, 0.).sqrt();

    if root.im*distance > 0. { root.conj() } else { root }
}
