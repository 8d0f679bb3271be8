use crate::error::{HoloError, Result};
use ndarray::prelude::*;
use ndrustfft::{Complex, FftHandler, ndfft, ndifft};



// 2D forward FFT, rows then columns. No normalisation.
pub fn fft2(arr: ArrayView2<Complex<f64>>) -> Array2<Complex<f64>> {
    let (h, w) = arr.dim();
    let mut handler_x = FftHandler::<f64>::new(w);
    let mut handler_y = FftHandler::<f64>::new(h);
    let mut temp = Array2::<Complex<f64>>::zeros((h, w));
    let mut out = Array2::<Complex<f64>>::zeros((h, w));

    ndfft(&arr, &mut temp, &mut handler_x, 1);
    ndfft(&temp, &mut out, &mut handler_y, 0);

    out
}

// 2D inverse FFT, normalised by 1/(h*w) like the forward/inverse pair of
// numpy and scipy
pub fn ifft2(arr: ArrayView2<Complex<f64>>) -> Array2<Complex<f64>> {
    let (h, w) = arr.dim();
    let mut handler_x = FftHandler::<f64>::new(w);
    let mut handler_y = FftHandler::<f64>::new(h);
    let mut temp = Array2::<Complex<f64>>::zeros((h, w));
    let mut out = Array2::<Complex<f64>>::zeros((h, w));

    ndifft(&arr, &mut temp, &mut handler_x, 1);
    ndifft(&temp, &mut out, &mut handler_y, 0);

    out
}

// Circularly shift a 2D array so that element (i, j) lands on
// ((i+s0) mod h, (j+s1) mod w). Negative shifts go the other way.
pub fn roll<F: Clone>(arr: ArrayView2<F>, shifts: (isize, isize)) -> Array2<F> {
    let mut temp = arr.to_owned();
    let mut out = arr.to_owned();

    roll_axis(arr.view(), Axis(0), shifts.0, temp.view_mut());
    roll_axis(temp.view(), Axis(1), shifts.1, out.view_mut());

    out
}

fn roll_axis<F: Clone>(arr: ArrayView2<F>, axis: Axis, shift: isize, mut out: ArrayViewMut2<F>) {
    let l = arr.len_of(axis);

    if l == 0 { return; }

    let s = shift.rem_euclid(l as isize) as usize;

    out.slice_axis_mut(axis, (s..).into()).assign(&arr.slice_axis(axis, (..l-s).into()));
    out.slice_axis_mut(axis, (..s).into()).assign(&arr.slice_axis(axis, (l-s..).into()));
}

// Down-sample by averaging each `factor`x`factor` block
pub fn rebin(arr: ArrayView2<f64>, factor: usize) -> Result<Array2<f64>> {
    let (h, w) = arr.dim();

    if factor == 0 {
        return Err(HoloError::config("rebin factor must be positive"));
    }

    if factor == 1 {
        return Ok(arr.to_owned());
    }

    if h%factor != 0 || w%factor != 0 {
        return Err(HoloError::config(format!(
            "array of shape ({h}, {w}) cannot be binned by a factor of {factor}"
        )));
    }

    let area = (factor*factor) as f64;

    Ok(Array2::from_shape_fn((h/factor, w/factor), |(i, j)| {
        arr.slice(s![i*factor..(i+1)*factor, j*factor..(j+1)*factor]).sum()/area
    }))
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_matches_numpy() {
        let a = Array2::from_shape_fn((3, 4), |(i, j)| (i*4+j) as i32);
        let r = roll(a.view(), (1, -1));

        assert_eq!(r, array![[9, 10, 11, 8], [1, 2, 3, 0], [5, 6, 7, 4]]);
    }

    #[test]
    fn fft_pair_is_identity() {
        let a = Array2::from_shape_fn((8, 8), |(i, j)| Complex::new(i as f64, (j as f64).sin()));
        let b = ifft2(fft2(a.view()).view());

        azip!((&x in &a, &y in &b) assert!((x-y).norm() < 1e-12));
    }

    #[test]
    fn forward_fft_dc_is_sum() {
        let a = Array2::from_elem((4, 4), Complex::new(2., 0.));
        let f = fft2(a.view());

        assert!((f[[0, 0]].re-32.).abs() < 1e-12);
        assert!(f[[1, 2]].norm() < 1e-12);
    }

    #[test]
    fn rebin_averages_blocks() {
        let a = Array2::from_shape_fn((4, 4), |(i, j)| (i*4+j) as f64);
        let b = rebin(a.view(), 2).unwrap();

        assert_eq!(b, array![[2.5, 4.5], [10.5, 12.5]]);
        assert_eq!(rebin(a.view(), 1).unwrap(), a);
        assert!(rebin(a.view(), 3).unwrap_err().is_configuration());
    }
}
