use ndarray::prelude::*;
use ndarray::Zip;



// Normalised Gaussian weights, truncated at 4 standard deviations
fn gaussian_weights(sigma: f64) -> Vec<f64> {
    let radius = (4.*sigma+0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5*(x*x) as f64/(sigma*sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    weights.into_iter().map(|w| w/total).collect()
}

// Map an out-of-range index back into [0, l) by mirroring about the array
// edges, repeating the edge sample (d c b a | a b c d | d c b a)
fn reflect(i: isize, l: usize) -> usize {
    let period = 2*l as isize;
    let i = i.rem_euclid(period);

    if i >= l as isize { (period-1-i) as usize } else { i as usize }
}

fn convolve_lane(input: ArrayView1<f64>, weights: &[f64], mut out: ArrayViewMut1<f64>) {
    let l = input.len();
    let radius = (weights.len()/2) as isize;

    for (i, o) in out.iter_mut().enumerate() {
        *o = weights.iter().enumerate()
            .map(|(k, &w)| w*input[reflect(i as isize+k as isize-radius, l)])
            .sum();
    }
}

pub fn gaussian_filter1d(arr: ArrayView1<f64>, sigma: f64) -> Array1<f64> {
    let mut out = Array1::<f64>::zeros(arr.len());

    if sigma <= 0. || arr.is_empty() {
        out.assign(&arr);
        return out;
    }

    convolve_lane(arr, &gaussian_weights(sigma), out.view_mut());
    out
}

// Isotropic 2D Gaussian blur, done as two separable passes
pub fn gaussian_filter(arr: ArrayView2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0. || arr.is_empty() {
        return arr.to_owned();
    }

    let weights = gaussian_weights(sigma);
    let mut temp = Array2::<f64>::zeros(arr.dim());
    let mut out = Array2::<f64>::zeros(arr.dim());

    Zip::from(arr.lanes(Axis(0))).and(temp.lanes_mut(Axis(0)))
        .par_for_each(|input, output| convolve_lane(input, &weights, output));

    Zip::from(temp.lanes(Axis(1))).and(out.lanes_mut(Axis(1)))
        .par_for_each(|input, output| convolve_lane(input, &weights, output));

    out
}
