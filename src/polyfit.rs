use crate::error::{HoloError, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::prelude::*;



// Smallest-to-largest singular value ratio below which the fit is refused
const RANK_TOLERANCE: f64 = 1e-12;



/// Least-squares polynomial in a scaled coordinate t = x/scale, so that the
/// Vandermonde matrix stays well conditioned for wide pixel ranges
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial {
    /// Coefficients of t^0, t^1, ... t^order
    coeffs: Vec<f64>,
    scale: f64
}

impl Polynomial {
    pub fn fit(x: ArrayView1<f64>, y: ArrayView1<f64>, order: usize) -> Result<Self> {
        if x.len() != y.len() {
            return Err(HoloError::config(format!("cannot fit {} abscissae to {} values", x.len(), y.len())));
        }

        if order >= x.len() {
            return Err(HoloError::config(format!(
                "polynomial order {order} needs more than {} samples", x.len()
            )));
        }

        let scale = x.iter().fold(0f64, |m, v| m.max(v.abs()));
        let scale = if scale > 0. { scale } else { 1. };
        let m = order+1;

        let vander = DMatrix::from_fn(x.len(), m, |i, p| (x[i]/scale).powi(p as i32));
        let rhs = DVector::from_iterator(y.len(), y.iter().copied());
        let svd = vander.svd(true, true);

        let s = &svd.singular_values;
        let ratio = s.min()/s.max();

        if !(ratio > RANK_TOLERANCE) {
            return Err(HoloError::IllConditionedFit { ratio });
        }

        let coeffs = svd.solve(&rhs, 0.).map_err(|_| HoloError::IllConditionedFit { ratio })?;

        Ok(Self { coeffs: coeffs.iter().copied().collect(), scale })
    }

    pub fn order(&self) -> usize {
        self.coeffs.len()-1
    }

    pub fn eval(&self, x: f64) -> f64 {
        let t = x/self.scale;
        self.coeffs.iter().rev().fold(0., |acc, &c| acc*t+c)
    }

    pub fn eval_all(&self, x: ArrayView1<f64>) -> Array1<f64> {
        x.mapv(|v| self.eval(v))
    }

    // Root-mean-square residual of the fit against (x, y)
    pub fn rms_residual(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        let n = x.len().max(1) as f64;
        let sum: f64 = x.iter().zip(y).map(|(&xi, &yi)| (yi-self.eval(xi)).powi(2)).sum();

        (sum/n).sqrt()
    }

    // Sum of two polynomials sharing the same scale
    pub fn add(&self, other: &Self) -> Self {
        let scale = self.scale;
        let len = self.coeffs.len().max(other.coeffs.len());
        let ratio = scale/other.scale;

        let coeffs = (0..len).map(|p| {
            let a = self.coeffs.get(p).copied().unwrap_or(0.);
            let b = other.coeffs.get(p).copied().unwrap_or(0.)*ratio.powi(p as i32);
            a+b
        }).collect();

        Self { coeffs, scale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_cubic() {
        let x = Array1::linspace(-128., 127., 256);
        let y = x.mapv(|v| 2.-0.5*v+1e-3*v*v-2e-6*v*v*v);
        let p = Polynomial::fit(x.view(), y.view(), 3).unwrap();

        assert_eq!(p.order(), 3);
        assert!(p.rms_residual(x.view(), y.view()) < 1e-9);
        assert!((p.eval(300.)-(2.-150.+90.-54.)).abs() < 1e-6);
    }

    #[test]
    fn line_through_two_points() {
        let p = Polynomial::fit(array![0., 2.].view(), array![1., 5.].view(), 1).unwrap();
        assert!((p.eval(1.)-3.).abs() < 1e-12);
    }

    #[test]
    fn repeated_abscissae_are_singular() {
        let x = Array1::from_elem(10, 3.);
        let y = Array1::linspace(0., 1., 10);
        let err = Polynomial::fit(x.view(), y.view(), 2).unwrap_err();

        assert!(err.is_numerical());
        assert!(matches!(err, HoloError::IllConditionedFit { ratio } if ratio < RANK_TOLERANCE));
    }

    #[test]
    fn least_squares_through_noisy_line() {
        // Alternating offsets cancel, so the fitted line is the underlying one
        let x = Array1::linspace(0., 99., 100);
        let y = Array1::from_shape_fn(100, |i| 0.5*i as f64-1.+if i%2 == 0 { 0.25 } else { -0.25 });
        let p = Polynomial::fit(x.view(), y.view(), 1).unwrap();

        assert!((p.eval(0.)+1.).abs() < 0.02);
        assert!((p.rms_residual(x.view(), y.view())-0.25).abs() < 1e-3);
    }

    #[test]
    fn too_few_samples() {
        let x = array![0., 1., 2.];
        assert!(Polynomial::fit(x.view(), x.view(), 3).unwrap_err().is_configuration());
    }

    #[test]
    fn sum_evaluates_as_sum() {
        let x = Array1::linspace(-10., 10., 21);
        let p = Polynomial::fit(x.view(), x.mapv(|v| v*v).view(), 2).unwrap();
        let q = Polynomial::fit(x.view(), x.mapv(|v| 3.*v).view(), 1).unwrap();
        let r = p.add(&q);

        assert!((r.eval(4.)-(16.+12.)).abs() < 1e-9);
    }
}
