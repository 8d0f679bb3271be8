use std::f64::consts::PI;
use ndarray::prelude::*;
use ndarray::{par_azip, Zip};
use ndrustfft::{DctHandler, nddct2, nddct3};
use tracing::debug;



// Largest per-pixel change, in radians, at which the Picard iteration stops
const CONVERGED: f64 = 1e-9;



// Weighted least-squares unwrapping (Ghiglia & Romero 1994). The first solve
// uses the weighted wrapped Laplacian alone, which is exact for uniform
// weights; each further iteration corrects for the weights that differ from
// one. `weights` lie in [0, 1].
pub fn unwrap(
    wrapped: ArrayView2<f64>,
    weights: ArrayView2<f64>,
    iterations: usize,
    mut unwrapped: ArrayViewMut2<f64>
) {
    let mut solver = PoissonSolver::new(wrapped.dim());
    let rhs = divergence(wrapped, weights, |w| w*w, true);

    solver.solve(rhs.clone(), unwrapped.view_mut());

    for i in 0..iterations {
        let correction = divergence(unwrapped.view(), weights, |w| 1.-w*w, false);
        let previous = unwrapped.to_owned();

        solver.solve(&rhs+&correction, unwrapped.view_mut());

        let change = Zip::from(&previous).and(&unwrapped)
            .fold(0f64, |m, &a, &b| m.max((a-b).abs()));

        if change < CONVERGED {
            debug!(iterations = i+1, "weighted unwrap converged");
            break;
        }
    }
}

// Discrete divergence of the (optionally wrapped) forward differences of
// `arr`, each difference scaled by `edge` of the smaller weight at its ends.
// Differences past the last row or column are zero.
fn divergence(
    arr: ArrayView2<f64>,
    weights: ArrayView2<f64>,
    edge: impl Fn(f64) -> f64 + Sync,
    wrapped: bool
) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(arr.dim());

    for axis in [Axis(0), Axis(1)] {
        let len = arr.len_of(axis);
        if len < 2 { continue; }

        let mut diffs = Array2::<f64>::zeros(arr.dim());

        par_azip!((
            d in diffs.slice_axis_mut(axis, (..-1).into()),
            &a0 in arr.slice_axis(axis, (..-1).into()),
            &a1 in arr.slice_axis(axis, (1..).into()),
            &w0 in weights.slice_axis(axis, (..-1).into()),
            &w1 in weights.slice_axis(axis, (1..).into())
        ) {
            let delta = if wrapped { super::wrap(a1-a0) } else { a1-a0 };
            *d = edge(w0.min(w1))*delta;
        });

        out += &diffs;
        let mut tail = out.slice_axis_mut(axis, (1..).into());
        tail -= &diffs.slice_axis(axis, (..-1).into());
    }

    out
}

// Solves the discrete Poisson equation with Neumann boundaries through a 2D
// DCT (algorithm 1 of Ghiglia & Romero 1994). The cosine tables and DCT
// plans are reused across Picard iterations.
struct PoissonSolver {
    handler_x: DctHandler<f64>,
    handler_y: DctHandler<f64>,
    icos: Vec<f64>,
    jcos: Vec<f64>
}

impl PoissonSolver {
    fn new((h, w): (usize, usize)) -> Self {
        Self {
            handler_x: DctHandler::new(w),
            handler_y: DctHandler::new(h),
            icos: (0..h).map(|i| (i as f64*PI/h as f64).cos()).collect(),
            jcos: (0..w).map(|j| (j as f64*PI/w as f64).cos()).collect()
        }
    }

    // `rho` is the right hand side and gets destroyed
    fn solve(&mut self, mut rho: Array2<f64>, mut out: ArrayViewMut2<f64>) {
        nddct2(&rho, &mut out, &mut self.handler_x, 1);
        nddct2(&out, &mut rho, &mut self.handler_y, 0);

        let (icos, jcos) = (&self.icos, &self.jcos);

        par_azip!((index (i, j), out in &mut out, &r in &rho) {
            *out = 0.5*r/(icos[i]+jcos[j]-2.);
        });

        // The mean is undetermined; carry the DC term over unchanged
        out[[0, 0]] = rho[[0, 0]];

        nddct3(&out, &mut rho, &mut self.handler_x, 1);
        nddct3(&rho, &mut out, &mut self.handler_y, 0);
    }
}
