use super::wrap;
use std::collections::BinaryHeap;
use std::f64::consts::TAU;
use ndarray::prelude::*;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;



// Border pixels have no second differences. They are ranked below every
// interior pixel, in an order drawn from the seeded generator.
const BORDER_PENALTY: f64 = 1e7;



#[derive(PartialEq)]
struct Pixel {
    ij: (usize, usize),
    q: f64
}

impl Pixel {
    fn new(ij: (usize, usize), q: f64) -> Self {
        Self { ij, q }
    }
}

impl PartialOrd for Pixel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pixel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.q.total_cmp(&other.q)
    }
}

impl Eq for Pixel {}



#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum PixelFlag {
    #[default]
    Untouched,
    Adjacent,
    Processed
}



// Reliability of every pixel, higher is better. Interior pixels score the
// negated sum of squared wrapped second differences in the horizontal,
// vertical and both diagonal directions (Herraez et al. 2002).
fn reliability(wphase: ArrayView2<f64>, seed: u64) -> Array2<f64> {
    let (h, w) = wphase.dim();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut quality = Array2::<f64>::zeros((h, w));

    for ((i, j), q) in quality.indexed_iter_mut() {
        if i == 0 || j == 0 || i == h-1 || j == w-1 {
            *q = -BORDER_PENALTY-rng.gen::<f64>();
            continue;
        }

        let p = wphase[[i, j]];
        let second = |a: f64, b: f64| wrap(a-p)-wrap(p-b);

        let hd = second(wphase[[i, j-1]], wphase[[i, j+1]]);
        let vd = second(wphase[[i-1, j]], wphase[[i+1, j]]);
        let d1 = second(wphase[[i-1, j-1]], wphase[[i+1, j+1]]);
        let d2 = second(wphase[[i-1, j+1]], wphase[[i+1, j-1]]);

        *q = -(hd*hd+vd*vd+d1*d1+d2*d2);
    }

    quality
}

// Unwrap starting from the most reliable pixel, always growing into the most
// reliable pixel adjacent to the unwrapped region
pub fn unwrap(wphase: ArrayView2<f64>, seed: u64, mut uphase: ArrayViewMut2<f64>) {
    let (h, w) = wphase.dim();
    let quality = reliability(wphase, seed);
    let Some((start_ij, &start_q)) = quality.indexed_iter()
        .max_by(|(_, q0), (_, q1)| q0.total_cmp(q1)) else { return; };

    let adjacency_offsets = [(-1, 0), (1, 0), (0, -1), (0, 1)];
    let mut flags = Array2::<PixelFlag>::default((h, w));
    let mut adjacent = BinaryHeap::<Pixel>::from([Pixel::new(start_ij, start_q)]);

    flags[start_ij] = PixelFlag::Adjacent;

    while let Some(best) = adjacent.pop() {
        let mut ref_ij = None;

        for (di, dj) in &adjacency_offsets {
            let (i, j) = (best.ij.0 as isize+di, best.ij.1 as isize+dj);

            if i >= 0 && i < h as isize && j >= 0 && j < w as isize {
                let ij = (i as usize, j as usize);

                match flags[ij] {
                    PixelFlag::Adjacent => {},
                    PixelFlag::Processed => if ref_ij.is_none() { ref_ij = Some(ij) },
                    PixelFlag::Untouched => {
                        adjacent.push(Pixel::new(ij, quality[ij]));

                        flags[ij] = PixelFlag::Adjacent;
                    }
                }
            }
        }

        let reference = ref_ij.map_or(wphase[best.ij], |ij| uphase[ij]);

        uphase[best.ij] = wphase[best.ij]+TAU*((reference-wphase[best.ij])/TAU).round();
        flags[best.ij] = PixelFlag::Processed;
    }
}
