//! Baseline estimation for chromatographic traces.
//!
//! Two modes, matching the two strategies exposed by the engine
//! parameters: a quantile-threshold baseline and asymmetric least
//! squares (AsLS) smoothing.

use super::rolling::rolling_median;
use super::smoothing::moving_average;

/// Quantile-threshold baseline.
///
/// Drops the top `drop_top_x` percent of intensities by clamping them to
/// the cut value, then flattens the result with a rolling median and a
/// boxcar pass. The returned baseline is nonnegative and never longer
/// than the input.
pub fn threshold_baseline(intensity: &[f32], smoothing_window: usize, drop_top_x: u8) -> Vec<f32> {
    let n = intensity.len();
    if n == 0 {
        return Vec::new();
    }

    let drop = drop_top_x.min(100) as usize;
    let mut sorted: Vec<f32> = intensity.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = ((n * (100 - drop)) / 100).min(n - 1);
    let cut = sorted[pos];

    let clamped: Vec<f32> = intensity.iter().map(|&x| x.min(cut).max(0.0)).collect();

    if n < 3 {
        return clamped;
    }

    let mut base = rolling_median(&clamped, smoothing_window.max(3), 0.0);
    // The median pads its edges with zero; fill them from the nearest
    // computed value so the baseline does not dip at the bounds.
    let half = smoothing_window.max(3) / 2;
    if n > 2 * half {
        for i in 0..half.min(n) {
            base[i] = base[half];
            base[n - 1 - i] = base[n - 1 - half];
        }
    }
    moving_average(&base, smoothing_window.max(3))
}

/// Asymmetric least squares baseline (Eilers & Boelens).
///
/// Minimizes `sum w_i (y_i - z_i)^2 + lambda * sum (d2 z)^2` where the
/// weights are `asymmetry` for points above the baseline and
/// `1 - asymmetry` below, re-estimated over a fixed number of passes.
/// The pentadiagonal normal equations are solved directly, no external
/// linear algebra needed.
pub fn asls_baseline(intensity: &[f32], smoothness: f64, asymmetry: f64) -> Vec<f32> {
    let n = intensity.len();
    if n < 5 {
        let floor = intensity.iter().cloned().fold(f32::MAX, f32::min);
        return vec![floor.max(0.0).min(1e12); n];
    }

    let lambda = smoothness.max(1e-3);
    let p = asymmetry.clamp(1e-4, 0.5);
    let y: Vec<f64> = intensity.iter().map(|&x| x as f64).collect();

    // lambda * D2' * D2, assembled from the (1, -2, 1) stencil.
    let mut pd = Pentadiagonal::zeros(n);
    for k in 0..n - 2 {
        let stencil = [(k, 1.0), (k + 1, -2.0), (k + 2, 1.0)];
        for &(i, vi) in &stencil {
            for &(j, vj) in &stencil {
                pd.add(i, j, lambda * vi * vj);
            }
        }
    }

    let mut w = vec![1.0f64; n];
    let mut z = vec![0.0f64; n];
    for _ in 0..10 {
        let mut system = pd.clone();
        let mut rhs = vec![0.0f64; n];
        for i in 0..n {
            system.add(i, i, w[i]);
            rhs[i] = w[i] * y[i];
        }
        z = system.solve(&rhs);
        for i in 0..n {
            w[i] = if y[i] > z[i] { p } else { 1.0 - p };
        }
    }

    z.iter().map(|&v| (v.max(0.0)) as f32).collect()
}

/// Symmetric pentadiagonal system stored as five bands.
#[derive(Debug, Clone)]
struct Pentadiagonal {
    sub2: Vec<f64>,
    sub1: Vec<f64>,
    diag: Vec<f64>,
    sup1: Vec<f64>,
    sup2: Vec<f64>,
}

impl Pentadiagonal {
    fn zeros(n: usize) -> Self {
        Self {
            sub2: vec![0.0; n],
            sub1: vec![0.0; n],
            diag: vec![0.0; n],
            sup1: vec![0.0; n],
            sup2: vec![0.0; n],
        }
    }

    fn add(&mut self, i: usize, j: usize, value: f64) {
        match j as isize - i as isize {
            -2 => self.sub2[i] += value,
            -1 => self.sub1[i] += value,
            0 => self.diag[i] += value,
            1 => self.sup1[i] += value,
            2 => self.sup2[i] += value,
            _ => unreachable!("bandwidth exceeded"),
        }
    }

    /// Gaussian elimination specialized to the five-band layout. The
    /// matrix is positive definite for any positive lambda plus weights,
    /// so no pivoting is needed.
    fn solve(mut self, rhs: &[f64]) -> Vec<f64> {
        let n = rhs.len();
        let mut b = rhs.to_vec();
        for i in 0..n - 1 {
            let pivot = self.diag[i];
            let m1 = self.sub1[i + 1] / pivot;
            self.diag[i + 1] -= m1 * self.sup1[i];
            if i + 2 < n {
                self.sup1[i + 1] -= m1 * self.sup2[i];
            }
            b[i + 1] -= m1 * b[i];
            if i + 2 < n {
                let m2 = self.sub2[i + 2] / pivot;
                self.sub1[i + 2] -= m2 * self.sup1[i];
                self.diag[i + 2] -= m2 * self.sup2[i];
                b[i + 2] -= m2 * b[i];
            }
        }

        let mut z = vec![0.0f64; n];
        z[n - 1] = b[n - 1] / self.diag[n - 1];
        z[n - 2] = (b[n - 2] - self.sup1[n - 2] * z[n - 1]) / self.diag[n - 2];
        for i in (0..n - 2).rev() {
            z[i] = (b[i] - self.sup1[i] * z[i + 1] - self.sup2[i] * z[i + 2]) / self.diag[i];
        }
        z
    }
}
