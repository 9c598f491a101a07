//! 1D smoothers for chromatographic traces.
//!
//! All three smoothers share the same contract: the output has the same
//! length as the input, edges are handled by renormalizing (or clamping)
//! the kernel, and the window is forced to an odd width of at least 3.

/// Forces `window` to an odd width in `[3, len]`.
pub(crate) fn effective_window(window: usize, len: usize) -> usize {
    let mut w = window.max(3);
    if w % 2 == 0 {
        w += 1;
    }
    if w > len {
        w = if len % 2 == 0 { len.saturating_sub(1) } else { len };
    }
    w.max(1)
}

/// Plain boxcar average, renormalized at the edges.
pub fn moving_average(values: &[f32], window: usize) -> Vec<f32> {
    let n = values.len();
    if n < 3 {
        return values.to_vec();
    }
    let w = effective_window(window, n);
    let radius = (w / 2) as isize;

    let mut out = vec![0.0f32; n];
    for (i, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        let mut count = 0usize;
        for di in -radius..=radius {
            let j = i as isize + di;
            if j >= 0 && (j as usize) < n {
                acc += values[j as usize];
                count += 1;
            }
        }
        *slot = acc / count as f32;
    }
    out
}

/// Gaussian kernel smoothing with `sigma = window / 4`, renormalized at
/// the edges so the trace is not pulled towards zero near the bounds.
pub fn gaussian_smooth(values: &[f32], window: usize) -> Vec<f32> {
    let n = values.len();
    if n < 3 {
        return values.to_vec();
    }
    let w = effective_window(window, n);
    let radius = (w / 2) as isize;
    let sigma = (w as f32 / 4.0).max(0.5);
    let two_sigma2 = 2.0 * sigma * sigma;

    let weights: Vec<f32> = (-radius..=radius)
        .map(|dx| {
            let x = dx as f32;
            (-x * x / two_sigma2).exp()
        })
        .collect();

    let mut out = vec![0.0f32; n];
    for (i, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        let mut norm = 0.0f32;
        for (k, &wk) in weights.iter().enumerate() {
            let j = i as isize + (k as isize - radius);
            if j >= 0 && (j as usize) < n {
                acc += wk * values[j as usize];
                norm += wk;
            }
        }
        *slot = if norm > 0.0 { acc / norm } else { 0.0 };
    }
    out
}

/// Savitzky-Golay smoothing with a quadratic fit.
///
/// Closed-form convolution weights for half-width `m`:
/// `c_i = 3 ((3m^2 + 3m - 1) - 5 i^2) / ((2m - 1)(2m + 1)(2m + 3))`.
/// Edges replicate the boundary samples so the kernel always has full
/// support (SG weights are negative at the wings, renormalizing over a
/// truncated kernel is not well defined).
pub fn savitzky_golay(values: &[f32], window: usize) -> Vec<f32> {
    let n = values.len();
    if n < 5 {
        return moving_average(values, window);
    }
    let w = effective_window(window, n).max(5);
    let m = (w / 2) as isize;

    let norm = ((2 * m - 1) * (2 * m + 1) * (2 * m + 3)) as f64;
    let base = (3 * m * m + 3 * m - 1) as f64;
    let weights: Vec<f64> = (-m..=m)
        .map(|i| 3.0 * (base - 5.0 * (i * i) as f64) / norm)
        .collect();

    let mut out = vec![0.0f32; n];
    for (i, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0f64;
        for (k, &wk) in weights.iter().enumerate() {
            let j = (i as isize + (k as isize - m)).clamp(0, n as isize - 1);
            acc += wk * values[j as usize] as f64;
        }
        *slot = (acc as f32).max(0.0);
    }
    out
}
