//! The extracted-ion chromatogram and its per-trace processing.
//!
//! Processing is ordered: smoother and baseline settings first, then
//! `compute_baseline`, then `reduce_to_rt_range`, then
//! `detect_peak_positions`. The baseline is computed over the full trace
//! on purpose — trimming first would bias the estimate near the slice
//! bounds.

use serde::{
    Deserialize,
    Serialize,
};

use crate::models::peak::Peak;
use crate::utils::baseline::{
    asls_baseline,
    threshold_baseline,
};
use crate::utils::smoothing::{
    gaussian_smooth,
    moving_average,
    savitzky_golay,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Smoother {
    MovingAverage,
    #[default]
    Gaussian,
    SavitzkyGolay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BaselineMode {
    AslsSmoothing { smoothness: f64, asymmetry: f64 },
    Threshold { smoothing_window: usize, drop_top_x: u8 },
}

impl Default for BaselineMode {
    fn default() -> Self {
        BaselineMode::Threshold {
            smoothing_window: 5,
            drop_top_x: 60,
        }
    }
}

/// Chromatogram for one (sample, slice) pair.
///
/// Parallel arrays of equal length; `rt` is nondecreasing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Eic {
    pub sample_name: String,

    pub rt: Vec<f32>,
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
    pub baseline: Vec<f32>,
    /// Smoothed copy of `intensity`, filled by peak detection.
    pub spline: Vec<f32>,

    pub peaks: Vec<Peak>,

    smoother: Smoother,
    baseline_mode: BaselineMode,
    filter_signal_baseline_diff: f32,

    /// Highest raw intensity over the whole trace.
    pub max_intensity: f32,
    /// Per-metric maxima over the detected peaks.
    pub max_area_intensity: f32,
    pub max_area_top_intensity: f32,
    pub max_area_not_corrected_intensity: f32,
    pub max_area_top_not_corrected_intensity: f32,
}

impl Eic {
    pub fn new(sample_name: impl Into<String>) -> Self {
        Eic {
            sample_name: sample_name.into(),
            ..Eic::default()
        }
    }

    /// Builds an EIC from pre-extracted parallel arrays, validating the
    /// container invariants.
    pub fn from_arrays(
        sample_name: impl Into<String>,
        rt: Vec<f32>,
        mz: Vec<f64>,
        intensity: Vec<f32>,
    ) -> Result<Self, crate::errors::EicQueryError> {
        if rt.len() != intensity.len() || rt.len() != mz.len() {
            return Err(crate::errors::EicQueryError::ExpectedSlicesSameLength {
                expected: rt.len(),
                other: intensity.len().max(mz.len()),
                context: "Eic::from_arrays".to_string(),
            });
        }
        if rt.windows(2).any(|w| w[1] < w[0]) {
            return Err(crate::errors::EicQueryError::ExpectedSortedData {
                context: "Eic::from_arrays rt".to_string(),
            });
        }
        Ok(Eic {
            sample_name: sample_name.into(),
            rt,
            mz,
            intensity,
            ..Eic::default()
        })
    }

    pub fn push_point(&mut self, rt: f32, mz: f64, intensity: f32) {
        debug_assert!(
            self.rt.last().map_or(true, |&last| rt >= last),
            "rt must be nondecreasing"
        );
        self.rt.push(rt);
        self.mz.push(mz);
        self.intensity.push(intensity);
    }

    pub fn len(&self) -> usize {
        self.rt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rt.is_empty()
    }

    pub fn set_smoother(&mut self, smoother: Smoother) {
        self.smoother = smoother;
    }

    pub fn set_baseline_mode(&mut self, mode: BaselineMode) {
        self.baseline_mode = mode;
    }

    pub fn set_filter_signal_baseline_diff(&mut self, diff: f32) {
        self.filter_signal_baseline_diff = diff;
    }

    pub fn compute_baseline(&mut self) {
        self.baseline = match &self.baseline_mode {
            BaselineMode::AslsSmoothing {
                smoothness,
                asymmetry,
            } => asls_baseline(&self.intensity, *smoothness, *asymmetry),
            BaselineMode::Threshold {
                smoothing_window,
                drop_top_x,
            } => threshold_baseline(&self.intensity, *smoothing_window, *drop_top_x),
        };
    }

    /// Trims the trace to `[rt_min, rt_max]`. A nonpositive span is
    /// treated as unrestricted.
    pub fn reduce_to_rt_range(&mut self, rt_min: f32, rt_max: f32) {
        if rt_max <= rt_min {
            return;
        }
        let start = self.rt.partition_point(|&x| x < rt_min);
        let end = self.rt.partition_point(|&x| x <= rt_max);
        let keep = start..end;

        self.rt = self.rt[keep.clone()].to_vec();
        self.mz = self.mz[keep.clone()].to_vec();
        self.intensity = self.intensity[keep.clone()].to_vec();
        if !self.baseline.is_empty() {
            self.baseline = self.baseline[keep].to_vec();
        }
    }

    fn smoothed(&self, window: usize) -> Vec<f32> {
        match self.smoother {
            Smoother::MovingAverage => moving_average(&self.intensity, window),
            Smoother::Gaussian => gaussian_smooth(&self.intensity, window),
            Smoother::SavitzkyGolay => savitzky_golay(&self.intensity, window),
        }
    }

    /// Smooths the trace and materializes peaks at local maxima of the
    /// smoothed signal, expanded to the flanking minima. Peaks whose
    /// apex rises less than the configured signal/baseline difference
    /// above the baseline are dropped.
    pub fn detect_peak_positions(&mut self, smoothing_window: usize) {
        self.peaks.clear();
        let n = self.len();
        self.max_intensity = self.intensity.iter().cloned().fold(0.0, f32::max);
        if n < 3 {
            self.update_peak_maxima();
            return;
        }
        if self.baseline.len() != n {
            // Baseline may be missing when the caller skipped
            // compute_baseline; treat it as zero.
            self.baseline = vec![0.0; n];
        }

        self.spline = self.smoothed(smoothing_window);
        let spline = &self.spline;

        let mut seen_apex = std::collections::BTreeSet::new();
        for i in 1..n - 1 {
            if !(spline[i] > spline[i - 1] && spline[i] >= spline[i + 1]) {
                continue;
            }
            let mut left = i;
            while left > 0 && spline[left - 1] < spline[left] {
                left -= 1;
            }
            let mut right = i;
            while right < n - 1 && spline[right + 1] < spline[right] {
                right += 1;
            }

            // Anchor the apex on the raw trace.
            let mut apex = left;
            for j in left..=right {
                if self.intensity[j] > self.intensity[apex] {
                    apex = j;
                }
            }
            if !seen_apex.insert(apex) {
                continue;
            }

            let peak = self.make_peak(left, apex, right);
            let apex_above_baseline = peak.height - self.baseline[apex];
            if apex_above_baseline < self.filter_signal_baseline_diff {
                continue;
            }
            self.peaks.push(peak);
        }

        self.update_peak_maxima();
    }

    fn make_peak(&self, left: usize, apex: usize, right: usize) -> Peak {
        let corrected =
            |j: usize| (self.intensity[j] - self.baseline[j]).max(0.0);

        let area_not_corrected: f32 = self.intensity[left..=right].iter().sum();
        let area: f32 = (left..=right).map(corrected).sum();

        let top_lo = apex.saturating_sub(1).max(left);
        let top_hi = (apex + 1).min(right);
        let top_count = (top_hi - top_lo + 1) as f32;
        let area_top_not_corrected: f32 =
            self.intensity[top_lo..=top_hi].iter().sum::<f32>() / top_count;
        let area_top: f32 = (top_lo..=top_hi).map(corrected).sum::<f32>() / top_count;

        let width = right - left + 1;
        let above = (left..=right)
            .filter(|&j| self.intensity[j] > self.baseline[j])
            .count();

        Peak {
            pos: apex,
            min_pos: left,
            max_pos: right,
            rt: self.rt[apex],
            rt_min: self.rt[left],
            rt_max: self.rt[right],
            mz: self.mz[apex],
            height: self.intensity[apex],
            area,
            area_top,
            area_not_corrected,
            area_top_not_corrected,
            signal_baseline_ratio: self.intensity[apex] / self.baseline[apex].max(1.0),
            width,
            no_noise_fraction: above as f32 / width as f32,
            quality: self.gauss_fit_quality(left, right),
            sample_name: self.sample_name.clone(),
        }
    }

    /// Shape quality as the R^2 of a concave parabola fit to the log
    /// of the baseline-corrected intensities. A clean Gaussian peak
    /// scores close to 1; spikes and shoulders score low.
    fn gauss_fit_quality(&self, left: usize, right: usize) -> f32 {
        let width = right - left + 1;
        if width < 3 {
            return 0.0;
        }

        let apex_corrected = (left..=right)
            .map(|j| (self.intensity[j] - self.baseline[j]).max(0.0))
            .fold(0.0f32, f32::max);
        if apex_corrected <= 0.0 {
            return 0.0;
        }

        // Only the upper part of the peak is log-parabolic; the tails
        // flatten towards the baseline and would dominate the residual.
        let floor = apex_corrected * 0.05;
        let points: Vec<(f64, f64)> = (left..=right)
            .filter_map(|j| {
                let y = (self.intensity[j] - self.baseline[j]).max(0.0);
                if y < floor {
                    return None;
                }
                Some(((j - left) as f64, (1.0 + y as f64).ln()))
            })
            .collect();
        if points.len() < 3 {
            return 0.0;
        }

        // Normal equations for y = a + b x + c x^2.
        let n = points.len() as f64;
        let (mut sx, mut sx2, mut sx3, mut sx4) = (0.0, 0.0, 0.0, 0.0);
        let (mut sy, mut sxy, mut sx2y) = (0.0, 0.0, 0.0);
        for &(x, y) in &points {
            let x2 = x * x;
            sx += x;
            sx2 += x2;
            sx3 += x2 * x;
            sx4 += x2 * x2;
            sy += y;
            sxy += x * y;
            sx2y += x2 * y;
        }

        let det = n * (sx2 * sx4 - sx3 * sx3) - sx * (sx * sx4 - sx3 * sx2)
            + sx2 * (sx * sx3 - sx2 * sx2);
        if det.abs() < 1e-12 {
            return 0.0;
        }
        let det_a = sy * (sx2 * sx4 - sx3 * sx3) - sx * (sxy * sx4 - sx2y * sx3)
            + sx2 * (sxy * sx3 - sx2y * sx2);
        let det_b = n * (sxy * sx4 - sx2y * sx3) - sy * (sx * sx4 - sx3 * sx2)
            + sx2 * (sx * sx2y - sx2 * sxy);
        let det_c = n * (sx2 * sx2y - sx3 * sxy) - sx * (sx * sx2y - sx2 * sxy)
            + sy * (sx * sx3 - sx2 * sx2);
        let (a, b, c) = (det_a / det, det_b / det, det_c / det);

        if c >= 0.0 {
            // Not concave: the region does not look like a peak at all.
            return 0.0;
        }

        let mean_y = sy / n;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for &(x, y) in &points {
            let fit = a + b * x + c * x * x;
            ss_res += (y - fit) * (y - fit);
            ss_tot += (y - mean_y) * (y - mean_y);
        }
        if ss_tot < 1e-12 {
            return 0.0;
        }
        ((1.0 - ss_res / ss_tot) as f32).clamp(0.0, 1.0)
    }

    /// Drops peaks failing the predicate and refreshes the per-metric
    /// maxima.
    pub fn retain_peaks(&mut self, predicate: impl FnMut(&Peak) -> bool) {
        self.peaks.retain(predicate);
        self.update_peak_maxima();
    }

    fn update_peak_maxima(&mut self) {
        self.max_area_intensity = 0.0;
        self.max_area_top_intensity = 0.0;
        self.max_area_not_corrected_intensity = 0.0;
        self.max_area_top_not_corrected_intensity = 0.0;
        for peak in &self.peaks {
            self.max_area_intensity = self.max_area_intensity.max(peak.area);
            self.max_area_top_intensity = self.max_area_top_intensity.max(peak.area_top);
            self.max_area_not_corrected_intensity = self
                .max_area_not_corrected_intensity
                .max(peak.area_not_corrected);
            self.max_area_top_not_corrected_intensity = self
                .max_area_top_not_corrected_intensity
                .max(peak.area_top_not_corrected);
        }
    }
}
