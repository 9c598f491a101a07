use eicquery::Eic;

use crate::params::EngineParams;

/// Per-peak quality gate applied to freshly detected EICs.
///
/// Isotope and adduct slices run the relaxed ruleset: their peaks are
/// expected to be weaker than the parent, so the intensity and quality
/// floors are halved.
#[derive(Debug, Clone, Copy)]
pub struct PeakFiltering {
    min_intensity: f32,
    min_signal_baseline_ratio: f32,
    min_quality: f32,
    min_width: usize,
}

impl PeakFiltering {
    pub fn new(params: &EngineParams, is_relaxed: bool) -> Self {
        let scale = if is_relaxed { 0.5 } else { 1.0 };
        PeakFiltering {
            min_intensity: params.min_peak_intensity * scale,
            min_signal_baseline_ratio: params.min_peak_signal_baseline_ratio,
            min_quality: params.min_peak_quality * scale,
            min_width: params.min_peak_width,
        }
    }

    pub fn filter(&self, eics: &mut [Eic]) {
        for eic in eics.iter_mut() {
            eic.retain_peaks(|peak| {
                peak.height >= self.min_intensity
                    && peak.signal_baseline_ratio >= self.min_signal_baseline_ratio
                    && peak.quality >= self.min_quality
                    && peak.width >= self.min_width
            });
        }
    }
}
