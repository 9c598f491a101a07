use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;

use eicquery::{
    Adduct,
    BaselineMode,
    EicKind,
    MassCutoff,
    QuantType,
    Smoother,
};

use crate::errors::Result;

/// Configuration bundle for one detection run.
///
/// Treated as an immutable snapshot while a run is in flight; the
/// detector clones it per slice before handing it to the group builder
/// so downstream stages are decoupled from mid-run mutation. The
/// cooperative cancel flag is not part of this struct — it lives on the
/// detector as an `Arc<AtomicBool>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    // EIC extraction
    pub eic_kind: EicKind,
    pub filterline: String,
    pub eic_smoothing_algorithm: Smoother,
    pub eic_smoothing_window: usize,
    pub asls_baseline_mode: bool,
    pub asls_smoothness: f64,
    pub asls_asymmetry: f64,
    pub baseline_smoothing_window: usize,
    pub baseline_drop_top_x: u8,
    pub min_signal_baseline_difference: f32,
    pub amu_q1: f64,
    pub amu_q3: f64,

    // m/z matching
    pub mass_cutoff_merge: MassCutoff,
    pub compound_mass_cutoff_window: MassCutoff,

    // Slice generation
    pub pull_isotopes: bool,
    pub search_adducts: bool,
    pub max_isotopes: usize,
    pub adducts: Vec<Adduct>,
    pub match_compound_rt: bool,
    /// Half-window in minutes around the expected RT for compound slices.
    pub compound_rt_window: f32,
    /// RT margin in minutes added around untargeted feature slices.
    pub feature_rt_margin: f32,

    // Per-peak thresholds
    pub min_peak_intensity: f32,
    pub min_peak_signal_baseline_ratio: f32,
    pub min_peak_quality: f32,
    pub min_peak_width: usize,

    // Group thresholds
    pub min_good_peak_count: usize,
    pub min_group_quality: f32,
    pub min_group_intensity: f32,
    pub max_group_intensity: f32,
    pub min_signal_blank_ratio: f32,

    // Parent/child filtering
    pub filter_isotopes_against_parent: bool,
    pub filter_adducts_against_parent: bool,
    pub max_isotope_scan_diff: f32,
    pub min_isotopic_correlation: f32,
    pub adduct_search_window: f32,
    /// Percentage, 0-100.
    pub adduct_percent_correlation: f32,

    // Identification
    pub identification_match_rt: bool,
    /// Minutes.
    pub identification_rt_window: f32,
    pub match_fragmentation: bool,
    pub min_frag_match_score: f32,

    // Detection limits
    pub limit_group_count: usize,
    pub eic_max_groups: usize,
    pub peak_quantitation: QuantType,

    /// Mean scan spacing in minutes, computed from the samples at the
    /// start of a run; not meant to be configured.
    pub avg_scan_time: f32,
}

impl Default for EngineParams {
    fn default() -> Self {
        EngineParams {
            eic_kind: EicKind::Sum,
            filterline: String::new(),
            eic_smoothing_algorithm: Smoother::Gaussian,
            eic_smoothing_window: 7,
            asls_baseline_mode: false,
            asls_smoothness: 1e4,
            asls_asymmetry: 0.05,
            baseline_smoothing_window: 5,
            baseline_drop_top_x: 60,
            min_signal_baseline_difference: 0.0,
            amu_q1: 0.25,
            amu_q3: 0.3,
            mass_cutoff_merge: MassCutoff::Ppm(30.0),
            compound_mass_cutoff_window: MassCutoff::Ppm(10.0),
            pull_isotopes: false,
            search_adducts: false,
            max_isotopes: 4,
            adducts: Vec::new(),
            match_compound_rt: false,
            compound_rt_window: 2.0,
            feature_rt_margin: 0.5,
            min_peak_intensity: 0.0,
            min_peak_signal_baseline_ratio: 0.0,
            min_peak_quality: 0.0,
            min_peak_width: 1,
            min_good_peak_count: 1,
            min_group_quality: 0.0,
            min_group_intensity: 0.0,
            max_group_intensity: f32::MAX,
            min_signal_blank_ratio: 0.0,
            filter_isotopes_against_parent: false,
            filter_adducts_against_parent: false,
            max_isotope_scan_diff: 10.0,
            min_isotopic_correlation: 0.2,
            adduct_search_window: 10.0,
            adduct_percent_correlation: 90.0,
            identification_match_rt: false,
            identification_rt_window: 2.0,
            match_fragmentation: false,
            min_frag_match_score: 0.5,
            limit_group_count: 5000,
            eic_max_groups: 5,
            peak_quantitation: QuantType::Height,
            avg_scan_time: 0.0,
        }
    }
}

impl EngineParams {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| crate::errors::PeakSeekError::Io {
            source: e,
            path: Some(path.to_path_buf()),
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Baseline settings as consumed by the EIC pipeline.
    pub fn baseline_mode(&self) -> BaselineMode {
        if self.asls_baseline_mode {
            BaselineMode::AslsSmoothing {
                smoothness: self.asls_smoothness,
                asymmetry: self.asls_asymmetry,
            }
        } else {
            BaselineMode::Threshold {
                smoothing_window: self.baseline_smoothing_window,
                drop_top_x: self.baseline_drop_top_x,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let params = EngineParams::default();
        let json = serde_json::to_string(&params).unwrap();
        let back: EngineParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.eic_smoothing_window, params.eic_smoothing_window);
        assert_eq!(back.mass_cutoff_merge, params.mass_cutoff_merge);
        assert_eq!(back.limit_group_count, params.limit_group_count);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let back: EngineParams =
            serde_json::from_str("{\"min_group_intensity\": 250.0}").unwrap();
        assert_eq!(back.min_group_intensity, 250.0);
        assert_eq!(back.eic_max_groups, EngineParams::default().eic_max_groups);
    }

    #[test]
    fn test_baseline_mode_selection() {
        let mut params = EngineParams::default();
        assert!(matches!(
            params.baseline_mode(),
            BaselineMode::Threshold { .. }
        ));
        params.asls_baseline_mode = true;
        assert!(matches!(
            params.baseline_mode(),
            BaselineMode::AslsSmoothing { .. }
        ));
    }
}
