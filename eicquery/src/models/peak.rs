use serde::{
    Deserialize,
    Serialize,
};

/// Metric used to report the abundance of a peak or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuantType {
    AreaTop,
    Area,
    #[default]
    Height,
    AreaNotCorrected,
    AreaTopNotCorrected,
}

/// A detected region of an EIC.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Peak {
    /// Apex index into the owning EIC.
    pub pos: usize,
    pub min_pos: usize,
    pub max_pos: usize,

    /// Apex retention time in minutes.
    pub rt: f32,
    pub rt_min: f32,
    pub rt_max: f32,

    /// m/z at the apex.
    pub mz: f64,

    /// Raw apex intensity.
    pub height: f32,

    /// Summed intensity over the bounds, baseline-corrected.
    pub area: f32,
    /// Mean of the three points around the apex, baseline-corrected.
    pub area_top: f32,
    pub area_not_corrected: f32,
    pub area_top_not_corrected: f32,

    pub signal_baseline_ratio: f32,

    /// Number of points spanned.
    pub width: usize,

    /// Fraction of spanned points above the local baseline.
    pub no_noise_fraction: f32,

    /// Shape quality in [0, 1]; overwritten when a classifier model is
    /// loaded.
    pub quality: f32,

    pub sample_name: String,
}

impl Peak {
    pub fn quantity(&self, metric: QuantType) -> f32 {
        match metric {
            QuantType::AreaTop => self.area_top,
            QuantType::Area => self.area,
            QuantType::Height => self.height,
            QuantType::AreaNotCorrected => self.area_not_corrected,
            QuantType::AreaTopNotCorrected => self.area_top_not_corrected,
        }
    }

    pub fn overlaps_rt(&self, other: &Peak) -> bool {
        self.rt_min <= other.rt_max && self.rt_max >= other.rt_min
    }
}
