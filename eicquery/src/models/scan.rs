use serde::{
    Deserialize,
    Serialize,
};

/// Per-scan reduction applied over an m/z window when building an EIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EicKind {
    /// Highest single intensity in the window.
    Max,
    /// Summed intensity; the reported m/z is the intensity-weighted mean.
    #[default]
    Sum,
}

/// A single mass spectrum at one retention time.
///
/// `mz` is sorted ascending and parallel to `intensity`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scan {
    /// Retention time in minutes.
    pub rt: f32,
    pub ms_level: u8,
    /// Isolation target for MS2 scans; 0 when not applicable.
    #[serde(default)]
    pub precursor_mz: f64,
    #[serde(default)]
    pub collision_energy: f64,
    #[serde(default)]
    pub filterline: String,
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
}

impl Scan {
    pub fn ms1(rt: f32, mz: Vec<f64>, intensity: Vec<f32>) -> Self {
        debug_assert_eq!(mz.len(), intensity.len());
        Scan {
            rt,
            ms_level: 1,
            mz,
            intensity,
            ..Scan::default()
        }
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    fn window_bounds(&self, mz_lo: f64, mz_hi: f64) -> (usize, usize) {
        let start = self.mz.partition_point(|&x| x < mz_lo);
        let end = self.mz.partition_point(|&x| x <= mz_hi);
        (start, end)
    }

    /// Representative (m/z, intensity) of the window under the given
    /// reduction, or `None` when no point falls inside.
    pub fn reduce_window(&self, mz_lo: f64, mz_hi: f64, kind: EicKind) -> Option<(f64, f32)> {
        let (start, end) = self.window_bounds(mz_lo, mz_hi);
        if start >= end {
            return None;
        }
        match kind {
            EicKind::Max => {
                let mut best = start;
                for i in start + 1..end {
                    if self.intensity[i] > self.intensity[best] {
                        best = i;
                    }
                }
                Some((self.mz[best], self.intensity[best]))
            }
            EicKind::Sum => {
                let mut total = 0.0f64;
                let mut weighted_mz = 0.0f64;
                for i in start..end {
                    let x = self.intensity[i] as f64;
                    total += x;
                    weighted_mz += self.mz[i] * x;
                }
                let mz = if total > 0.0 {
                    weighted_mz / total
                } else {
                    (mz_lo + mz_hi) / 2.0
                };
                Some((mz, total as f32))
            }
        }
    }

    pub fn max_intensity_in(&self, mz_lo: f64, mz_hi: f64) -> f32 {
        self.reduce_window(mz_lo, mz_hi, EicKind::Max)
            .map(|(_, x)| x)
            .unwrap_or(0.0)
    }
}
