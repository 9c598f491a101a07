use serde::{
    Deserialize,
    Serialize,
};

/// Mass matching tolerance.
///
/// Convention: the cutoff is a half-width, so a window of `w` around an
/// expected m/z of `x` spans `(x - w, x + w)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MassCutoff {
    #[serde(rename = "ppm")]
    Ppm(f64),
    #[serde(rename = "da")]
    Da(f64),
}

impl Default for MassCutoff {
    fn default() -> Self {
        MassCutoff::Ppm(20.0)
    }
}

impl MassCutoff {
    /// Half-width of the window in Da at the given m/z.
    pub fn window(&self, mz: f64) -> f64 {
        match self {
            MassCutoff::Ppm(x) => mz * x / 1e6,
            MassCutoff::Da(x) => *x,
        }
    }

    pub fn mz_range(&self, mz: f64) -> (f64, f64) {
        let w = self.window(mz);
        (mz - w, mz + w)
    }

    pub fn contains(&self, observed: f64, expected: f64) -> bool {
        (observed - expected).abs() <= self.window(expected)
    }
}
