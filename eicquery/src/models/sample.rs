use crate::models::eic::Eic;
use crate::models::scan::{
    EicKind,
    Scan,
};

/// Read-side abstraction over one LC-MS sample.
///
/// The engine only needs ordered scans and the three EIC constructors;
/// those have provided implementations over `scans()`, mirroring the
/// extraction overloads of the upstream sample readers: by SRM id, by
/// MRM transition, and by plain m/z window.
pub trait SampleLike: Send + Sync {
    fn name(&self) -> &str;

    /// Scans ordered by retention time.
    fn scans(&self) -> &[Scan];

    fn is_selected(&self) -> bool {
        true
    }

    /// Blank/control samples only contribute to signal-to-blank
    /// filtering, never to grouping decisions.
    fn is_blank(&self) -> bool {
        false
    }

    fn min_rt(&self) -> f32 {
        self.scans().first().map_or(0.0, |s| s.rt)
    }

    fn max_rt(&self) -> f32 {
        self.scans().last().map_or(0.0, |s| s.rt)
    }

    /// Mean spacing between consecutive scans, in minutes.
    fn avg_scan_time(&self) -> f32 {
        let scans = self.scans();
        if scans.len() < 2 {
            return 0.0;
        }
        (self.max_rt() - self.min_rt()) / (scans.len() - 1) as f32
    }

    /// EIC over scans whose filterline matches the SRM id.
    fn eic_by_srm(&self, srm_id: &str, kind: EicKind) -> Option<Eic> {
        let mut eic = Eic::new(self.name());
        for scan in self.scans() {
            if scan.filterline != srm_id || scan.is_empty() {
                continue;
            }
            let lo = scan.mz[0];
            let hi = scan.mz[scan.mz.len() - 1];
            if let Some((mz, intensity)) = scan.reduce_window(lo, hi, kind) {
                eic.push_point(scan.rt, mz, intensity);
            }
        }
        if eic.is_empty() { None } else { Some(eic) }
    }

    /// EIC over MS2 scans selected by (precursor, collision energy),
    /// sampled at the product m/z with a `amu_q3` half-window. The
    /// precursor match uses the `amu_q1` half-window; a zero collision
    /// energy matches any.
    #[allow(clippy::too_many_arguments)]
    fn eic_by_transition(
        &self,
        precursor_mz: f64,
        collision_energy: f64,
        product_mz: f64,
        kind: EicKind,
        filterline: &str,
        amu_q1: f64,
        amu_q3: f64,
    ) -> Option<Eic> {
        let mut eic = Eic::new(self.name());
        for scan in self.scans() {
            if scan.ms_level < 2 {
                continue;
            }
            if !filterline.is_empty() && scan.filterline != filterline {
                continue;
            }
            if (scan.precursor_mz - precursor_mz).abs() > amu_q1 {
                continue;
            }
            if collision_energy > 0.0
                && scan.collision_energy > 0.0
                && (scan.collision_energy - collision_energy).abs() > 0.5
            {
                continue;
            }
            if let Some((mz, intensity)) =
                scan.reduce_window(product_mz - amu_q3, product_mz + amu_q3, kind)
            {
                eic.push_point(scan.rt, mz, intensity);
            }
        }
        if eic.is_empty() { None } else { Some(eic) }
    }

    /// EIC over an (m/z, RT) window at the given MS level.
    #[allow(clippy::too_many_arguments)]
    fn eic_by_mz_range(
        &self,
        mz_min: f64,
        mz_max: f64,
        rt_min: f32,
        rt_max: f32,
        ms_level: u8,
        kind: EicKind,
        filterline: &str,
    ) -> Option<Eic> {
        let mut eic = Eic::new(self.name());
        for scan in self.scans() {
            if scan.ms_level != ms_level {
                continue;
            }
            if !filterline.is_empty() && scan.filterline != filterline {
                continue;
            }
            if scan.rt < rt_min || scan.rt > rt_max {
                continue;
            }
            if let Some((mz, intensity)) = scan.reduce_window(mz_min, mz_max, kind) {
                eic.push_point(scan.rt, mz, intensity);
            }
        }
        if eic.is_empty() { None } else { Some(eic) }
    }
}

/// Owned in-memory sample.
#[derive(Debug, Clone, Default)]
pub struct MemSample {
    name: String,
    selected: bool,
    blank: bool,
    scans: Vec<Scan>,
}

impl MemSample {
    pub fn new(name: impl Into<String>, mut scans: Vec<Scan>) -> Self {
        scans.sort_by(|a, b| a.rt.partial_cmp(&b.rt).unwrap_or(std::cmp::Ordering::Equal));
        MemSample {
            name: name.into(),
            selected: true,
            blank: false,
            scans,
        }
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_blank(mut self, blank: bool) -> Self {
        self.blank = blank;
        self
    }

    pub fn push_scan(&mut self, scan: Scan) {
        debug_assert!(self.scans.last().map_or(true, |last| scan.rt >= last.rt));
        self.scans.push(scan);
    }
}

impl SampleLike for MemSample {
    fn name(&self) -> &str {
        &self.name
    }

    fn scans(&self) -> &[Scan] {
        &self.scans
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn is_blank(&self) -> bool {
        self.blank
    }
}
