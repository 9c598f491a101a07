use std::sync::Arc;

use serde::{
    Deserialize,
    Serialize,
};

use eicquery::{
    Adduct,
    Compound,
    Isotope,
    MassCutoff,
    Peak,
    QuantType,
    Slice,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationType {
    Automated,
    /// Synthetic parent placeholder with no underlying peaks.
    Ghost,
    Manual,
}

/// Cross-sample aggregate of co-eluting peaks for one slice.
///
/// After meta-grouping a top-level group owns its isotopologue and
/// adduct children by value; the parent-of relation is containment,
/// never a back-reference.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakGroup {
    pub peaks: Vec<Peak>,
    pub slice: Slice,

    pub mean_mz: f64,
    pub mean_rt: f32,
    pub group_rank: f32,
    pub group_id: usize,
    pub ms2_event_count: usize,
    pub integration_type: IntegrationType,

    pub compound: Option<Arc<Compound>>,
    pub adduct: Option<Arc<Adduct>>,
    pub isotope: Isotope,

    pub isotope_children: Vec<PeakGroup>,
    pub adduct_children: Vec<PeakGroup>,
}

impl PeakGroup {
    /// Builds an `Automated` group from peaks clustered at one slice.
    /// Annotation (compound, adduct, isotope) is inherited from the
    /// slice; statistics are height-weighted.
    pub fn from_peaks(mut peaks: Vec<Peak>, slice: &Slice, quant: QuantType) -> Self {
        peaks.sort_by(|a, b| a.sample_name.cmp(&b.sample_name));

        let weight: f32 = peaks.iter().map(|p| p.height).sum();
        let (mean_mz, mean_rt) = if weight > 0.0 {
            let mz = peaks.iter().map(|p| p.mz * p.height as f64).sum::<f64>() / weight as f64;
            let rt = peaks.iter().map(|p| p.rt * p.height).sum::<f32>() / weight;
            (mz, rt)
        } else {
            (slice.mz, 0.0)
        };

        let mut group = PeakGroup {
            peaks,
            slice: slice.clone(),
            mean_mz,
            mean_rt,
            group_rank: 0.0,
            group_id: 0,
            ms2_event_count: 0,
            integration_type: IntegrationType::Automated,
            compound: slice.compound.clone(),
            adduct: slice.adduct.clone(),
            isotope: slice.isotope.clone(),
            isotope_children: Vec::new(),
            adduct_children: Vec::new(),
        };
        group.group_rank = group.compute_rank(quant);
        group
    }

    /// Synthetic parent for orphan children of a compound.
    pub fn ghost(compound: Arc<Compound>, cutoff: MassCutoff) -> Self {
        let slice = Slice::ghost_for(compound.clone(), cutoff);
        PeakGroup {
            peaks: Vec::new(),
            mean_mz: compound.mz,
            mean_rt: 0.0,
            group_rank: 0.0,
            group_id: 0,
            ms2_event_count: 0,
            integration_type: IntegrationType::Ghost,
            compound: Some(compound),
            adduct: None,
            isotope: Isotope::none(),
            isotope_children: Vec::new(),
            adduct_children: Vec::new(),
            slice,
        }
    }

    fn compute_rank(&self, quant: QuantType) -> f32 {
        let quality = self.mean_quality();
        let intensity = self.intensity(quant);
        quality * (1.0 + (1.0 + intensity.max(0.0)).log10())
    }

    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }

    /// Group abundance: the highest per-peak value of the metric.
    pub fn intensity(&self, metric: QuantType) -> f32 {
        self.peaks
            .iter()
            .map(|p| p.quantity(metric))
            .fold(0.0, f32::max)
    }

    pub fn mean_quality(&self) -> f32 {
        if self.peaks.is_empty() {
            return 0.0;
        }
        self.peaks.iter().map(|p| p.quality).sum::<f32>() / self.peaks.len() as f32
    }

    pub fn peak_for_sample(&self, sample_name: &str) -> Option<&Peak> {
        self.peaks.iter().find(|p| p.sample_name == sample_name)
    }

    pub fn rt_bounds(&self) -> (f32, f32) {
        let min = self
            .peaks
            .iter()
            .map(|p| p.rt_min)
            .fold(f32::MAX, f32::min);
        let max = self.peaks.iter().map(|p| p.rt_max).fold(0.0, f32::max);
        if min > max { (0.0, 0.0) } else { (min, max) }
    }

    pub fn is_ghost(&self) -> bool {
        self.integration_type == IntegrationType::Ghost
    }

    pub fn is_isotope(&self) -> bool {
        !self.isotope.is_none() && !self.isotope.is_parent()
    }

    pub fn is_adduct(&self) -> bool {
        self.adduct.as_ref().map_or(false, |a| !a.is_parent)
    }

    /// Monoisotopic, canonical-adduct form: adduct parent-or-unset and
    /// isotope parent-or-none.
    pub fn is_parent_form(&self) -> bool {
        let adduct_ok = self.adduct.as_ref().map_or(true, |a| a.is_parent);
        let isotope_ok = self.isotope.is_none() || self.isotope.is_parent();
        adduct_ok && isotope_ok
    }

    pub fn has_compound_link(&self) -> bool {
        self.compound.is_some()
    }

    /// |meanRt - expected RT| in minutes; MAX when the compound is
    /// missing or carries no expectation.
    pub fn expected_rt_diff(&self) -> f32 {
        match &self.compound {
            Some(c) if c.expected_rt > 0.0 => (self.mean_rt - c.expected_rt).abs(),
            _ => f32::MAX,
        }
    }

    pub fn add_isotope_child(&mut self, child: PeakGroup) {
        self.isotope_children.push(child);
    }

    pub fn add_adduct_child(&mut self, child: PeakGroup) {
        self.adduct_children.push(child);
    }

    pub fn children_count(&self) -> usize {
        self.isotope_children.len() + self.adduct_children.len()
    }
}
