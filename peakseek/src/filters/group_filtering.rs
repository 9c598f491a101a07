//! Group-level quality gates: count/quality/intensity thresholds, the
//! signal-to-blank ratio, MS2 library matching, and the parent-child
//! correlation filter applied after meta-grouping.

use std::sync::Arc;

use tracing::debug;

use eicquery::{
    MassCutoff,
    SampleLike,
};

use crate::models::PeakGroup;
use crate::params::EngineParams;
use crate::utils::correlation::pearson_correlation;
use crate::utils::spectra::{
    collect_ms2_scans,
    spectral_match_score,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildFilterKind {
    Isotope,
    Adduct,
}

pub struct GroupFiltering<'a> {
    params: &'a EngineParams,
    samples: &'a [Arc<dyn SampleLike>],
}

impl<'a> GroupFiltering<'a> {
    pub fn new(params: &'a EngineParams, samples: &'a [Arc<dyn SampleLike>]) -> Self {
        GroupFiltering { params, samples }
    }

    /// Drops groups failing any of the group-level thresholds. Only
    /// called for parent-form slices; child forms are judged against
    /// their parent later.
    pub fn filter(&self, groups: &mut Vec<PeakGroup>) {
        let before = groups.len();
        groups.retain(|group| self.passes(group));
        if groups.len() != before {
            debug!(
                "Group filtering dropped {} of {} groups",
                before - groups.len(),
                before
            );
        }
    }

    fn passes(&self, group: &PeakGroup) -> bool {
        let quant = self.params.peak_quantitation;

        if group.peak_count() < self.params.min_good_peak_count {
            return false;
        }
        if group.mean_quality() < self.params.min_group_quality {
            return false;
        }

        let intensity = group.intensity(quant);
        if intensity < self.params.min_group_intensity
            || intensity > self.params.max_group_intensity
        {
            return false;
        }

        if self.params.min_signal_blank_ratio > 0.0 {
            let blank_max = group
                .peaks
                .iter()
                .filter(|p| {
                    self.samples
                        .iter()
                        .any(|s| s.is_blank() && s.name() == p.sample_name)
                })
                .map(|p| p.quantity(quant))
                .fold(0.0, f32::max);
            if blank_max > 0.0 && intensity / blank_max < self.params.min_signal_blank_ratio {
                return false;
            }
        }

        if self.params.match_fragmentation
            && group.ms2_event_count > 0
            && self.filter_by_ms2(group)
        {
            return false;
        }

        true
    }

    /// Whether the group fails MS2 matching against its compound's
    /// library spectrum. Groups without a compound or without a library
    /// spectrum cannot be judged and are kept.
    pub fn filter_by_ms2(&self, group: &PeakGroup) -> bool {
        let Some(compound) = &group.compound else {
            return false;
        };
        if !compound.has_fragmentation() {
            return false;
        }

        let (rt_min, rt_max) = group.rt_bounds();
        let scans = collect_ms2_scans(
            self.samples,
            group.slice.mz_min,
            group.slice.mz_max,
            rt_min,
            rt_max,
        );
        let score = spectral_match_score(
            &compound.fragment_mzs,
            &compound.fragment_intensities,
            &scans,
            self.params.mass_cutoff_merge,
        );
        score < self.params.min_frag_match_score
    }

    /// Parent-correlation filter: a child survives only when its apex
    /// RT sits within `max_scan_diff` scans of the parent and the
    /// Pearson correlation of per-sample peak heights clears
    /// `min_correlation`. The mass cutoff guards against stray peaks
    /// whose m/z drifted out of the child's window.
    pub fn filter_based_on_parent(
        &self,
        parent: &mut PeakGroup,
        kind: ChildFilterKind,
        max_scan_diff: f32,
        min_correlation: f32,
        cutoff: MassCutoff,
    ) {
        let rt_tolerance = max_scan_diff * self.params.avg_scan_time;
        let parent_rt = parent.mean_rt;

        let parent_heights: Vec<f32> = self
            .samples
            .iter()
            .filter(|s| s.is_selected())
            .map(|s| {
                parent
                    .peak_for_sample(s.name())
                    .map(|p| p.height)
                    .unwrap_or(0.0)
            })
            .collect();

        let samples = self.samples;
        let keep = |child: &PeakGroup| -> bool {
            if rt_tolerance > 0.0 && (child.mean_rt - parent_rt).abs() > rt_tolerance {
                return false;
            }
            let child_heights: Vec<f32> = samples
                .iter()
                .filter(|s| s.is_selected())
                .map(|s| {
                    child
                        .peak_for_sample(s.name())
                        .filter(|p| cutoff.contains(p.mz, child.mean_mz))
                        .map(|p| p.height)
                        .unwrap_or(0.0)
                })
                .collect();
            match pearson_correlation(&parent_heights, &child_heights) {
                Ok(r) if r.is_finite() => r >= min_correlation,
                _ => false,
            }
        };

        match kind {
            ChildFilterKind::Isotope => parent.isotope_children.retain(keep),
            ChildFilterKind::Adduct => parent.adduct_children.retain(keep),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eicquery::{
        MemSample,
        Peak,
        QuantType,
        Slice,
    };
    use crate::models::IntegrationType;

    fn peak(sample: &str, rt: f32, mz: f64, height: f32, quality: f32) -> Peak {
        Peak {
            rt,
            rt_min: rt - 0.1,
            rt_max: rt + 0.1,
            mz,
            height,
            area: height,
            area_top: height,
            quality,
            width: 5,
            sample_name: sample.to_string(),
            ..Peak::default()
        }
    }

    fn group(peaks: Vec<Peak>) -> PeakGroup {
        let slice = Slice::from_mz_range(199.99, 200.01, 0.0, 10.0);
        PeakGroup::from_peaks(peaks, &slice, QuantType::Height)
    }

    fn no_samples() -> Vec<Arc<dyn SampleLike>> {
        Vec::new()
    }

    #[test]
    fn test_min_peak_count() {
        let mut params = EngineParams::default();
        params.min_good_peak_count = 2;
        let samples = no_samples();
        let filtering = GroupFiltering::new(&params, &samples);

        let mut groups = vec![
            group(vec![peak("a", 5.0, 200.0, 100.0, 0.9)]),
            group(vec![
                peak("a", 5.0, 200.0, 100.0, 0.9),
                peak("b", 5.1, 200.0, 90.0, 0.9),
            ]),
        ];
        filtering.filter(&mut groups);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].peak_count(), 2);
    }

    #[test]
    fn test_intensity_window() {
        let mut params = EngineParams::default();
        params.min_group_intensity = 50.0;
        params.max_group_intensity = 500.0;
        let samples = no_samples();
        let filtering = GroupFiltering::new(&params, &samples);

        let mut groups = vec![
            group(vec![peak("a", 5.0, 200.0, 10.0, 0.9)]),
            group(vec![peak("a", 5.0, 200.0, 100.0, 0.9)]),
            group(vec![peak("a", 5.0, 200.0, 1000.0, 0.9)]),
        ];
        filtering.filter(&mut groups);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].intensity(QuantType::Height), 100.0);
    }

    #[test]
    fn test_signal_blank_ratio() {
        let mut params = EngineParams::default();
        params.min_signal_blank_ratio = 5.0;
        let samples: Vec<Arc<dyn SampleLike>> = vec![
            Arc::new(MemSample::new("a", vec![])),
            Arc::new(MemSample::new("blank", vec![]).with_blank(true)),
        ];
        let filtering = GroupFiltering::new(&params, &samples);

        // Blank peak nearly as strong as the signal: rejected.
        let mut groups = vec![group(vec![
            peak("a", 5.0, 200.0, 100.0, 0.9),
            peak("blank", 5.0, 200.0, 50.0, 0.9),
        ])];
        filtering.filter(&mut groups);
        assert!(groups.is_empty());

        // Weak blank: kept.
        let mut groups = vec![group(vec![
            peak("a", 5.0, 200.0, 100.0, 0.9),
            peak("blank", 5.0, 200.0, 5.0, 0.9),
        ])];
        filtering.filter(&mut groups);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_parent_correlation_filter() {
        let mut params = EngineParams::default();
        params.avg_scan_time = 0.1;
        let samples: Vec<Arc<dyn SampleLike>> = vec![
            Arc::new(MemSample::new("a", vec![])),
            Arc::new(MemSample::new("b", vec![])),
            Arc::new(MemSample::new("c", vec![])),
        ];
        let filtering = GroupFiltering::new(&params, &samples);

        let mut parent = group(vec![
            peak("a", 5.0, 200.0, 100.0, 0.9),
            peak("b", 5.0, 200.0, 200.0, 0.9),
            peak("c", 5.0, 200.0, 300.0, 0.9),
        ]);
        parent.integration_type = IntegrationType::Automated;

        // Correlated child (heights proportional to the parent).
        let good = group(vec![
            peak("a", 5.02, 201.003, 10.0, 0.9),
            peak("b", 5.02, 201.003, 20.0, 0.9),
            peak("c", 5.02, 201.003, 30.0, 0.9),
        ]);
        // Anti-correlated child.
        let bad = group(vec![
            peak("a", 5.02, 201.003, 30.0, 0.9),
            peak("b", 5.02, 201.003, 20.0, 0.9),
            peak("c", 5.02, 201.003, 10.0, 0.9),
        ]);
        // Child too far in RT.
        let late = group(vec![
            peak("a", 8.0, 201.003, 10.0, 0.9),
            peak("b", 8.0, 201.003, 20.0, 0.9),
            peak("c", 8.0, 201.003, 30.0, 0.9),
        ]);

        parent.add_isotope_child(good.clone());
        parent.add_isotope_child(bad);
        parent.add_isotope_child(late);

        filtering.filter_based_on_parent(
            &mut parent,
            ChildFilterKind::Isotope,
            5.0,
            0.8,
            MassCutoff::Da(0.01),
        );
        assert_eq!(parent.isotope_children.len(), 1);
        assert!((parent.isotope_children[0].mean_rt - good.mean_rt).abs() < 1e-6);
    }
}
