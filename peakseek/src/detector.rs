//! The detection orchestrator: drives slices through EIC extraction,
//! peak filtering, grouping, and group filtering, then hands the run's
//! container to identification and meta-grouping.
//!
//! Only EIC extraction is parallel (a rayon fan-out across samples for
//! one slice); every other stage runs on the orchestrating thread, and
//! the group container is only ever touched from there.

use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use rayon::prelude::*;
use tracing::{
    info,
    warn,
};

use eicquery::{
    Compound,
    CompoundKind,
    Eic,
    MassCutoff,
    QuantType,
    SampleLike,
    Slice,
};

use crate::classifier::{
    EicClassifier,
    NoModel,
};
use crate::filters::{
    ChildFilterKind,
    GroupFiltering,
    PeakFiltering,
};
use crate::grouping::group_peaks;
use crate::metagroup::perform_meta_grouping;
use crate::models::PeakGroup;
use crate::params::EngineParams;
use crate::progress::{
    ProgressSink,
    SilentProgress,
};
use crate::slices::{
    sort_slices_by_intensity,
    SliceGenerator,
};
use crate::utils::spectra::collect_ms2_scans;

pub struct Detector {
    params: EngineParams,
    samples: Vec<Arc<dyn SampleLike>>,
    classifier: Arc<dyn EicClassifier>,
    progress: Arc<dyn ProgressSink>,
    stop: Arc<AtomicBool>,
    zero_status: bool,

    /// Run-scoped group container, intensity-descending.
    pub groups: Vec<PeakGroup>,
}

impl Detector {
    pub fn new(samples: Vec<Arc<dyn SampleLike>>, params: EngineParams) -> Self {
        Detector {
            params,
            samples,
            classifier: Arc::new(NoModel),
            progress: Arc::new(SilentProgress),
            stop: Arc::new(AtomicBool::new(false)),
            zero_status: true,
            groups: Vec::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn EicClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Cooperative cancellation flag, checked at the top of every slice
    /// iteration. In-flight EICs for the current slice always complete.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn reset_progress(&mut self) {
        self.zero_status = true;
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn into_groups(self) -> Vec<PeakGroup> {
        self.groups
    }

    /// Mean scan spacing across the selected samples, in minutes.
    pub fn average_scan_time(&self) -> f32 {
        let times: Vec<f32> = self
            .samples
            .iter()
            .filter(|s| s.is_selected())
            .map(|s| s.avg_scan_time())
            .filter(|&t| t > 0.0)
            .collect();
        if times.is_empty() {
            return 0.0;
        }
        times.iter().sum::<f32>() / times.len() as f32
    }

    /// Extracts one EIC per selected sample for the slice, in parallel,
    /// running each trace through the full per-EIC pipeline. Output
    /// order is unspecified.
    pub fn pull_eics(&self, slice: &Slice) -> Vec<Eic> {
        let params = &self.params;
        let compound = slice.compound.as_deref();

        self.samples
            .par_iter()
            .filter(|sample| sample.is_selected())
            .filter_map(|sample| {
                let raw = if !slice.srm_id.is_empty() {
                    sample.eic_by_srm(&slice.srm_id, params.eic_kind)
                } else if let Some(c) =
                    compound.filter(|c| c.precursor_mz > 0.0 && c.product_mz > 0.0)
                {
                    sample.eic_by_transition(
                        c.precursor_mz,
                        c.collision_energy,
                        c.product_mz,
                        params.eic_kind,
                        &params.filterline,
                        params.amu_q1,
                        params.amu_q3,
                    )
                } else {
                    sample.eic_by_mz_range(
                        slice.mz_min,
                        slice.mz_max,
                        sample.min_rt(),
                        sample.max_rt(),
                        1,
                        params.eic_kind,
                        &params.filterline,
                    )
                };

                raw.map(|mut eic| {
                    eic.set_smoother(params.eic_smoothing_algorithm);
                    eic.set_baseline_mode(params.baseline_mode());
                    eic.compute_baseline();
                    eic.reduce_to_rt_range(slice.rt_min, slice.rt_max);
                    eic.set_filter_signal_baseline_diff(params.min_signal_baseline_difference);
                    eic.detect_peak_positions(params.eic_smoothing_window);
                    eic
                })
            })
            .collect()
    }

    /// Targeted entry point: one detection run over library compounds.
    pub fn process_compounds(&mut self, compounds: &[Arc<Compound>]) {
        if compounds.is_empty() {
            return;
        }

        self.progress.progress("Preparing libraries for search…", 0, 0);
        self.params.avg_scan_time = self.average_scan_time();

        let srm_present = compounds.iter().any(|c| c.kind() == CompoundKind::Mrm);

        let (slices, set_name) = {
            let generator = SliceGenerator::new(&self.params);
            if self.params.pull_isotopes && self.params.search_adducts && !srm_present {
                let mut slices = generator.isotope_slices(compounds);
                slices.extend(generator.adduct_slices(compounds, true));
                (slices, "isotopologues and adducts")
            } else if self.params.pull_isotopes && !srm_present {
                (generator.isotope_slices(compounds), "isotopologues")
            } else if self.params.search_adducts && !srm_present {
                (generator.adduct_slices(compounds, false), "adducts")
            } else if srm_present {
                (generator.compound_slices(compounds), "transitions")
            } else {
                (generator.compound_slices(compounds), "groups")
            }
        };

        self.process_slices(slices, set_name);

        perform_meta_grouping(&mut self.groups, &self.params, &*self.progress);
        if !srm_present {
            self.filter_children_against_parents(self.params.compound_mass_cutoff_window);
        }
    }

    /// Untargeted entry point: feature slices straight from the raw
    /// data, optionally annotated against a target library afterwards.
    pub fn process_features(&mut self, identification_set: &[Arc<Compound>]) {
        self.params.avg_scan_time = self.average_scan_time();

        let slices = SliceGenerator::new(&self.params).feature_slices(&self.samples);
        if slices.is_empty() {
            return;
        }

        self.progress.progress("Peak Detection", 0, 1);
        self.process_slices(slices, "groups");
        self.identify_features(identification_set);
    }

    /// The per-slice detection loop.
    fn process_slices(&mut self, mut slices: Vec<Slice>, set_name: &str) {
        if slices.is_empty() {
            return;
        }

        // Downstream stages get a snapshot so a mid-run change to the
        // live parameters cannot skew grouping for slices in flight.
        let snapshot = self.params.clone();

        self.groups.clear();
        sort_slices_by_intensity(&mut slices);
        let total = slices.len().min(self.params.limit_group_count);

        for (s, slice) in slices.iter().enumerate() {
            if self.stop.load(Ordering::Relaxed) {
                info!("Detection cancelled after {} slices", s);
                break;
            }

            let mut eics = self.pull_eics(slice);

            if self.classifier.has_model() {
                self.classifier.score_eics(&mut eics);
            }

            let eic_max_intensity = eics
                .iter()
                .map(|eic| match self.params.peak_quantitation {
                    QuantType::AreaTop => eic.max_area_top_intensity,
                    QuantType::Area => eic.max_area_intensity,
                    QuantType::Height => eic.max_intensity,
                    QuantType::AreaNotCorrected => eic.max_area_not_corrected_intensity,
                    QuantType::AreaTopNotCorrected => eic.max_area_top_not_corrected_intensity,
                })
                .fold(0.0f32, f32::max);

            // Only parent forms are gated on group intensity; children
            // are judged against their parent later.
            let parent_form = slice.is_parent_form();
            if parent_form && eic_max_intensity < self.params.min_group_intensity {
                continue;
            }

            PeakFiltering::new(&self.params, !parent_form).filter(&mut eics);

            let mut peakgroups = group_peaks(&eics, slice, &snapshot);
            for group in peakgroups.iter_mut() {
                group.ms2_event_count = self.count_ms2_events(group);
            }
            if parent_form {
                GroupFiltering::new(&self.params, &self.samples).filter(&mut peakgroups);
            }
            drop(eics);

            if !peakgroups.is_empty() {
                // Front insertion keeps the container ordered by
                // descending slice intensity.
                self.groups.splice(0..0, peakgroups);
            }

            if self.groups.len() > self.params.limit_group_count {
                warn!(
                    "Group limit of {} exceeded; stopping detection early",
                    self.params.limit_group_count
                );
                // The freshly inserted batch sits at the front; trim it
                // back so the container never ends above the limit.
                let excess = self.groups.len() - self.params.limit_group_count;
                self.groups.drain(0..excess);
                break;
            }

            if self.zero_status {
                self.progress.progress("Status", 0, 1);
                self.zero_status = false;
            }
            self.progress.progress(
                &format!("Found {} {}", self.groups.len(), set_name),
                s + 1,
                total,
            );
        }
    }

    /// Annotates untargeted groups against library slices by m/z
    /// proximity. Every matching slice yields an annotated clone; an
    /// original that matched anything is removed, and the clones are
    /// inserted at the front.
    fn identify_features(&mut self, identification_set: &[Arc<Compound>]) {
        if identification_set.is_empty() {
            return;
        }

        self.progress
            .progress("Preparing libraries for identification…", 0, 0);

        let slices = {
            let generator = SliceGenerator::new(&self.params);
            if self.params.pull_isotopes && self.params.search_adducts {
                let mut slices = generator.isotope_slices(identification_set);
                slices.extend(generator.adduct_slices(identification_set, true));
                slices
            } else if self.params.pull_isotopes {
                generator.isotope_slices(identification_set)
            } else if self.params.search_adducts {
                generator.adduct_slices(identification_set, false)
            } else {
                generator.compound_slices(identification_set)
            }
        };

        let existing = std::mem::take(&mut self.groups);
        let total = existing.len();
        let mut kept: Vec<PeakGroup> = Vec::with_capacity(total);
        let mut to_merge: Vec<PeakGroup> = Vec::new();

        for (i, group) in existing.into_iter().enumerate() {
            let mut match_found = false;
            for slice in &slices {
                if !self
                    .params
                    .mass_cutoff_merge
                    .contains(group.mean_mz, slice.mz)
                {
                    continue;
                }

                let mut annotated = group.clone();
                annotated.compound = slice.compound.clone();
                annotated.adduct = slice.adduct.clone();
                annotated.isotope = slice.isotope.clone();

                if self.params.identification_match_rt
                    && annotated.expected_rt_diff() > self.params.identification_rt_window
                {
                    continue;
                }

                // Parent ion forms of annotated groups must still clear
                // MS2 matching when enabled.
                if self.params.match_fragmentation
                    && annotated.is_parent_form()
                    && annotated.ms2_event_count > 0
                    && GroupFiltering::new(&self.params, &self.samples).filter_by_ms2(&annotated)
                {
                    continue;
                }

                match_found = true;
                to_merge.push(annotated);
            }

            if !match_found {
                kept.push(group);
            }
            self.progress.progress(
                "Identifying features using the given compound set…",
                i + 1,
                total,
            );
        }

        self.groups = kept;
        if !to_merge.is_empty() {
            self.groups.splice(0..0, to_merge);
        }

        perform_meta_grouping(&mut self.groups, &self.params, &*self.progress);
        self.filter_children_against_parents(self.params.mass_cutoff_merge);
    }

    /// Post-meta-grouping pass: verify nested children against their
    /// parent by RT alignment and cross-sample height correlation.
    fn filter_children_against_parents(&mut self, cutoff: MassCutoff) {
        let isotopes_on =
            self.params.pull_isotopes && self.params.filter_isotopes_against_parent;
        let adducts_on = self.params.search_adducts && self.params.filter_adducts_against_parent;
        if !isotopes_on && !adducts_on {
            return;
        }

        let params = self.params.clone();
        let samples = self.samples.clone();
        let filtering = GroupFiltering::new(&params, &samples);
        let progress = self.progress.clone();

        for group in self.groups.iter_mut() {
            if group.is_ghost() {
                continue;
            }
            if group.is_isotope() || group.is_adduct() {
                continue;
            }
            if !group.has_compound_link() {
                continue;
            }

            if isotopes_on {
                progress.progress("Filtering isotopologues…", 0, 0);
                filtering.filter_based_on_parent(
                    group,
                    ChildFilterKind::Isotope,
                    params.max_isotope_scan_diff,
                    params.min_isotopic_correlation,
                    cutoff,
                );
            }
            if adducts_on {
                progress.progress("Filtering adducts…", 0, 0);
                filtering.filter_based_on_parent(
                    group,
                    ChildFilterKind::Adduct,
                    params.adduct_search_window,
                    params.adduct_percent_correlation / 100.0,
                    cutoff,
                );
            }
        }
    }

    fn count_ms2_events(&self, group: &PeakGroup) -> usize {
        let (rt_min, rt_max) = group.rt_bounds();
        if rt_max <= rt_min {
            return 0;
        }
        collect_ms2_scans(
            &self.samples,
            group.slice.mz_min,
            group.slice.mz_max,
            rt_min,
            rt_max,
        )
        .len()
    }
}
