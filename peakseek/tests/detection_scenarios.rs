//! End-to-end detection runs over synthetic in-memory samples.

use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use eicquery::{
    Compound,
    MemSample,
    SampleLike,
    Scan,
    C13_MASS_DELTA,
};
use peakseek::{
    Detector,
    EicClassifier,
    EngineParams,
    IntegrationType,
    ProgressSink,
    RecordingProgress,
};

/// A chromatographic trace to synthesize: (m/z, apex RT in minutes,
/// apex intensity).
type Trace = (f64, f32, f32);

/// Builds a sample with Gaussian traces on a flat offset. Scans run
/// from 0 to 10 minutes at 0.05 min spacing.
fn sample_with_traces(name: &str, traces: &[Trace]) -> Arc<dyn SampleLike> {
    let mut scans = Vec::new();
    for i in 0..=200 {
        let rt = i as f32 * 0.05;
        let mut points: Vec<(f64, f32)> = traces
            .iter()
            .map(|&(mz, center, apex)| {
                let x = (rt - center) / 0.15;
                (mz, 5.0 + apex * (-0.5 * x * x).exp())
            })
            .collect();
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let (mz, intensity): (Vec<f64>, Vec<f32>) = points.into_iter().unzip();
        scans.push(Scan::ms1(rt, mz, intensity));
    }
    Arc::new(MemSample::new(name, scans))
}

fn compound(id: &str, mz: f64, expected_rt: f32) -> Arc<Compound> {
    Arc::new(Compound {
        id: id.to_string(),
        name: id.to_string(),
        mz,
        expected_rt,
        charge: 1,
        precursor_mz: 0.0,
        product_mz: 0.0,
        collision_energy: 0.0,
        srm_id: String::new(),
        fragment_mzs: vec![],
        fragment_intensities: vec![],
    })
}

#[test]
fn parent_only_detection_yields_one_group() {
    let samples: Vec<Arc<dyn SampleLike>> = vec![
        sample_with_traces("s1", &[(300.0, 5.0, 2000.0)]),
        sample_with_traces("s2", &[(300.0, 5.05, 1800.0)]),
        sample_with_traces("s3", &[(300.0, 4.95, 2200.0)]),
    ];
    let mut detector = Detector::new(samples, EngineParams::default());
    detector.process_compounds(&[compound("c1", 300.0, 5.0)]);

    assert_eq!(detector.groups.len(), 1);
    let group = &detector.groups[0];
    assert_eq!(group.peak_count(), 3);
    assert_eq!(group.group_id, 1);
    assert_eq!(group.integration_type, IntegrationType::Automated);
    assert!(group.isotope_children.is_empty());
    assert!(group.adduct_children.is_empty());
    assert!((group.mean_rt - 5.0).abs() < 0.15, "mean rt {}", group.mean_rt);
    assert!((group.mean_mz - 300.0).abs() < 0.01);
}

#[test]
fn isotope_child_nests_under_parent() {
    let child_mz = 300.0 + C13_MASS_DELTA;
    let samples: Vec<Arc<dyn SampleLike>> = vec![
        sample_with_traces("s1", &[(300.0, 5.0, 2000.0), (child_mz, 5.0, 240.0)]),
        sample_with_traces("s2", &[(300.0, 5.0, 1500.0), (child_mz, 5.0, 180.0)]),
    ];
    let mut params = EngineParams::default();
    params.pull_isotopes = true;
    params.max_isotopes = 2;

    let mut detector = Detector::new(samples, params);
    detector.process_compounds(&[compound("c1", 300.0, 5.0)]);

    assert_eq!(detector.groups.len(), 1, "only the parent stays top-level");
    let parent = &detector.groups[0];
    assert!(parent.is_parent_form());
    assert_eq!(parent.isotope_children.len(), 1);
    let child = &parent.isotope_children[0];
    assert_eq!(child.isotope.name, "C13-label-1");
    assert_eq!(child.integration_type, IntegrationType::Automated);
    assert_eq!(child.peak_count(), 2);
}

#[test]
fn orphan_children_get_a_ghost_parent() {
    // The isotopologue trace is present but the monoisotopic one is
    // not, so no parent group can form.
    let child_mz = 300.0 + C13_MASS_DELTA;
    let samples: Vec<Arc<dyn SampleLike>> = vec![
        sample_with_traces("s1", &[(child_mz, 4.0, 800.0)]),
        sample_with_traces("s2", &[(child_mz, 4.0, 600.0)]),
    ];
    let mut params = EngineParams::default();
    params.pull_isotopes = true;
    params.max_isotopes = 1;

    let mut detector = Detector::new(samples, params);
    detector.process_compounds(&[compound("c1", 300.0, 5.0)]);

    assert_eq!(detector.groups.len(), 1);
    let ghost = &detector.groups[0];
    assert_eq!(ghost.integration_type, IntegrationType::Ghost);
    assert!(ghost.peaks.is_empty());
    assert_eq!(ghost.slice.rt_min, 0.0);
    assert_eq!(ghost.slice.rt_max, 0.0);
    assert_eq!(ghost.isotope_children.len(), 1);
    assert_eq!(ghost.isotope_children[0].isotope.name, "C13-label-1");
}

/// Flips the detector's stop flag once enough slices have completed.
struct StopAfter {
    stop: Arc<AtomicBool>,
    after: usize,
}

impl ProgressSink for StopAfter {
    fn progress(&self, text: &str, completed: usize, _total: usize) {
        if text.starts_with("Found") && completed >= self.after {
            self.stop.store(true, Ordering::Relaxed);
        }
    }
}

#[test]
fn cancellation_is_cooperative_at_slice_granularity() {
    let traces: Vec<Trace> = (0..100).map(|i| (200.0 + i as f64, 5.0, 1000.0)).collect();
    let samples: Vec<Arc<dyn SampleLike>> = vec![sample_with_traces("s1", &traces)];
    let compounds: Vec<Arc<Compound>> = (0..100)
        .map(|i| compound(&format!("c{}", i), 200.0 + i as f64, 5.0))
        .collect();

    let mut detector = Detector::new(samples, EngineParams::default());
    let sink = Arc::new(StopAfter {
        stop: detector.stop_handle(),
        after: 10,
    });
    detector = detector.with_progress(sink);
    detector.process_compounds(&compounds);

    // At most 10 slices' worth of groups, each slice yielding one.
    assert!(!detector.groups.is_empty());
    assert!(detector.groups.len() <= 10, "got {}", detector.groups.len());
    for group in &detector.groups {
        assert_eq!(group.peak_count(), 1);
    }
}

#[test]
fn group_limit_stops_detection_and_holds() {
    let traces: Vec<Trace> = (0..20).map(|i| (200.0 + i as f64, 5.0, 1000.0)).collect();
    let samples: Vec<Arc<dyn SampleLike>> = vec![sample_with_traces("s1", &traces)];
    let compounds: Vec<Arc<Compound>> = (0..20)
        .map(|i| compound(&format!("c{}", i), 200.0 + i as f64, 5.0))
        .collect();

    let mut params = EngineParams::default();
    params.limit_group_count = 5;
    let mut detector = Detector::new(samples, params);
    detector.process_compounds(&compounds);

    assert!(detector.groups.len() <= 5);
    assert!(!detector.groups.is_empty());
}

#[test]
fn detection_is_deterministic() {
    let child_mz = 300.0 + C13_MASS_DELTA;
    let build = || {
        let samples: Vec<Arc<dyn SampleLike>> = vec![
            sample_with_traces("s1", &[(300.0, 5.0, 2000.0), (child_mz, 5.0, 240.0)]),
            sample_with_traces("s2", &[(300.0, 5.1, 1500.0), (child_mz, 5.1, 180.0)]),
            sample_with_traces("s3", &[(300.0, 4.9, 1800.0), (child_mz, 4.9, 210.0)]),
        ];
        let mut params = EngineParams::default();
        params.pull_isotopes = true;
        let mut detector = Detector::new(samples, params);
        detector.process_compounds(&[compound("c1", 300.0, 5.0)]);
        detector.into_groups()
    };

    let first = build();
    let second = build();
    assert_eq!(first, second);
}

#[test]
fn untargeted_identification_clones_per_matching_target() {
    // One feature at m/z 400; two near-isobaric library compounds both
    // inside the merge window. The original group is replaced by two
    // annotated clones.
    let samples: Vec<Arc<dyn SampleLike>> = vec![
        sample_with_traces("s1", &[(400.0, 5.0, 3000.0)]),
        sample_with_traces("s2", &[(400.0, 5.0, 2500.0)]),
    ];
    let mut params = EngineParams::default();
    params.min_group_intensity = 500.0;
    let targets = vec![
        compound("iso_a", 400.001, 5.0),
        compound("iso_b", 400.002, 5.0),
    ];

    let mut detector = Detector::new(samples, params);
    detector.process_features(&targets);

    assert_eq!(detector.groups.len(), 2);
    let mut ids: Vec<&str> = detector
        .groups
        .iter()
        .map(|g| g.compound.as_ref().unwrap().id.as_str())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["iso_a", "iso_b"]);
    for group in &detector.groups {
        assert_eq!(group.peak_count(), 2);
    }
}

#[test]
fn identification_rt_window_rejects_late_matches() {
    let samples: Vec<Arc<dyn SampleLike>> = vec![
        sample_with_traces("s1", &[(400.0, 8.0, 3000.0)]),
        sample_with_traces("s2", &[(400.0, 8.0, 2500.0)]),
    ];
    let mut params = EngineParams::default();
    params.min_group_intensity = 500.0;
    params.identification_match_rt = true;
    params.identification_rt_window = 1.0;

    // The target expects RT 2.0 but the feature elutes at 8.0.
    let mut detector = Detector::new(samples, params);
    detector.process_features(&[compound("late", 400.0, 2.0)]);

    // No annotation happened; the untargeted group survives untouched.
    assert_eq!(detector.groups.len(), 1);
    assert!(detector.groups[0].compound.is_none());
}

/// A toy model that stamps a constant quality on every peak.
struct ConstantQuality(f32);

impl EicClassifier for ConstantQuality {
    fn has_model(&self) -> bool {
        true
    }

    fn score_eics(&self, eics: &mut [eicquery::Eic]) {
        for eic in eics.iter_mut() {
            for peak in eic.peaks.iter_mut() {
                peak.quality = self.0;
            }
        }
    }
}

#[test]
fn classifier_scores_are_applied_when_model_is_loaded() {
    let samples: Vec<Arc<dyn SampleLike>> = vec![sample_with_traces("s1", &[(300.0, 5.0, 2000.0)])];
    let mut detector =
        Detector::new(samples, EngineParams::default()).with_classifier(Arc::new(ConstantQuality(0.99)));
    detector.process_compounds(&[compound("c1", 300.0, 5.0)]);

    assert_eq!(detector.groups.len(), 1);
    for peak in &detector.groups[0].peaks {
        assert_eq!(peak.quality, 0.99);
    }
}

#[test]
fn mrm_compounds_take_the_transition_path() {
    let mut scans = Vec::new();
    for i in 0..=200 {
        let rt = i as f32 * 0.05;
        let x = (rt - 5.0) / 0.15;
        let mut scan = Scan::ms1(rt, vec![163.06], vec![5.0 + 2000.0 * (-0.5 * x * x).exp()]);
        scan.ms_level = 2;
        scan.precursor_mz = 181.07;
        scan.collision_energy = 20.0;
        scans.push(scan);
    }
    let samples: Vec<Arc<dyn SampleLike>> = vec![Arc::new(MemSample::new("srm_sample", scans))];

    let mut mrm = (*compound("mrm1", 181.07, 5.0)).clone();
    mrm.precursor_mz = 181.07;
    mrm.product_mz = 163.06;
    mrm.collision_energy = 20.0;

    let progress = Arc::new(RecordingProgress::default());
    let mut detector =
        Detector::new(samples, EngineParams::default()).with_progress(progress.clone());
    detector.process_compounds(&[Arc::new(mrm)]);

    assert_eq!(detector.groups.len(), 1);
    assert_eq!(detector.groups[0].peak_count(), 1);
    assert!(
        progress
            .events()
            .iter()
            .any(|(text, _, _)| text.contains("transitions")),
        "progress should report the transition set"
    );
}

#[test]
fn noisy_samples_still_group_across_samples() {
    use rand::rngs::StdRng;
    use rand::{
        Rng,
        SeedableRng,
    };

    let mut rng = StdRng::seed_from_u64(7);
    let mut samples: Vec<Arc<dyn SampleLike>> = Vec::new();
    for name in ["n1", "n2", "n3"] {
        let mut scans = Vec::new();
        for i in 0..=200 {
            let rt = i as f32 * 0.05;
            let x = (rt - 5.0) / 0.15;
            let noise: f32 = rng.gen_range(-10.0..10.0);
            let intensity = (40.0 + noise + 2000.0 * (-0.5 * x * x).exp()).max(0.0);
            scans.push(Scan::ms1(rt, vec![300.0], vec![intensity]));
        }
        samples.push(Arc::new(MemSample::new(name, scans)));
    }

    let mut params = EngineParams::default();
    params.min_group_intensity = 500.0;
    params.min_peak_signal_baseline_ratio = 2.0;
    let mut detector = Detector::new(samples, params);
    detector.process_compounds(&[compound("c1", 300.0, 5.0)]);

    let main = detector
        .groups
        .iter()
        .max_by_key(|g| g.peak_count())
        .expect("detection must produce a group");
    assert_eq!(main.peak_count(), 3);
    assert!((main.mean_rt - 5.0).abs() < 0.2);
}

#[test]
fn empty_inputs_produce_no_groups() {
    let samples: Vec<Arc<dyn SampleLike>> = vec![sample_with_traces("s1", &[(300.0, 5.0, 100.0)])];
    let mut detector = Detector::new(samples, EngineParams::default());
    detector.process_compounds(&[]);
    assert!(detector.groups.is_empty());

    let mut detector = Detector::new(Vec::new(), EngineParams::default());
    detector.process_compounds(&[compound("c1", 300.0, 5.0)]);
    assert!(detector.groups.is_empty());
}

#[test]
fn unselected_samples_are_excluded() {
    let included = sample_with_traces("in", &[(300.0, 5.0, 2000.0)]);
    let excluded_inner = MemSample::new(
        "out",
        (0..=200)
            .map(|i| {
                let rt = i as f32 * 0.05;
                let x = (rt - 5.0) / 0.15;
                Scan::ms1(rt, vec![300.0], vec![5.0 + 2000.0 * (-0.5 * x * x).exp()])
            })
            .collect(),
    )
    .with_selected(false);
    let samples: Vec<Arc<dyn SampleLike>> = vec![included, Arc::new(excluded_inner)];

    let mut detector = Detector::new(samples, EngineParams::default());
    detector.process_compounds(&[compound("c1", 300.0, 5.0)]);

    assert_eq!(detector.groups.len(), 1);
    assert_eq!(detector.groups[0].peak_count(), 1);
    assert_eq!(detector.groups[0].peaks[0].sample_name, "in");
}
