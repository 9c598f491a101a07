//! MS2 event collection and library spectrum matching.

use std::sync::Arc;

use eicquery::{
    MassCutoff,
    SampleLike,
    Scan,
};

/// MS2 scans across all samples whose precursor landed in the m/z
/// window and whose RT falls inside the group bounds.
pub fn collect_ms2_scans<'s>(
    samples: &'s [Arc<dyn SampleLike>],
    mz_min: f64,
    mz_max: f64,
    rt_min: f32,
    rt_max: f32,
) -> Vec<&'s Scan> {
    let mut out = Vec::new();
    for sample in samples {
        for scan in sample.scans() {
            if scan.ms_level < 2 {
                continue;
            }
            if scan.precursor_mz < mz_min || scan.precursor_mz > mz_max {
                continue;
            }
            if scan.rt < rt_min || scan.rt > rt_max {
                continue;
            }
            out.push(scan);
        }
    }
    out
}

/// Scores observed MS2 events against a library spectrum.
///
/// For each library fragment the best observed intensity within the
/// cutoff is taken across all scans. The score blends the matched
/// fraction with a normalized dot product over the matched fragments,
/// both in [0, 1].
pub fn spectral_match_score(
    library_mzs: &[f64],
    library_intensities: &[f32],
    observed: &[&Scan],
    cutoff: MassCutoff,
) -> f32 {
    if library_mzs.is_empty() || observed.is_empty() {
        return 0.0;
    }

    let mut matched: Vec<f32> = vec![0.0; library_mzs.len()];
    for scan in observed {
        for (i, &frag_mz) in library_mzs.iter().enumerate() {
            let (lo, hi) = cutoff.mz_range(frag_mz);
            let best = scan.max_intensity_in(lo, hi);
            if best > matched[i] {
                matched[i] = best;
            }
        }
    }

    let matched_count = matched.iter().filter(|&&x| x > 0.0).count();
    let fraction = matched_count as f32 / library_mzs.len() as f32;
    if matched_count == 0 {
        return 0.0;
    }

    let lib_norm: f32 = library_intensities
        .iter()
        .map(|&x| x * x)
        .sum::<f32>()
        .sqrt();
    let obs_norm: f32 = matched.iter().map(|&x| x * x).sum::<f32>().sqrt();
    let dot = if lib_norm > 0.0 && obs_norm > 0.0 {
        library_intensities
            .iter()
            .zip(matched.iter())
            .map(|(&l, &o)| (l / lib_norm) * (o / obs_norm))
            .sum::<f32>()
            .clamp(0.0, 1.0)
    } else {
        0.0
    };

    0.5 * fraction + 0.5 * dot
}
