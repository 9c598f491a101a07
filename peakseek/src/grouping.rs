//! Cross-sample peak clustering.
//!
//! Groups are seeded from the strongest unclaimed peak; every other
//! sample contributes at most its closest peak with overlapping RT
//! extents. Peaks from the same sample never coexist in one group.

use std::collections::BTreeMap;

use eicquery::{
    Eic,
    Slice,
};

use crate::models::PeakGroup;
use crate::params::EngineParams;

/// Clusters the detected peaks of `eics` into `Automated` peak groups
/// for one slice.
pub fn group_peaks(eics: &[Eic], slice: &Slice, params: &EngineParams) -> Vec<PeakGroup> {
    let all: Vec<_> = eics.iter().flat_map(|e| e.peaks.iter()).collect();
    if all.is_empty() {
        return Vec::new();
    }

    // Seed order: strongest first, ties broken by sample then RT so the
    // outcome does not depend on EIC arrival order.
    let mut order: Vec<usize> = (0..all.len()).collect();
    order.sort_by(|&a, &b| {
        all[b]
            .height
            .partial_cmp(&all[a].height)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| all[a].sample_name.cmp(&all[b].sample_name))
            .then_with(|| {
                all[a]
                    .rt
                    .partial_cmp(&all[b].rt)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    let mut claimed = vec![false; all.len()];
    let mut groups = Vec::new();

    for &seed_idx in &order {
        if claimed[seed_idx] {
            continue;
        }
        claimed[seed_idx] = true;
        let seed = all[seed_idx];

        // Closest overlapping unclaimed peak per other sample.
        let mut best: BTreeMap<&str, (usize, f32)> = BTreeMap::new();
        for (i, peak) in all.iter().enumerate() {
            if claimed[i] || peak.sample_name == seed.sample_name {
                continue;
            }
            if !peak.overlaps_rt(seed) {
                continue;
            }
            let dist = (peak.rt - seed.rt).abs();
            match best.get(peak.sample_name.as_str()) {
                Some(&(_, d)) if d <= dist => {}
                _ => {
                    best.insert(peak.sample_name.as_str(), (i, dist));
                }
            }
        }

        let mut members = vec![seed.clone()];
        for (i, _) in best.into_values() {
            claimed[i] = true;
            members.push(all[i].clone());
        }

        groups.push(PeakGroup::from_peaks(members, slice, params.peak_quantitation));
    }

    groups
}
