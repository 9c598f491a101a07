//! Candidate slice generation: untargeted feature slices plus the
//! targeted compound, isotopologue, and adduct enumerations.

use std::sync::Arc;

use tracing::info;

use eicquery::{
    Compound,
    CompoundKind,
    Isotope,
    SampleLike,
    Slice,
    C13_MASS_DELTA,
};

use crate::params::EngineParams;

pub struct SliceGenerator<'a> {
    params: &'a EngineParams,
}

impl<'a> SliceGenerator<'a> {
    pub fn new(params: &'a EngineParams) -> Self {
        SliceGenerator { params }
    }

    /// Untargeted feature slices: mass tracks binned over the pooled
    /// MS1 points of all selected samples. Points are sorted by m/z and
    /// split wherever the gap exceeds the merge cutoff; every bin whose
    /// strongest point clears the group-intensity floor becomes one
    /// slice spanning the observed RT range plus a margin.
    pub fn feature_slices(&self, samples: &[Arc<dyn SampleLike>]) -> Vec<Slice> {
        let mut points: Vec<(f64, f32, f32)> = Vec::new();
        for sample in samples.iter().filter(|s| s.is_selected() && !s.is_blank()) {
            for scan in sample.scans() {
                if scan.ms_level != 1 {
                    continue;
                }
                for (&mz, &intensity) in scan.mz.iter().zip(scan.intensity.iter()) {
                    if intensity >= self.params.min_group_intensity {
                        points.push((mz, scan.rt, intensity));
                    }
                }
            }
        }
        if points.is_empty() {
            return Vec::new();
        }
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut slices = Vec::new();
        let mut bin_start = 0;
        for i in 1..=points.len() {
            let split = i == points.len() || {
                let gap = points[i].0 - points[i - 1].0;
                gap > self.params.mass_cutoff_merge.window(points[i - 1].0)
            };
            if !split {
                continue;
            }
            slices.push(self.bin_to_slice(&points[bin_start..i]));
            bin_start = i;
        }
        info!("Built {} feature slices", slices.len());
        slices
    }

    fn bin_to_slice(&self, bin: &[(f64, f32, f32)]) -> Slice {
        let total: f64 = bin.iter().map(|p| p.2 as f64).sum();
        let centroid = bin.iter().map(|p| p.0 * p.2 as f64).sum::<f64>() / total.max(1.0);
        let rt_lo = bin.iter().map(|p| p.1).fold(f32::MAX, f32::min);
        let rt_hi = bin.iter().map(|p| p.1).fold(0.0f32, f32::max);
        let peak_intensity = bin.iter().map(|p| p.2).fold(0.0f32, f32::max);

        let margin = self.params.feature_rt_margin;
        let (mz_min, mz_max) = self.params.mass_cutoff_merge.mz_range(centroid);
        let mut slice = Slice::from_mz_range(
            mz_min,
            mz_max,
            (rt_lo - margin).max(0.0),
            rt_hi + margin,
        );
        slice.mz = centroid;
        slice.ion_count = peak_intensity;
        slice
    }

    /// One slice per compound at its expected m/z. MRM compounds carry
    /// their SRM id through so extraction takes the transition path.
    pub fn compound_slices(&self, compounds: &[Arc<Compound>]) -> Vec<Slice> {
        compounds
            .iter()
            .map(|compound| {
                Slice::from_compound(
                    compound.clone(),
                    self.params.compound_mass_cutoff_window,
                    self.compound_rt_window(),
                )
            })
            .collect()
    }

    /// Parent slice plus one slice per C13 isotopologue up to the
    /// configured maximum. MRM compounds are skipped.
    pub fn isotope_slices(&self, compounds: &[Arc<Compound>]) -> Vec<Slice> {
        let mut slices = Vec::new();
        for compound in compounds {
            if compound.kind() == CompoundKind::Mrm {
                continue;
            }
            let base = Slice::from_compound(
                compound.clone(),
                self.params.compound_mass_cutoff_window,
                self.compound_rt_window(),
            );
            slices.push(base.clone().with_isotope(Isotope::parent()));

            let z = compound.charge_or_default().unsigned_abs().max(1) as f64;
            for n in 1..=self.params.max_isotopes {
                let shifted = compound.mz + n as f64 * C13_MASS_DELTA / z;
                slices.push(
                    base.clone()
                        .with_mz_center(shifted, self.params.compound_mass_cutoff_window)
                        .with_isotope(Isotope::c13(n as i32)),
                );
            }
        }
        slices
    }

    /// One slice per (compound, selected adduct form). With
    /// `exclude_parent` the canonical adduct is skipped — used when the
    /// isotope enumeration already produced the parent slice.
    pub fn adduct_slices(&self, compounds: &[Arc<Compound>], exclude_parent: bool) -> Vec<Slice> {
        let mut slices = Vec::new();
        for compound in compounds {
            if compound.kind() == CompoundKind::Mrm {
                continue;
            }
            let neutral_mass = compound.neutral_mass();
            for adduct in &self.params.adducts {
                if exclude_parent && adduct.is_parent {
                    continue;
                }
                let mz = adduct.mz_from_neutral_mass(neutral_mass);
                let slice = Slice::from_compound(
                    compound.clone(),
                    self.params.compound_mass_cutoff_window,
                    self.compound_rt_window(),
                )
                .with_mz_center(mz, self.params.compound_mass_cutoff_window)
                .with_adduct(Arc::new(adduct.clone()));
                slices.push(slice);
            }
        }
        slices
    }

    fn compound_rt_window(&self) -> f32 {
        if self.params.match_compound_rt {
            self.params.compound_rt_window
        } else {
            0.0
        }
    }
}

/// Descending underlying intensity, so the group limit truncates
/// low-signal work first. Stable: equal-intensity slices keep their
/// generation order.
pub fn sort_slices_by_intensity(slices: &mut [Slice]) {
    slices.sort_by(|a, b| {
        b.ion_count
            .partial_cmp(&a.ion_count)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
