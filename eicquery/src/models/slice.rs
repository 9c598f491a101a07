use std::sync::Arc;

use crate::models::compound::{
    Adduct,
    Compound,
    Isotope,
};
use crate::models::mass_cutoff::MassCutoff;

/// A rectangle in (m/z, RT) space defining one extraction query.
///
/// Invariants: `mz_min <= mz_max`, `rt_min <= rt_max`. A `rt_min ==
/// rt_max` pair means the RT dimension is unrestricted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slice {
    pub mz_min: f64,
    pub mz_max: f64,
    pub rt_min: f32,
    pub rt_max: f32,

    /// Center m/z of the window.
    pub mz: f64,
    /// Underlying intensity, used to order slices before processing.
    pub ion_count: f32,

    pub compound: Option<Arc<Compound>>,
    pub adduct: Option<Arc<Adduct>>,
    pub isotope: Isotope,
    pub srm_id: String,
}

impl Slice {
    pub fn from_mz_range(mz_min: f64, mz_max: f64, rt_min: f32, rt_max: f32) -> Self {
        debug_assert!(mz_min <= mz_max);
        debug_assert!(rt_min <= rt_max);
        Slice {
            mz_min,
            mz_max,
            rt_min,
            rt_max,
            mz: (mz_min + mz_max) / 2.0,
            ..Slice::default()
        }
    }

    /// Targeted slice around a compound's expected m/z. The RT window
    /// stays unrestricted unless `rt_window` is positive and the
    /// compound carries an expected RT.
    pub fn from_compound(compound: Arc<Compound>, cutoff: MassCutoff, rt_window: f32) -> Self {
        let (mz_min, mz_max) = cutoff.mz_range(compound.mz);
        let (rt_min, rt_max) = if rt_window > 0.0 && compound.expected_rt > 0.0 {
            (
                (compound.expected_rt - rt_window).max(0.0),
                compound.expected_rt + rt_window,
            )
        } else {
            (0.0, f32::MAX)
        };
        Slice {
            mz_min,
            mz_max,
            rt_min,
            rt_max,
            mz: compound.mz,
            srm_id: compound.srm_id.clone(),
            isotope: Isotope::none(),
            compound: Some(compound),
            ..Slice::default()
        }
    }

    /// Slice for a synthetic ghost parent: the compound window with no
    /// RT bounds.
    pub fn ghost_for(compound: Arc<Compound>, cutoff: MassCutoff) -> Self {
        let (mz_min, mz_max) = cutoff.mz_range(compound.mz);
        Slice {
            mz_min,
            mz_max,
            rt_min: 0.0,
            rt_max: 0.0,
            mz: compound.mz,
            compound: Some(compound),
            ..Slice::default()
        }
    }

    pub fn with_mz_center(mut self, mz: f64, cutoff: MassCutoff) -> Self {
        let (lo, hi) = cutoff.mz_range(mz);
        self.mz = mz;
        self.mz_min = lo;
        self.mz_max = hi;
        self
    }

    pub fn with_adduct(mut self, adduct: Arc<Adduct>) -> Self {
        self.adduct = Some(adduct);
        self
    }

    pub fn with_isotope(mut self, isotope: Isotope) -> Self {
        self.isotope = isotope;
        self
    }

    /// Whether this slice queries the monoisotopic, canonical-adduct
    /// form: adduct parent-or-unset and isotope parent-or-none.
    pub fn is_parent_form(&self) -> bool {
        let adduct_ok = self.adduct.as_ref().map_or(true, |a| a.is_parent);
        let isotope_ok = self.isotope.is_none() || self.isotope.is_parent();
        adduct_ok && isotope_ok
    }
}
