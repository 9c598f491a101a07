use serde::{
    Deserialize,
    Serialize,
};

/// Mass of a proton in Da.
pub const PROTON_MASS: f64 = 1.00727646688;

/// Mass difference between C13 and C12 in Da.
pub const C13_MASS_DELTA: f64 = 1.00335483507;

/// Isotope name assigned to the unlabeled parent form.
pub const PARENT_ISOTOPE_NAME: &str = "C12 PARENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompoundKind {
    Regular,
    /// Triple-quadrupole transition, identified by (precursor, product).
    Mrm,
}

/// A targeted analyte from a compound library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub id: String,
    pub name: String,

    /// Expected monoisotopic m/z at the default charge.
    pub mz: f64,

    /// Expected retention time in minutes. Values <= 0 mean unknown.
    #[serde(default)]
    pub expected_rt: f32,

    /// Signed charge; 0 is treated as +1.
    #[serde(default)]
    pub charge: i32,

    #[serde(default)]
    pub precursor_mz: f64,
    #[serde(default)]
    pub product_mz: f64,
    #[serde(default)]
    pub collision_energy: f64,
    #[serde(default)]
    pub srm_id: String,

    /// Reference fragmentation spectrum, parallel arrays.
    #[serde(default)]
    pub fragment_mzs: Vec<f64>,
    #[serde(default)]
    pub fragment_intensities: Vec<f32>,
}

impl Compound {
    pub fn kind(&self) -> CompoundKind {
        if self.precursor_mz > 0.0 && self.product_mz > 0.0 {
            CompoundKind::Mrm
        } else {
            CompoundKind::Regular
        }
    }

    pub fn charge_or_default(&self) -> i32 {
        if self.charge == 0 { 1 } else { self.charge }
    }

    /// Neutral monoisotopic mass, back-calculated from `mz` and charge.
    pub fn neutral_mass(&self) -> f64 {
        let charge = self.charge_or_default();
        let z = charge.unsigned_abs() as f64;
        let sign = if charge > 0 { 1.0 } else { -1.0 };
        z * (self.mz - sign * PROTON_MASS)
    }

    pub fn has_fragmentation(&self) -> bool {
        !self.fragment_mzs.is_empty()
    }
}

/// An ionization form applied to a neutral molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adduct {
    pub name: String,
    /// Number of molecules in the ion (e.g. 2 for [2M+H]+).
    pub nmol: i32,
    pub charge: i32,
    /// Mass added to `nmol` neutral masses, in Da.
    pub mass_shift: f64,
    /// Whether this is the canonical ionization for its polarity.
    pub is_parent: bool,
}

impl Adduct {
    pub fn mz_from_neutral_mass(&self, neutral_mass: f64) -> f64 {
        let z = self.charge.unsigned_abs().max(1) as f64;
        (self.nmol as f64 * neutral_mass + self.mass_shift) / z
    }

    pub fn proton_positive() -> Self {
        Adduct {
            name: "[M+H]+".to_string(),
            nmol: 1,
            charge: 1,
            mass_shift: PROTON_MASS,
            is_parent: true,
        }
    }

    pub fn proton_negative() -> Self {
        Adduct {
            name: "[M-H]-".to_string(),
            nmol: 1,
            charge: -1,
            mass_shift: -PROTON_MASS,
            is_parent: true,
        }
    }

    pub fn sodiated() -> Self {
        Adduct {
            name: "[M+Na]+".to_string(),
            nmol: 1,
            charge: 1,
            mass_shift: 22.989218,
            is_parent: false,
        }
    }

    pub fn ammoniated() -> Self {
        Adduct {
            name: "[M+NH4]+".to_string(),
            nmol: 1,
            charge: 1,
            mass_shift: 18.033823,
            is_parent: false,
        }
    }
}

/// Isotopologue descriptor.
///
/// The default value (`none`) marks untargeted or unset slices; the
/// parent carries index 0 with the canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Isotope {
    pub name: String,
    pub mass_shift_index: i32,
}

impl Isotope {
    pub fn none() -> Self {
        Isotope::default()
    }

    pub fn parent() -> Self {
        Isotope {
            name: PARENT_ISOTOPE_NAME.to_string(),
            mass_shift_index: 0,
        }
    }

    pub fn c13(label_count: i32) -> Self {
        Isotope {
            name: format!("C13-label-{}", label_count),
            mass_shift_index: label_count,
        }
    }

    pub fn is_none(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_parent(&self) -> bool {
        !self.is_none() && self.mass_shift_index == 0
    }
}
