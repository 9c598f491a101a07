pub mod compound;
pub mod eic;
pub mod mass_cutoff;
pub mod peak;
pub mod sample;
pub mod scan;
pub mod slice;

pub use compound::{
    Adduct,
    Compound,
    CompoundKind,
    Isotope,
};
pub use eic::{
    BaselineMode,
    Eic,
    Smoother,
};
pub use mass_cutoff::MassCutoff;
pub use peak::{
    Peak,
    QuantType,
};
pub use sample::{
    MemSample,
    SampleLike,
};
pub use scan::{
    EicKind,
    Scan,
};
pub use slice::Slice;
