pub mod peak_group;

pub use peak_group::{
    IntegrationType,
    PeakGroup,
};
