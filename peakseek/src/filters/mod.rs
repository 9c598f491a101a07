pub mod group_filtering;
pub mod peak_filtering;

pub use group_filtering::{
    ChildFilterKind,
    GroupFiltering,
};
pub use peak_filtering::PeakFiltering;
