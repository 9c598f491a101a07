// Re-export main structures
pub use crate::classifier::{
    EicClassifier,
    NoModel,
};
pub use crate::detector::Detector;
pub use crate::filters::{
    ChildFilterKind,
    GroupFiltering,
    PeakFiltering,
};
pub use crate::grouping::group_peaks;
pub use crate::metagroup::perform_meta_grouping;
pub use crate::models::{
    IntegrationType,
    PeakGroup,
};
pub use crate::params::EngineParams;
pub use crate::progress::{
    ProgressSink,
    RecordingProgress,
    SilentProgress,
};
pub use crate::slices::{
    sort_slices_by_intensity,
    SliceGenerator,
};

// Declare modules
pub mod classifier;
pub mod detector;
pub mod errors;
pub mod filters;
pub mod grouping;
pub mod metagroup;
pub mod models;
pub mod params;
pub mod progress;
pub mod slices;
pub mod utils;

// Re-export errors
pub use crate::errors::{
    DataProcessingError,
    PeakSeekError,
    Result,
};
