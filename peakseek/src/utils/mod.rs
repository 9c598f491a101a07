pub mod correlation;
pub mod spectra;

pub use correlation::pearson_correlation;
pub use spectra::{
    collect_ms2_scans,
    spectral_match_score,
};
