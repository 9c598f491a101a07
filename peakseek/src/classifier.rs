use eicquery::Eic;

/// Capability interface for an optional peak-quality model.
///
/// When a model is loaded the detector hands it every freshly pulled
/// EIC so peak qualities can be overwritten with model scores; without
/// one, the shape-based quality from peak detection stands.
pub trait EicClassifier: Send + Sync {
    fn has_model(&self) -> bool;

    fn score_eics(&self, eics: &mut [Eic]);
}

/// The no-classifier default: scoring is silently skipped.
#[derive(Debug, Default)]
pub struct NoModel;

impl EicClassifier for NoModel {
    fn has_model(&self) -> bool {
        false
    }

    fn score_eics(&self, _eics: &mut [Eic]) {}
}
