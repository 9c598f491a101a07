use std::sync::Mutex;

/// Sink for detection progress, called only from the orchestrating
/// thread. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, text: &str, completed: usize, total: usize);
}

/// Default sink: drops everything.
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn progress(&self, _text: &str, _completed: usize, _total: usize) {}
}

/// Records every emission; used by tests and interactive frontends.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(String, usize, usize)>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<(String, usize, usize)> {
        self.events.lock().expect("progress sink poisoned").clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn progress(&self, text: &str, completed: usize, total: usize) {
        self.events
            .lock()
            .expect("progress sink poisoned")
            .push((text.to_string(), completed, total));
    }
}
