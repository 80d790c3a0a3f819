use std::sync::{Arc, Mutex};

use crate::progress::{ProgressSink, ProgressUpdate};

#[derive(Debug, Default)]
struct Recorded {
    started: Option<Option<u64>>,
    updates: Vec<ProgressUpdate>,
    finished: Option<ProgressUpdate>,
}

/// Progress sink that keeps every update it receives.
///
/// Clones share the recorded updates, so a clone handed to an orchestrator can be inspected
/// through the one kept by the test.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total estimate given at start, or [`None`] if the run never started.
    pub fn started(&self) -> Option<Option<u64>> {
        self.recorded.lock().unwrap().started
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.recorded.lock().unwrap().updates.clone()
    }

    pub fn finished(&self) -> Option<ProgressUpdate> {
        self.recorded.lock().unwrap().finished
    }
}

impl ProgressSink for RecordingProgress {
    fn on_start(&mut self, total_estimate: Option<u64>) {
        self.recorded.lock().unwrap().started = Some(total_estimate);
    }

    fn on_progress(&mut self, update: &ProgressUpdate) {
        self.recorded.lock().unwrap().updates.push(*update);
    }

    fn on_finish(&mut self, update: &ProgressUpdate) {
        self.recorded.lock().unwrap().finished = Some(*update);
    }
}
