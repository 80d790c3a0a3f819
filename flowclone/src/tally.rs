use crate::error::CloneError;

/// Result of handling one record.
///
/// Every dispatched record produces exactly one [`Outcome`].
#[derive(Debug, Clone)]
pub enum Outcome {
    Success,
    Failure(CloneError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl<T> From<Result<T, CloneError>> for Outcome {
    fn from(result: Result<T, CloneError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(err) => Outcome::Failure(err),
        }
    }
}

/// Counters of a single clone run.
///
/// `processed` always equals `succeeded + errored` since the counters are only ever changed
/// together by [`RunTally::record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    processed: u64,
    succeeded: u64,
    errored: u64,
}

impl RunTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one settled record.
    pub fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::Failure(_) => self.errored += 1,
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded
    }

    pub fn errored(&self) -> u64 {
        self.errored
    }
}
