//! Progress reporting for clone runs.
//!
//! A [`ProgressSink`] is called synchronously from the driver loop after every settled record, so
//! implementations must return quickly and never block.

use std::time::{Duration, Instant};

use tracing::info;

use crate::tally::RunTally;

/// Snapshot of a run handed to a [`ProgressSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub processed: u64,
    pub succeeded: u64,
    pub errored: u64,
    /// Number of records the source expected to produce, when it could tell.
    pub total_estimate: Option<u64>,
}

impl ProgressUpdate {
    pub fn from_tally(tally: &RunTally, total_estimate: Option<u64>) -> Self {
        Self {
            processed: tally.processed(),
            succeeded: tally.succeeded(),
            errored: tally.errored(),
            total_estimate,
        }
    }

    /// Returns the completed share of the run in percent, capped at 100.
    ///
    /// The estimate is never re-validated, so the source may produce more records than it
    /// announced.
    pub fn percent(&self) -> Option<f64> {
        match self.total_estimate {
            Some(0) | None => None,
            Some(total) => Some((self.processed as f64 / total as f64 * 100.0).min(100.0)),
        }
    }
}

/// Receives progress of a clone run.
pub trait ProgressSink {
    /// Called once before the first record is pulled.
    fn on_start(&mut self, _total_estimate: Option<u64>) {}

    /// Called after every settled record.
    fn on_progress(&mut self, update: &ProgressUpdate);

    /// Called once after the last record settled, including when the run was interrupted or
    /// failed while reading the source.
    fn on_finish(&mut self, _update: &ProgressUpdate) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressUpdate),
{
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Sink that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&mut self, _update: &ProgressUpdate) {}
}

/// Sink that reports progress as log lines, at most once per `interval`.
#[derive(Debug)]
pub struct TracingProgress {
    interval: Duration,
    started_at: Instant,
    last_report: Option<Instant>,
}

impl TracingProgress {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started_at: Instant::now(),
            last_report: None,
        }
    }

    fn report(&self, update: &ProgressUpdate, now: Instant) {
        let elapsed = now.duration_since(self.started_at);

        info!(
            processed = update.processed,
            total = update.total_estimate,
            percent = update.percent(),
            eta_secs = estimate_remaining(update, elapsed).map(|eta| eta.as_secs()),
            succeeded = update.succeeded,
            errored = update.errored,
            "clone progress"
        );
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl ProgressSink for TracingProgress {
    fn on_start(&mut self, total_estimate: Option<u64>) {
        self.started_at = Instant::now();
        self.last_report = None;

        info!(total = total_estimate, "clone started");
    }

    fn on_progress(&mut self, update: &ProgressUpdate) {
        let now = Instant::now();
        let due = self
            .last_report
            .is_none_or(|last_report| now.duration_since(last_report) >= self.interval);

        if due {
            self.report(update, now);
            self.last_report = Some(now);
        }
    }

    fn on_finish(&mut self, update: &ProgressUpdate) {
        let elapsed = self.started_at.elapsed();

        info!(
            processed = update.processed,
            succeeded = update.succeeded,
            errored = update.errored,
            elapsed_ms = elapsed.as_millis() as u64,
            "clone finished"
        );
    }
}

/// Extrapolates the remaining time from the average time spent per processed record.
///
/// Returns [`None`] when the extrapolation does not fit in a [`Duration`], which happens with
/// inflated estimates such as the ones of unbounded sources.
fn estimate_remaining(update: &ProgressUpdate, elapsed: Duration) -> Option<Duration> {
    let total = update.total_estimate?;
    if update.processed == 0 {
        return None;
    }

    let remaining = total.saturating_sub(update.processed);
    let per_record = elapsed.as_secs_f64() / update.processed as f64;

    Duration::try_from_secs_f64(per_record * remaining as f64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(processed: u64, total_estimate: Option<u64>) -> ProgressUpdate {
        ProgressUpdate {
            processed,
            succeeded: processed,
            errored: 0,
            total_estimate,
        }
    }

    #[test]
    fn percent_needs_a_positive_estimate() {
        assert_eq!(update(5, None).percent(), None);
        assert_eq!(update(5, Some(0)).percent(), None);
        assert_eq!(update(5, Some(20)).percent(), Some(25.0));
        assert_eq!(update(30, Some(20)).percent(), Some(100.0));
    }

    #[test]
    fn remaining_time_is_extrapolated() {
        let eta = estimate_remaining(&update(10, Some(30)), Duration::from_secs(5));

        assert_eq!(eta, Some(Duration::from_secs(10)));
        assert_eq!(
            estimate_remaining(&update(0, Some(30)), Duration::from_secs(5)),
            None
        );
        assert_eq!(
            estimate_remaining(&update(40, Some(30)), Duration::from_secs(5)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn remaining_time_is_unknown_when_it_overflows() {
        let huge_total = update(1, Some(u64::MAX));

        assert_eq!(estimate_remaining(&huge_total, Duration::from_secs(2)), None);

        // Fields of a log line are only evaluated when a subscriber listens.
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        let mut progress = TracingProgress::new(Duration::ZERO);
        tracing::subscriber::with_default(subscriber, || {
            progress.on_start(Some(u64::MAX));
            progress.started_at = Instant::now()
                .checked_sub(Duration::from_secs(3))
                .unwrap();
            progress.on_progress(&huge_total);
        });

        assert!(progress.last_report.is_some());
    }

    #[test]
    fn closures_are_progress_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |update: &ProgressUpdate| seen.push(update.processed);
            sink.on_start(Some(2));
            sink.on_progress(&update(1, Some(2)));
            sink.on_progress(&update(2, Some(2)));
            sink.on_finish(&update(2, Some(2)));
        }

        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn tracing_progress_throttles_reports() {
        let mut progress = TracingProgress::new(Duration::from_secs(3600));
        progress.on_start(Some(3));

        progress.on_progress(&update(1, Some(3)));
        let first_report = progress.last_report;
        progress.on_progress(&update(2, Some(3)));

        assert!(first_report.is_some());
        assert_eq!(progress.last_report, first_report);
    }
}
