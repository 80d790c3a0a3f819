use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::concurrency::driver::{drive, drive_until_shutdown};
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};
use crate::destination::Destination;
use crate::error::{CloneError, CloneResult};
use crate::metrics::{
    DESTINATION_LABEL, ERROR_KIND_LABEL, FLOWCLONE_RECORDS_PROCESSED_TOTAL,
    FLOWCLONE_RUN_FAILURES_TOTAL, FLOWCLONE_RUNS_TOTAL, OUTCOME_FAILURE, OUTCOME_LABEL,
    OUTCOME_SUCCESS, SOURCE_LABEL,
};
use crate::progress::{NoopProgress, ProgressSink, ProgressUpdate};
use crate::source::Source;
use crate::tally::{Outcome, RunTally};
use crate::types::FlowLimit;

/// Copies every record of a [`Source`] into a [`Destination`].
///
/// Writes are dispatched through the bounded-concurrency driver, so at most [`FlowLimit`] writes
/// are unsettled at any instant. A failed write is counted in the [`RunTally`] and never aborts
/// the run. Both adapters are connected at the start of a run and closed before it returns, on
/// every path.
pub struct CloneOrchestrator<S, D> {
    source: S,
    destination: D,
    flow: FlowLimit,
    progress: Box<dyn ProgressSink + Send>,
}

impl<S, D> CloneOrchestrator<S, D>
where
    S: Source,
    D: Destination,
{
    pub fn new(source: S, destination: D, flow: FlowLimit) -> Self {
        Self {
            source,
            destination,
            flow,
            progress: Box::new(NoopProgress),
        }
    }

    /// Replaces the sink notified after every settled record.
    pub fn with_progress<P>(mut self, progress: P) -> Self
    where
        P: ProgressSink + Send + 'static,
    {
        self.progress = Box::new(progress);
        self
    }

    /// Runs the clone until the source is exhausted.
    ///
    /// Returns an error only when an adapter cannot be connected or the source fails while being
    /// read. In the latter case the records that settled before the failure were still reported
    /// to the progress sink.
    pub async fn run(&mut self) -> CloneResult<RunTally> {
        self.run_inner(None).await.map(ShutdownResult::into_inner)
    }

    /// Runs the clone until the source is exhausted or `shutdown_rx` is signaled.
    ///
    /// After the signal no further records are pulled, the writes in flight settle and
    /// [`ShutdownResult::Shutdown`] is returned with the partial tally.
    pub async fn run_until_shutdown(
        &mut self,
        shutdown_rx: ShutdownRx,
    ) -> CloneResult<ShutdownResult<RunTally, RunTally>> {
        self.run_inner(Some(shutdown_rx)).await
    }

    async fn run_inner(
        &mut self,
        shutdown_rx: Option<ShutdownRx>,
    ) -> CloneResult<ShutdownResult<RunTally, RunTally>> {
        info!(
            source = S::name(),
            destination = D::name(),
            flow = self.flow.get(),
            "starting clone run"
        );

        counter!(
            FLOWCLONE_RUNS_TOTAL,
            SOURCE_LABEL => S::name(),
            DESTINATION_LABEL => D::name(),
        )
        .increment(1);

        let result = self.connect_and_copy(shutdown_rx).await;
        if let Err(err) = &result {
            error!(error = %err, "clone run failed");

            counter!(
                FLOWCLONE_RUN_FAILURES_TOTAL,
                SOURCE_LABEL => S::name(),
                DESTINATION_LABEL => D::name(),
                ERROR_KIND_LABEL => format!("{:?}", err.kind()),
            )
            .increment(1);
        }

        result
    }

    async fn connect_and_copy(
        &mut self,
        shutdown_rx: Option<ShutdownRx>,
    ) -> CloneResult<ShutdownResult<RunTally, RunTally>> {
        self.source.connect().await?;

        if let Err(err) = self.destination.connect().await {
            if let Err(close_err) = self.source.close().await {
                return Err(vec![err, close_err].into());
            }

            return Err(err);
        }

        let result = self.copy(shutdown_rx).await;
        let release_errors = self.release().await;

        match result {
            Ok(tally) => {
                // The records are already written, so a failed release does not void the run.
                for err in release_errors {
                    warn!(error = %err, "failed to release an adapter after the clone run");
                }

                Ok(tally)
            }
            Err(err) if release_errors.is_empty() => Err(err),
            Err(err) => {
                let mut errors = vec![err];
                errors.extend(release_errors);

                Err(errors.into())
            }
        }
    }

    /// Closes both adapters, returning the errors of the ones that failed to close.
    async fn release(&mut self) -> Vec<CloneError> {
        let mut errors = Vec::new();

        if let Err(err) = self.source.close().await {
            errors.push(err);
        }

        if let Err(err) = self.destination.close().await {
            errors.push(err);
        }

        errors
    }

    async fn copy(
        &mut self,
        shutdown_rx: Option<ShutdownRx>,
    ) -> CloneResult<ShutdownResult<RunTally, RunTally>> {
        let total_estimate = match self.source.count_estimate().await {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(error = %err, "could not estimate the number of records to clone");
                None
            }
        };

        let stream = self.source.open_stream().await?;

        let mut tally = RunTally::new();
        let progress = &mut self.progress;
        let destination = &self.destination;

        progress.on_start(total_estimate);

        let handler =
            move |record| async move { Outcome::from(destination.write_record(record).await) };

        let on_settle = |outcome: Outcome| {
            tally.record(&outcome);

            let outcome_label = match &outcome {
                Outcome::Success => OUTCOME_SUCCESS,
                Outcome::Failure(err) => {
                    debug!(error = %err, "record could not be cloned");
                    OUTCOME_FAILURE
                }
            };

            counter!(
                FLOWCLONE_RECORDS_PROCESSED_TOTAL,
                SOURCE_LABEL => S::name(),
                DESTINATION_LABEL => D::name(),
                OUTCOME_LABEL => outcome_label,
            )
            .increment(1);

            progress.on_progress(&ProgressUpdate::from_tally(&tally, total_estimate));
        };

        let result = match shutdown_rx {
            Some(shutdown_rx) => {
                drive_until_shutdown(stream, self.flow, handler, on_settle, shutdown_rx).await
            }
            None => drive(stream, self.flow, handler, on_settle)
                .await
                .map(ShutdownResult::Ok),
        };

        self.progress
            .on_finish(&ProgressUpdate::from_tally(&tally, total_estimate));

        let (summary, interrupted) = match result? {
            ShutdownResult::Ok(summary) => (summary, false),
            ShutdownResult::Shutdown(summary) => (summary, true),
        };

        info!(
            processed = tally.processed(),
            succeeded = tally.succeeded(),
            errored = tally.errored(),
            peak_in_flight = summary.peak_in_flight,
            interrupted,
            "clone run finished"
        );

        if interrupted {
            Ok(ShutdownResult::Shutdown(tally))
        } else {
            Ok(ShutdownResult::Ok(tally))
        }
    }
}
