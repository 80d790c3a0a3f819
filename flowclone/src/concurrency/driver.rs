//! Bounded-concurrency stream driver.
//!
//! The driver pulls items one at a time from a [`Stream`], starts an asynchronous handler for each
//! of them and keeps at most [`FlowLimit`] handlers unsettled at any instant. All handlers are
//! polled from the task that awaits the driver, so no handler ever runs in parallel with another
//! and the settle callback can mutate state without synchronization.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::pin;

use futures::stream::FuturesUnordered;
use futures::{FutureExt, Stream, StreamExt};
use tracing::{debug, warn};

use crate::clone_error;
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx, shutdown_signaled};
use crate::error::{CloneResult, ErrorKind};
use crate::tally::Outcome;
use crate::types::FlowLimit;

/// Counters describing how a driver run went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSummary {
    /// Number of items pulled from the source and handed to the handler.
    pub dispatched: u64,
    /// Number of handler invocations that settled.
    pub settled: u64,
    /// Highest number of unsettled handlers observed at once.
    pub peak_in_flight: usize,
}

/// Drives `source` to exhaustion, invoking `handler` on every item with at most `flow` handlers
/// in flight.
///
/// `on_settle` receives the [`Outcome`] of every handler, in settle order. A handler that panics
/// settles as [`Outcome::Failure`] with [`ErrorKind::HandlerPanic`].
///
/// Resolves once the source is exhausted and every dispatched handler settled. If the source
/// yields an error, no further items are pulled, the in-flight handlers are awaited and their
/// outcomes delivered, and then the source error is returned.
pub async fn drive<S, T, H, Fut, C>(
    source: S,
    flow: FlowLimit,
    handler: H,
    on_settle: C,
) -> CloneResult<DriveSummary>
where
    S: Stream<Item = CloneResult<T>>,
    H: FnMut(T) -> Fut,
    Fut: Future<Output = Outcome>,
    C: FnMut(Outcome),
{
    drive_inner(source, flow, handler, on_settle, None)
        .await
        .map(ShutdownResult::into_inner)
}

/// Same as [`drive`], but stops pulling from the source once `shutdown_rx` is signaled.
///
/// Handlers dispatched before the signal are still awaited. Returns
/// [`ShutdownResult::Shutdown`] when the signal arrived before the source was exhausted.
pub async fn drive_until_shutdown<S, T, H, Fut, C>(
    source: S,
    flow: FlowLimit,
    handler: H,
    on_settle: C,
    shutdown_rx: ShutdownRx,
) -> CloneResult<ShutdownResult<DriveSummary, DriveSummary>>
where
    S: Stream<Item = CloneResult<T>>,
    H: FnMut(T) -> Fut,
    Fut: Future<Output = Outcome>,
    C: FnMut(Outcome),
{
    drive_inner(source, flow, handler, on_settle, Some(shutdown_rx)).await
}

async fn drive_inner<S, T, H, Fut, C>(
    source: S,
    flow: FlowLimit,
    mut handler: H,
    mut on_settle: C,
    mut shutdown_rx: Option<ShutdownRx>,
) -> CloneResult<ShutdownResult<DriveSummary, DriveSummary>>
where
    S: Stream<Item = CloneResult<T>>,
    H: FnMut(T) -> Fut,
    Fut: Future<Output = Outcome>,
    C: FnMut(Outcome),
{
    let mut source = pin!(source);
    let mut in_flight = FuturesUnordered::new();
    let mut summary = DriveSummary::default();

    let mut source_done = false;
    let mut interrupted = false;
    let mut source_error = None;

    debug!(flow = flow.get(), "starting bounded concurrency driver");

    loop {
        let can_pull = !source_done && in_flight.len() < flow.get();
        if !can_pull && in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            _ = shutdown_signaled(&mut shutdown_rx), if !source_done => {
                debug!(
                    in_flight = in_flight.len(),
                    "shutdown signaled, no more items will be pulled"
                );

                source_done = true;
                interrupted = true;
            }

            Some(result) = in_flight.next(), if !in_flight.is_empty() => {
                summary.settled += 1;
                on_settle(into_outcome(result));
            }

            item = source.next(), if can_pull => match item {
                Some(Ok(item)) => {
                    in_flight.push(AssertUnwindSafe(handler(item)).catch_unwind());
                    summary.dispatched += 1;
                    summary.peak_in_flight = summary.peak_in_flight.max(in_flight.len());
                }
                Some(Err(err)) => {
                    warn!(
                        error = %err,
                        in_flight = in_flight.len(),
                        "source failed while pulling items, waiting for in-flight items to settle"
                    );

                    source_done = true;
                    source_error = Some(err);
                }
                None => {
                    debug!(dispatched = summary.dispatched, "source exhausted");

                    source_done = true;
                }
            },
        }
    }

    debug!(
        dispatched = summary.dispatched,
        settled = summary.settled,
        peak_in_flight = summary.peak_in_flight,
        "bounded concurrency driver finished"
    );

    if let Some(err) = source_error {
        return Err(err);
    }

    if interrupted {
        return Ok(ShutdownResult::Shutdown(summary));
    }

    Ok(ShutdownResult::Ok(summary))
}

/// Converts the result of a handler future guarded by `catch_unwind` into an [`Outcome`].
fn into_outcome(result: Result<Outcome, Box<dyn Any + Send>>) -> Outcome {
    match result {
        Ok(outcome) => outcome,
        Err(panic) => Outcome::Failure(clone_error!(
            ErrorKind::HandlerPanic,
            "Record handler panicked",
            panic_message(panic.as_ref())
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }

    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }

    "unknown panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::error::CloneError;

    fn items(count: u64) -> impl Stream<Item = CloneResult<u64>> {
        stream::iter((0..count).map(Ok))
    }

    #[tokio::test]
    async fn every_item_is_dispatched_and_settled_once() {
        let mut outcomes = Vec::new();

        let summary = drive(
            items(25),
            FlowLimit::new(4).unwrap(),
            |item| async move {
                tokio::time::sleep(Duration::from_millis(item % 3)).await;
                Outcome::Success
            },
            |outcome| outcomes.push(outcome),
        )
        .await
        .unwrap();

        assert_eq!(summary.dispatched, 25);
        assert_eq!(summary.settled, 25);
        assert_eq!(outcomes.len(), 25);
        assert!(summary.peak_in_flight <= 4);
    }

    #[tokio::test]
    async fn in_flight_handlers_never_exceed_the_flow_limit() {
        let in_flight = Cell::new(0usize);
        let peak = Cell::new(0usize);

        let summary = drive(
            items(50),
            FlowLimit::new(3).unwrap(),
            |_| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    in_flight.set(in_flight.get() + 1);
                    peak.set(peak.get().max(in_flight.get()));
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_flight.set(in_flight.get() - 1);
                    Outcome::Success
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(peak.get(), 3);
        assert_eq!(summary.peak_in_flight, 3);
        assert_eq!(in_flight.get(), 0);
    }

    #[tokio::test]
    async fn empty_source_resolves_without_dispatching() {
        let mut settled = 0;

        let summary = drive(
            items(0),
            FlowLimit::new(1).unwrap(),
            |_| async { Outcome::Success },
            |_| settled += 1,
        )
        .await
        .unwrap();

        assert_eq!(summary, DriveSummary::default());
        assert_eq!(settled, 0);
    }

    #[tokio::test]
    async fn handler_panic_settles_as_failure() {
        let mut outcomes = Vec::new();

        let summary = drive(
            items(3),
            FlowLimit::new(2).unwrap(),
            |item| async move {
                if item == 1 {
                    panic!("boom");
                }
                Outcome::Success
            },
            |outcome| outcomes.push(outcome),
        )
        .await
        .unwrap();

        assert_eq!(summary.settled, 3);
        let failures: Vec<_> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                Outcome::Failure(err) => Some(err),
                Outcome::Success => None,
            })
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), ErrorKind::HandlerPanic);
        assert_eq!(failures[0].detail(), Some("boom"));
    }

    #[tokio::test]
    async fn source_error_is_returned_after_in_flight_items_settle() {
        let source = stream::iter(vec![
            Ok(1u64),
            Ok(2),
            Err(clone_error!(ErrorKind::SourceReadError, "Source stream failed")),
            Ok(3),
        ]);
        let mut settled = 0;

        let err: CloneError = drive(
            source,
            FlowLimit::new(10).unwrap(),
            |_| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Outcome::Success
            },
            |_| settled += 1,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceReadError);
        assert_eq!(settled, 2);
    }

    #[tokio::test]
    async fn shutdown_before_start_pulls_nothing() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        shutdown_tx.shutdown();

        let result = drive_until_shutdown(
            items(10),
            FlowLimit::new(2).unwrap(),
            |_| async { Outcome::Success },
            |_| {},
            shutdown_rx,
        )
        .await
        .unwrap();

        assert_eq!(result, ShutdownResult::Shutdown(DriveSummary::default()));
    }

    #[tokio::test]
    async fn shutdown_without_signal_completes_normally() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let result = drive_until_shutdown(
            items(5),
            FlowLimit::new(2).unwrap(),
            |_| async { Outcome::Success },
            |_| {},
            shutdown_rx,
        )
        .await
        .unwrap();

        assert!(matches!(
            result,
            ShutdownResult::Ok(DriveSummary {
                dispatched: 5,
                settled: 5,
                ..
            })
        ));
    }
}
