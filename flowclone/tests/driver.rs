#![cfg(feature = "test-utils")]

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use flowclone::concurrency::driver::{DriveSummary, drive};
use flowclone::error::{CloneResult, ErrorKind};
use flowclone::tally::{Outcome, RunTally};
use flowclone::types::FlowLimit;
use flowclone_telemetry::tracing::init_test_tracing;
use futures::{Stream, StreamExt, stream};

/// Returns a stream of `0..count` counting how many items were pulled from it.
fn counted_items(count: u64, pulled: Arc<AtomicU64>) -> impl Stream<Item = CloneResult<u64>> {
    stream::iter(0..count).map(move |item| {
        pulled.fetch_add(1, Ordering::SeqCst);
        Ok(item)
    })
}

/// Deterministic delay spreading the settle order of the items.
fn jitter(item: u64) -> Duration {
    Duration::from_millis((item * 7) % 5)
}

async fn run_with_flow(
    flow: usize,
    count: u64,
    pulled: Arc<AtomicU64>,
) -> CloneResult<DriveSummary> {
    let flow = FlowLimit::new(flow)?;

    drive(
        counted_items(count, pulled),
        flow,
        |item| async move {
            tokio::time::sleep(jitter(item)).await;
            Outcome::Success
        },
        |_| {},
    )
    .await
}

#[tokio::test]
async fn zero_flow_limit_fails_before_any_pull() {
    init_test_tracing();

    let pulled = Arc::new(AtomicU64::new(0));

    let err = run_with_flow(0, 10, pulled.clone()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert_eq!(pulled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_item_is_dispatched_exactly_once_for_any_flow_limit() {
    init_test_tracing();

    for flow in [1, 2, 3, 8, 64] {
        for count in [0, 1, 5, 33] {
            let pulled = Arc::new(AtomicU64::new(0));

            let summary = run_with_flow(flow, count, pulled.clone()).await.unwrap();

            assert_eq!(summary.dispatched, count, "flow {flow}, count {count}");
            assert_eq!(summary.settled, count, "flow {flow}, count {count}");
            assert_eq!(pulled.load(Ordering::SeqCst), count);
            assert!(summary.peak_in_flight <= flow);
        }
    }
}

#[tokio::test]
async fn in_flight_handlers_stay_within_the_flow_limit() {
    init_test_tracing();

    for flow in [1usize, 4, 10] {
        let in_flight = Cell::new(0usize);
        let observed_peak = Cell::new(0usize);

        let summary = drive(
            counted_items(60, Arc::new(AtomicU64::new(0))),
            FlowLimit::new(flow).unwrap(),
            |item| {
                let in_flight = &in_flight;
                let observed_peak = &observed_peak;
                async move {
                    in_flight.set(in_flight.get() + 1);
                    observed_peak.set(observed_peak.get().max(in_flight.get()));
                    tokio::time::sleep(jitter(item) + Duration::from_millis(1)).await;
                    in_flight.set(in_flight.get() - 1);
                    Outcome::Success
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        assert!(observed_peak.get() <= flow);
        assert_eq!(observed_peak.get(), summary.peak_in_flight);
        assert_eq!(in_flight.get(), 0);
    }
}

#[tokio::test]
async fn settle_callback_keeps_the_tally_consistent() {
    init_test_tracing();

    let mut tally = RunTally::new();
    let mut snapshots = Vec::new();

    let summary = drive(
        counted_items(50, Arc::new(AtomicU64::new(0))),
        FlowLimit::new(6).unwrap(),
        |item| async move {
            tokio::time::sleep(jitter(item)).await;
            if item % 4 == 0 {
                Outcome::Failure(flowclone::clone_error!(
                    ErrorKind::WriteError,
                    "Write failed"
                ))
            } else {
                Outcome::Success
            }
        },
        |outcome| {
            tally.record(&outcome);
            snapshots.push(tally);
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.settled, 50);
    assert_eq!(tally.processed(), 50);
    assert_eq!(tally.errored(), 13);
    assert_eq!(tally.succeeded(), 37);
    for (index, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.processed(), index as u64 + 1);
        assert_eq!(
            snapshot.processed(),
            snapshot.succeeded() + snapshot.errored()
        );
    }
}

#[tokio::test]
async fn source_error_stops_pulling() {
    init_test_tracing();

    let pulled = Arc::new(AtomicU64::new(0));
    let counter = pulled.clone();
    let source = stream::iter(0..10u64).map(move |item| {
        counter.fetch_add(1, Ordering::SeqCst);
        if item == 4 {
            Err(flowclone::clone_error!(
                ErrorKind::SourceReadError,
                "Source stream failed"
            ))
        } else {
            Ok(item)
        }
    });
    let mut settled = 0;

    let err = drive(
        source,
        FlowLimit::new(2).unwrap(),
        |item| async move {
            tokio::time::sleep(jitter(item)).await;
            Outcome::Success
        },
        |_| settled += 1,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceReadError);
    assert_eq!(settled, 4);
    assert_eq!(pulled.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn source_suspending_between_items_keeps_the_bound() {
    init_test_tracing();

    let pulled = Arc::new(AtomicU64::new(0));
    let source = counted_items(30, pulled.clone()).then(|item| async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        item
    });

    let mut tally = RunTally::new();

    let summary = drive(
        source,
        FlowLimit::new(4).unwrap(),
        |item| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;

            if item % 4 == 0 {
                Outcome::Failure(flowclone::clone_error!(
                    ErrorKind::WriteError,
                    "Write failed"
                ))
            } else {
                Outcome::Success
            }
        },
        |outcome| {
            tally.record(&outcome);
            assert_eq!(tally.processed(), tally.succeeded() + tally.errored());
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.dispatched, 30);
    assert_eq!(summary.settled, 30);
    assert!(summary.peak_in_flight <= 4);
    assert_eq!(pulled.load(Ordering::SeqCst), 30);
    assert_eq!(tally.processed(), 30);
    assert_eq!(tally.errored(), 8);
}
