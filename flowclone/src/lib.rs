//! Copies records from a source to a destination with bounded concurrency.
//!
//! The [`orchestrator::CloneOrchestrator`] pulls records from a [`source::Source`] and writes
//! them to a [`destination::Destination`], keeping at most [`types::FlowLimit`] writes in flight.
//! Per-record failures are counted in a [`tally::RunTally`] instead of aborting the run.

pub mod concurrency;
pub mod destination;
pub mod error;
mod macros;
pub mod metrics;
pub mod orchestrator;
pub mod postgres;
pub mod progress;
pub mod source;
pub mod tally;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
