//! Concurrency primitives used to drive a clone run.
//!
//! The [`driver`] module implements the bounded-concurrency loop that pulls records from a source
//! stream and keeps at most a fixed number of handlers in flight. The [`shutdown`] module provides
//! the watch-based signal used to stop a run early while letting in-flight work settle.

pub mod driver;
pub mod shutdown;
