//! Testing utilities for clone runs.
//!
//! - [`test_destination_wrapper`] - destination wrapper injecting delays and failures while
//!   tracking concurrent writes
//! - [`test_source_wrapper`] - source wrapper injecting connection and read failures
//! - [`endless_source`] - source that never runs out of records
//! - [`progress`] - progress sink recording every update
//! - [`notify`] - async notification helpers with timeouts
//! - [`records`] - record builders
//! - `database` - throwaway Postgres databases, with the `test-utils` feature

#[cfg(feature = "test-utils")]
pub mod database;
pub mod endless_source;
pub mod notify;
pub mod progress;
pub mod records;
pub mod test_destination_wrapper;
pub mod test_source_wrapper;
