use std::future::Future;

use crate::error::CloneResult;
use crate::types::Record;

/// Trait for systems that records can be copied to.
///
/// [`Destination::write_record`] takes `&self` because the orchestrator keeps several writes in
/// flight at once. Implementations must accept concurrent writes and should not assume any
/// ordering between them.
///
/// A destination is connected once per run with [`Destination::connect`] and always released with
/// [`Destination::close`], also when the run fails.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Opens the connection used by [`Destination::write_record`].
    fn connect(&mut self) -> impl Future<Output = CloneResult<()>> + Send;

    /// Writes a single record.
    ///
    /// A failure is reported with [`crate::error::ErrorKind::WriteError`] and only affects this
    /// record.
    fn write_record(&self, record: Record) -> impl Future<Output = CloneResult<()>> + Send;

    /// Releases the connection. Calling it on a destination that is not connected is a no-op.
    fn close(&mut self) -> impl Future<Output = CloneResult<()>> + Send;
}
