use std::future::Future;

use futures::stream::BoxStream;

use crate::error::CloneResult;
use crate::types::Record;

/// Lazy, forward-only sequence of records produced by a [`Source`].
///
/// An item is an error when the source failed to produce the next record. The stream does not
/// borrow its source, so it can be polled while the source stays available for other calls.
pub type RecordStream = BoxStream<'static, CloneResult<Record>>;

/// Trait for systems that records can be copied from.
///
/// A source is connected once per run with [`Source::connect`] and always released with
/// [`Source::close`], also when the run fails.
pub trait Source {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Opens the connection used by the other methods.
    fn connect(&mut self) -> impl Future<Output = CloneResult<()>> + Send;

    /// Returns how many records [`Source::open_stream`] is expected to produce.
    ///
    /// The value is only used for progress reporting, so it may be approximate.
    fn count_estimate(&self) -> impl Future<Output = CloneResult<u64>> + Send;

    /// Opens the lazy sequence of records to copy.
    fn open_stream(&self) -> impl Future<Output = CloneResult<RecordStream>> + Send;

    /// Releases the connection. Calling it on a source that is not connected is a no-op.
    fn close(&mut self) -> impl Future<Output = CloneResult<()>> + Send;
}
