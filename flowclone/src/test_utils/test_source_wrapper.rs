use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{StreamExt, stream};

use crate::clone_error;
use crate::error::{CloneResult, ErrorKind};
use crate::source::{RecordStream, Source};

#[derive(Debug, Clone, Default)]
struct Behavior {
    failing_connect: bool,
    failing_count: bool,
    read_error_after: Option<u64>,
    item_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Counters {
    connect_calls: AtomicU64,
    close_calls: AtomicU64,
    items_pulled: AtomicU64,
}

/// Test wrapper for [`Source`] implementations that injects failures and tracks calls.
///
/// Clones share their counters.
#[derive(Debug, Clone)]
pub struct TestSourceWrapper<S> {
    wrapped_source: S,
    behavior: Behavior,
    counters: Arc<Counters>,
}

impl<S> TestSourceWrapper<S> {
    /// Wraps `source` without altering its behavior.
    pub fn wrap(source: S) -> Self {
        Self {
            wrapped_source: source,
            behavior: Behavior::default(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Fails [`Source::connect`] with [`ErrorKind::SourceConnectionFailed`].
    pub fn with_failing_connect(mut self) -> Self {
        self.behavior.failing_connect = true;
        self
    }

    /// Fails [`Source::count_estimate`] with [`ErrorKind::SourceQueryFailed`].
    pub fn with_failing_count(mut self) -> Self {
        self.behavior.failing_count = true;
        self
    }

    /// Ends the stream with a [`ErrorKind::SourceReadError`] after `count` records.
    pub fn with_read_error_after(mut self, count: u64) -> Self {
        self.behavior.read_error_after = Some(count);
        self
    }

    /// Delays every item of the stream by `delay`.
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.behavior.item_delay = Some(delay);
        self
    }

    pub fn connect_calls(&self) -> u64 {
        self.counters.connect_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u64 {
        self.counters.close_calls.load(Ordering::SeqCst)
    }

    /// Returns how many stream items, records or errors, were pulled by the consumer.
    pub fn items_pulled(&self) -> u64 {
        self.counters.items_pulled.load(Ordering::SeqCst)
    }

    /// Returns the wrapped source.
    pub fn wrapped(&self) -> &S {
        &self.wrapped_source
    }
}

impl<S> Source for TestSourceWrapper<S>
where
    S: Source + Send + Sync,
{
    fn name() -> &'static str {
        S::name()
    }

    async fn connect(&mut self) -> CloneResult<()> {
        self.counters.connect_calls.fetch_add(1, Ordering::SeqCst);

        if self.behavior.failing_connect {
            return Err(clone_error!(
                ErrorKind::SourceConnectionFailed,
                "Injected source connection failure"
            ));
        }

        self.wrapped_source.connect().await
    }

    async fn count_estimate(&self) -> CloneResult<u64> {
        if self.behavior.failing_count {
            return Err(clone_error!(
                ErrorKind::SourceQueryFailed,
                "Injected count failure"
            ));
        }

        self.wrapped_source.count_estimate().await
    }

    async fn open_stream(&self) -> CloneResult<RecordStream> {
        let mut records = self.wrapped_source.open_stream().await?;

        if let Some(count) = self.behavior.read_error_after {
            let error = stream::once(async move {
                Err(clone_error!(
                    ErrorKind::SourceReadError,
                    "Injected source read failure",
                    format!("failed after {count} records")
                ))
            });
            records = records.take(count as usize).chain(error).boxed();
        }

        if let Some(delay) = self.behavior.item_delay {
            records = records
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed();
        }

        let counters = self.counters.clone();
        let records = records.inspect(move |_| {
            counters.items_pulled.fetch_add(1, Ordering::SeqCst);
        });

        Ok(records.boxed())
    }

    async fn close(&mut self) -> CloneResult<()> {
        self.counters.close_calls.fetch_add(1, Ordering::SeqCst);

        self.wrapped_source.close().await
    }
}
