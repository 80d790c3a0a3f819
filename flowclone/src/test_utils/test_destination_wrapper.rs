use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::clone_error;
use crate::destination::Destination;
use crate::error::{CloneResult, ErrorKind};
use crate::test_utils::notify::TimedNotify;
use crate::test_utils::records::record_id;
use crate::types::Record;

type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;
type WritesCondition = Box<dyn Fn(&WriteStats) -> bool + Send + Sync>;

/// Counters of the calls made on a [`TestDestinationWrapper`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub connect_calls: u64,
    pub close_calls: u64,
    /// Writes that were started, including the ones still in flight.
    pub writes_started: u64,
    pub successful_writes: u64,
    pub failed_writes: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

struct Inner {
    stats: WriteStats,
    conditions: Vec<(WritesCondition, Arc<Notify>)>,
}

impl Inner {
    fn check_conditions(&mut self) {
        let stats = self.stats;
        self.conditions.retain(|(condition, notify)| {
            let should_retain = !condition(&stats);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

#[derive(Clone, Default)]
struct Behavior {
    write_delay: Option<Duration>,
    failing_writes: Option<RecordPredicate>,
    panicking_writes: Option<RecordPredicate>,
    failing_connect: bool,
}

/// Test wrapper for [`Destination`] implementations that tracks all operations.
///
/// The wrapper can slow down writes, fail or panic on selected records and refuse to connect.
/// It records how many writes were in flight at once, which makes the flow limit observable.
/// Clones share their counters.
#[derive(Clone)]
pub struct TestDestinationWrapper<D> {
    wrapped_destination: D,
    behavior: Behavior,
    inner: Arc<Mutex<Inner>>,
}

impl<D: fmt::Debug> fmt::Debug for TestDestinationWrapper<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDestinationWrapper")
            .field("wrapped_destination", &self.wrapped_destination)
            .field("write_delay", &self.behavior.write_delay)
            .field("failing_connect", &self.behavior.failing_connect)
            .finish()
    }
}

impl<D> TestDestinationWrapper<D> {
    /// Wraps `destination` without altering its behavior.
    pub fn wrap(destination: D) -> Self {
        let inner = Inner {
            stats: WriteStats::default(),
            conditions: Vec::new(),
        };

        Self {
            wrapped_destination: destination,
            behavior: Behavior::default(),
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Delays every write by `delay` before it reaches the wrapped destination.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.behavior.write_delay = Some(delay);
        self
    }

    /// Fails the write of every record matching `predicate` with [`ErrorKind::WriteError`].
    pub fn with_failing_writes<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.behavior.failing_writes = Some(Arc::new(predicate));
        self
    }

    /// Fails the write of the records whose `id` is listed in `ids`.
    pub fn with_failing_ids(self, ids: Vec<u64>) -> Self {
        self.with_failing_writes(move |record| {
            record_id(record).is_some_and(|id| ids.contains(&id))
        })
    }

    /// Panics while writing every record matching `predicate`.
    pub fn with_panicking_writes<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.behavior.panicking_writes = Some(Arc::new(predicate));
        self
    }

    /// Fails [`Destination::connect`] with [`ErrorKind::DestinationConnectionFailed`].
    pub fn with_failing_connect(mut self) -> Self {
        self.behavior.failing_connect = true;
        self
    }

    /// Returns the wrapped destination.
    pub fn wrapped(&self) -> &D {
        &self.wrapped_destination
    }

    pub async fn stats(&self) -> WriteStats {
        self.inner.lock().await.stats
    }

    /// Registers a notification fired once `writes_started` reaches `count`.
    pub async fn notify_on_writes_started(&self, count: u64) -> TimedNotify {
        self.notify_on(move |stats| stats.writes_started >= count)
            .await
    }

    /// Registers a notification fired once `condition` holds for the write counters.
    pub async fn notify_on<F>(&self, condition: F) -> TimedNotify
    where
        F: Fn(&WriteStats) -> bool + Send + Sync + 'static,
    {
        let notify = Arc::new(Notify::new());

        let mut inner = self.inner.lock().await;
        inner.conditions.push((Box::new(condition), notify.clone()));
        inner.check_conditions();

        TimedNotify::new(notify)
    }
}

impl<D> Destination for TestDestinationWrapper<D>
where
    D: Destination + Send + Sync,
{
    fn name() -> &'static str {
        D::name()
    }

    async fn connect(&mut self) -> CloneResult<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.stats.connect_calls += 1;
            inner.check_conditions();
        }

        if self.behavior.failing_connect {
            return Err(clone_error!(
                ErrorKind::DestinationConnectionFailed,
                "Injected destination connection failure"
            ));
        }

        self.wrapped_destination.connect().await
    }

    async fn write_record(&self, record: Record) -> CloneResult<()> {
        if let Some(panicking_writes) = &self.behavior.panicking_writes
            && panicking_writes(&record)
        {
            panic!("injected panic while writing {}", record.value());
        }

        {
            let mut inner = self.inner.lock().await;
            inner.stats.writes_started += 1;
            inner.stats.in_flight += 1;
            inner.stats.peak_in_flight = inner.stats.peak_in_flight.max(inner.stats.in_flight);
            inner.check_conditions();
        }

        if let Some(delay) = self.behavior.write_delay {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .behavior
            .failing_writes
            .as_ref()
            .is_some_and(|failing_writes| failing_writes(&record));

        let result = if should_fail {
            Err(clone_error!(
                ErrorKind::WriteError,
                "Injected write failure",
                record.value()
            ))
        } else {
            self.wrapped_destination.write_record(record).await
        };

        {
            let mut inner = self.inner.lock().await;
            inner.stats.in_flight -= 1;
            if result.is_ok() {
                inner.stats.successful_writes += 1;
            } else {
                inner.stats.failed_writes += 1;
            }
            inner.check_conditions();
        }

        result
    }

    async fn close(&mut self) -> CloneResult<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.stats.close_calls += 1;
            inner.check_conditions();
        }

        self.wrapped_destination.close().await
    }
}
