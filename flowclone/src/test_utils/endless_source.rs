use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{StreamExt, stream};

use crate::error::CloneResult;
use crate::source::{RecordStream, Source};
use crate::test_utils::records::record;

/// Source producing records `0, 1, 2, ...` until the consumer stops pulling.
///
/// [`Source::count_estimate`] reports [`u64::MAX`].
#[derive(Debug, Clone, Default)]
pub struct EndlessSource {
    closed: Arc<AtomicBool>,
}

impl EndlessSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Source for EndlessSource {
    fn name() -> &'static str {
        "endless"
    }

    async fn connect(&mut self) -> CloneResult<()> {
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn count_estimate(&self) -> CloneResult<u64> {
        Ok(u64::MAX)
    }

    async fn open_stream(&self) -> CloneResult<RecordStream> {
        Ok(stream::iter(0..).map(|id| Ok(record(id))).boxed())
    }

    async fn close(&mut self) -> CloneResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
