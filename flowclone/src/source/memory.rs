use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{CloneResult, ErrorKind};
use crate::source::{RecordStream, Source};
use crate::types::{AdapterState, Record};

#[derive(Debug)]
struct Inner {
    records: Vec<Record>,
    state: AdapterState,
}

/// In-memory source for testing and dry runs.
///
/// Every stream opened from a [`MemorySource`] yields a snapshot of the records held at the time
/// the stream was opened.
#[derive(Debug, Clone)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        let inner = Inner {
            records,
            state: AdapterState::Created,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the lifecycle state of the source.
    pub async fn state(&self) -> AdapterState {
        self.inner.lock().await.state
    }
}

impl Source for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn connect(&mut self) -> CloneResult<()> {
        let mut inner = self.inner.lock().await;
        inner.state = AdapterState::Connected;

        info!(records = inner.records.len(), "connected to memory source");

        Ok(())
    }

    async fn count_estimate(&self) -> CloneResult<u64> {
        let inner = self.inner.lock().await;
        if inner.state != AdapterState::Connected {
            bail!(ErrorKind::InvalidState, "Memory source is not connected");
        }

        Ok(inner.records.len() as u64)
    }

    async fn open_stream(&self) -> CloneResult<RecordStream> {
        let inner = self.inner.lock().await;
        if inner.state != AdapterState::Connected {
            bail!(ErrorKind::InvalidState, "Memory source is not connected");
        }

        let records = inner.records.clone();

        Ok(stream::iter(records.into_iter().map(Ok)).boxed())
    }

    async fn close(&mut self) -> CloneResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == AdapterState::Connected {
            inner.state = AdapterState::Closed;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn stream_yields_every_record_in_order() {
        let mut source = MemorySource::new(vec![
            Record::new(json!({"id": 1})),
            Record::new(json!({"id": 2})),
        ]);
        source.connect().await.unwrap();

        assert_eq!(source.count_estimate().await.unwrap(), 2);
        let records: Vec<Record> = source
            .open_stream()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(records[0].value()["id"], 1);
        assert_eq!(records[1].value()["id"], 2);
    }

    #[tokio::test]
    async fn reading_requires_a_connection() {
        let mut source = MemorySource::new(vec![]);

        assert!(source.open_stream().await.is_err());

        source.connect().await.unwrap();
        source.close().await.unwrap();

        assert_eq!(source.state().await, AdapterState::Closed);
        let err = source.count_estimate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
