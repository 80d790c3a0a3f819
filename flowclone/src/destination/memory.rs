use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::destination::Destination;
use crate::error::{CloneResult, ErrorKind};
use crate::types::{AdapterState, Record};

#[derive(Debug)]
struct Inner {
    records: Vec<Record>,
    state: AdapterState,
}

/// In-memory destination for testing and dry runs.
///
/// [`MemoryDestination`] keeps every written record in memory. Clones share the same storage, so
/// a clone kept by the caller can inspect what a run wrote.
#[derive(Debug, Clone)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates a new empty memory destination.
    pub fn new() -> Self {
        let inner = Inner {
            records: Vec::new(),
            state: AdapterState::Created,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns a copy of all records written so far, in write order.
    pub async fn records(&self) -> Vec<Record> {
        self.inner.lock().await.records.clone()
    }

    /// Returns the lifecycle state of the destination.
    pub async fn state(&self) -> AdapterState {
        self.inner.lock().await.state
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn connect(&mut self) -> CloneResult<()> {
        let mut inner = self.inner.lock().await;
        inner.state = AdapterState::Connected;

        info!("connected to memory destination");

        Ok(())
    }

    async fn write_record(&self, record: Record) -> CloneResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != AdapterState::Connected {
            bail!(
                ErrorKind::WriteError,
                "Memory destination is not connected",
                format!("state is {:?}", inner.state)
            );
        }

        inner.records.push(record);

        Ok(())
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
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn written_records_are_visible_through_clones() {
        let mut destination = MemoryDestination::new();
        let observer = destination.clone();

        destination.connect().await.unwrap();
        destination
            .write_record(Record::new(json!({"id": 1})))
            .await
            .unwrap();
        destination.close().await.unwrap();

        assert_eq!(observer.records().await, vec![Record::new(json!({"id": 1}))]);
        assert_eq!(observer.state().await, AdapterState::Closed);
    }

    #[tokio::test]
    async fn writes_fail_when_not_connected() {
        let destination = MemoryDestination::new();

        let err = destination
            .write_record(Record::new(json!({"id": 1})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WriteError);
        assert!(destination.records().await.is_empty());
    }
}
