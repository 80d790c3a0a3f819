use std::fmt;
use std::num::NonZeroUsize;

use serde_json::Value;

use crate::clone_error;
use crate::error::{CloneError, CloneResult, ErrorKind};

/// A single unit of data copied from a source to a destination.
///
/// The content is opaque to the clone machinery: it is handed unmodified from the source stream
/// to the destination write.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Value);

impl Record {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns a reference to the document carried by this record.
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Lifecycle of a source or destination adapter within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Created,
    Connected,
    Closed,
}

/// Maximum number of records with an unsettled write at any instant.
///
/// A [`FlowLimit`] is never zero, so holding one is proof that the limit was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowLimit(NonZeroUsize);

impl FlowLimit {
    /// Limit used when the configuration does not specify one.
    pub const DEFAULT: FlowLimit = FlowLimit(NonZeroUsize::new(1000).unwrap());

    /// Creates a [`FlowLimit`], failing with [`ErrorKind::ConfigurationError`] when `flow` is zero.
    pub fn new(flow: usize) -> CloneResult<Self> {
        match NonZeroUsize::new(flow) {
            Some(flow) => Ok(Self(flow)),
            None => Err(clone_error!(
                ErrorKind::ConfigurationError,
                "Invalid flow limit",
                "the flow limit must be greater than 0"
            )),
        }
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl Default for FlowLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for FlowLimit {
    type Error = CloneError;

    fn try_from(flow: usize) -> Result<Self, Self::Error> {
        FlowLimit::new(flow)
    }
}

impl fmt::Display for FlowLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn zero_flow_limit_is_a_configuration_error() {
        let err = FlowLimit::new(0).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn flow_limit_keeps_its_value() {
        assert_eq!(FlowLimit::new(3).unwrap().get(), 3);
        assert_eq!(FlowLimit::default().get(), 1000);
        assert!(FlowLimit::try_from(0usize).is_err());
    }

    #[test]
    fn record_passes_its_document_through() {
        let record = Record::from(json!({"id": 1, "name": "ada"}));

        assert_eq!(record.value()["name"], "ada");
        assert_eq!(record.into_value(), json!({"id": 1, "name": "ada"}));
    }
}
