//! Record source abstractions.
//!
//! This module provides the [`Source`] trait and the adapters records are read from.

mod base;
pub mod memory;

pub use base::{RecordStream, Source};
