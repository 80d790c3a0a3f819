//! Record destination abstractions.
//!
//! This module provides the [`Destination`] trait and the adapters records are written to.

mod base;
pub mod memory;

pub use base::Destination;
