//! Telemetry setup shared by the flowclone binary and its tests.

pub mod tracing;
