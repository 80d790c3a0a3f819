//! Shared configuration types for clone runs.

mod base;
mod clone;
mod connection;

pub use base::ValidationError;
pub use clone::{CloneConfig, DestinationConfig, SourceConfig};
pub use connection::{
    DESTINATION_CONNECTION_OPTIONS, IntoConnectOptions, PgConnectionOptions,
    SOURCE_CONNECTION_OPTIONS, TlsConfig,
};
