use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The flow limit must allow at least one record in flight.
    #[error("`flow` must be greater than 0")]
    FlowZero,
    /// A required field was left empty.
    #[error("`{0}` cannot be empty")]
    EmptyField(&'static str),
    /// The credentials are not a valid Postgres connection string.
    #[error("`{field}` is not a valid connection string: {reason}")]
    InvalidCredentials { field: &'static str, reason: String },
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
}
