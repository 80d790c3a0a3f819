//! Error types and result definitions for clone operations.
//!
//! Provides an error system with classification, aggregation, and captured diagnostic metadata.
//! The [`CloneError`] type supports single errors, errors with additional detail, and multiple
//! aggregated errors.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for clone operations using [`CloneError`] as the error type.
pub type CloneResult<T> = Result<T, CloneError>;

/// Detailed payload stored for single [`CloneError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for clone operations.
///
/// [`CloneError`] can represent a single error, an error with additional detail, or several
/// aggregated errors. It is cheap to clone, which lets per-record failures travel inside an
/// [`crate::tally::Outcome`] without losing their source.
#[derive(Debug, Clone)]
pub struct CloneError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, e.g. a read failure followed by a failure to release an adapter.
    Many {
        errors: Vec<CloneError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur while cloning.
///
/// Only the fatal categories ever cross the orchestrator boundary. [`ErrorKind::WriteError`] and
/// [`ErrorKind::HandlerPanic`] are absorbed into the run tally.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigurationError,

    // Connection Errors
    SourceConnectionFailed,
    DestinationConnectionFailed,

    // Read Errors
    SourceQueryFailed,
    SourceReadError,

    // Per-record Errors
    WriteError,
    HandlerPanic,

    // Data & Transformation Errors
    ConversionError,

    // IO Errors
    IoError,

    // Security Errors
    EncryptionError,

    // State Errors
    InvalidState,

    // Unknown / Uncategorized
    Unknown,
}

impl CloneError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the static description of this error.
    ///
    /// Aggregated errors return the description of their first error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, or [`None`] for a single error.
    pub fn errors(&self) -> Option<&[CloneError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect when called on aggregated errors because aggregates forward the first
    /// contained error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    /// Creates a [`CloneError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        CloneError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for CloneError {
    fn eq(&self, other: &CloneError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for CloneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f, 1)
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    let mut lines = rendered.lines();
                    match lines.next() {
                        Some(first_line) => write!(f, "\n  {}. {}", index + 1, first_line)?,
                        None => write!(f, "\n  {}.", index + 1)?,
                    }

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for CloneError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            // For aggregated errors, we forward the first contained error as the source.
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    let indent_str = "  ".repeat(indent);
    if detail.trim().is_empty() {
        return write!(f, "\n{indent_str}Detail: <empty>");
    }

    write!(f, "\n{indent_str}Detail:")?;
    for line in detail.lines() {
        if line.trim().is_empty() {
            write!(f, "\n{indent_str}  ")?;
        } else {
            write!(f, "\n{indent_str}  {line}")?;
        }
    }

    Ok(())
}

/// Creates a [`CloneError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for CloneError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> CloneError {
        CloneError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`CloneError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for CloneError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> CloneError {
        CloneError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`CloneError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly without wrapping
/// it in the [`ErrorRepr::Many`] variant.
impl<E> From<Vec<E>> for CloneError
where
    E: Into<CloneError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> CloneError {
        let location = Location::caller();

        let mut errors: Vec<CloneError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        CloneError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`std::io::Error`] to [`CloneError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for CloneError {
    #[track_caller]
    fn from(err: std::io::Error) -> CloneError {
        let detail = err.to_string();
        CloneError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`rustls::Error`] to [`CloneError`] with [`ErrorKind::EncryptionError`].
impl From<rustls::Error> for CloneError {
    #[track_caller]
    fn from(err: rustls::Error) -> CloneError {
        let detail = err.to_string();
        CloneError::from_components(
            ErrorKind::EncryptionError,
            Cow::Borrowed("TLS configuration failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`flowclone_config::shared::ValidationError`] to [`CloneError`] with
/// [`ErrorKind::ConfigurationError`].
impl From<flowclone_config::shared::ValidationError> for CloneError {
    #[track_caller]
    fn from(err: flowclone_config::shared::ValidationError) -> CloneError {
        let detail = err.to_string();
        CloneError::from_components(
            ErrorKind::ConfigurationError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::clone_error;

    #[test]
    fn single_error_exposes_its_metadata() {
        let err = clone_error!(
            ErrorKind::SourceReadError,
            "Source stream failed",
            "connection reset"
        );

        assert_eq!(err.kind(), ErrorKind::SourceReadError);
        assert_eq!(err.description(), "Source stream failed");
        assert_eq!(err.detail(), Some("connection reset"));
        assert!(err.errors().is_none());
        assert!(err.location().file().ends_with("error.rs"));
    }

    #[test]
    fn aggregation_of_one_error_unwraps_it() {
        let err: CloneError = vec![clone_error!(ErrorKind::WriteError, "Write failed")].into();

        assert!(err.errors().is_none());
        assert_eq!(err.kind(), ErrorKind::WriteError);
    }

    #[test]
    fn aggregation_keeps_every_kind_in_order() {
        let err: CloneError = vec![
            clone_error!(ErrorKind::SourceReadError, "Source stream failed"),
            clone_error!(ErrorKind::IoError, "Close failed"),
        ]
        .into();

        assert_eq!(err.kind(), ErrorKind::SourceReadError);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::SourceReadError, ErrorKind::IoError]
        );
        assert_eq!(err.errors().map(|errors| errors.len()), Some(2));
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn source_is_preserved_across_clones() {
        let io = std::io::Error::other("broken pipe");
        let err = clone_error!(ErrorKind::WriteError, "Write failed", source: io);
        let cloned = err.clone();

        assert_eq!(
            cloned.source().map(|source| source.to_string()),
            Some("broken pipe".to_string())
        );
    }

    #[test]
    fn display_includes_kind_and_detail() {
        let err = clone_error!(
            ErrorKind::ConfigurationError,
            "Invalid flow limit",
            detail = "flow must be greater than 0".to_string()
        );

        let rendered = err.to_string();

        assert!(rendered.starts_with("[ConfigurationError] Invalid flow limit @ "));
        assert!(rendered.contains("Detail:\n    flow must be greater than 0"));
    }
}
