use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use flowclone::error::CloneError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for command line operations.
pub type CliResult<T> = Result<T, CliError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    /// Captures a new backtrace for an error variant.
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the `flowclone` binary.
///
/// Wraps [`CloneError`] for failures of the clone itself and provides variants for the failures
/// happening around it.
#[derive(Debug)]
pub enum CliError {
    /// The clone run failed.
    Clone(CloneError),
    /// Configuration error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl CliError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Clone(_) => "clone error",
            CliError::Config(_, _) => "configuration error",
            CliError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            CliError::Clone(err) => err.backtrace(),
            CliError::Config(_, cb) => Some(&cb.0),
            CliError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error type.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        CliError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("flowclone failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        // Aggregated errors already list every inner error in their display output.
        if !matches!(self, CliError::Clone(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Clone(err) => write!(f, "{err}"),
            CliError::Config(source, _) => write!(f, "configuration error: {source}"),
            CliError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CliError::Clone(err) => err.source(),
            CliError::Config(source, _) => Some(source.as_ref()),
            CliError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<CloneError> for CliError {
    fn from(err: CloneError) -> Self {
        CliError::Clone(err)
    }
}

#[cfg(test)]
mod tests {
    use flowclone::clone_error;
    use flowclone::error::ErrorKind;

    use super::*;

    #[test]
    fn report_lists_category_error_and_causes() {
        let io = std::io::Error::other("connection refused");
        let err = CliError::from(clone_error!(
            ErrorKind::SourceConnectionFailed,
            "Could not connect to Postgres",
            source: io
        ));

        let report = err.render_report();

        assert!(report.starts_with("flowclone failed\ncategory: clone error\n"));
        assert!(report.contains("error: [SourceConnectionFailed] Could not connect to Postgres"));
        assert!(report.contains("cause 1: connection refused\n"));
    }

    #[test]
    fn config_errors_keep_their_source() {
        let err = CliError::config(std::io::Error::other("flow must be greater than 0"));

        assert_eq!(err.category(), "configuration error");
        assert_eq!(
            err.to_string(),
            "configuration error: flow must be greater than 0"
        );
    }
}
