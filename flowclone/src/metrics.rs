//! Metrics definitions for clone runs.
//!
//! Counters are recorded through the [`metrics`] facade. Nothing is exported unless the embedding
//! application installs a recorder.

/// Label for the source adapter name in metrics.
pub const SOURCE_LABEL: &str = "source";

/// Label for the destination adapter name in metrics.
pub const DESTINATION_LABEL: &str = "destination";

/// Label for the outcome of a record in metrics.
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Value of [`OUTCOME_LABEL`] for records written successfully.
pub const OUTCOME_SUCCESS: &str = "success";

/// Value of [`OUTCOME_LABEL`] for records that failed.
pub const OUTCOME_FAILURE: &str = "failure";

/// Counter for records whose write settled, labeled by outcome.
pub const FLOWCLONE_RECORDS_PROCESSED_TOTAL: &str = "flowclone_records_processed_total";

/// Counter for runs started.
pub const FLOWCLONE_RUNS_TOTAL: &str = "flowclone_runs_total";

/// Counter for runs aborted by a fatal error, labeled by error kind.
pub const FLOWCLONE_RUN_FAILURES_TOTAL: &str = "flowclone_run_failures_total";
