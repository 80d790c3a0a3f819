use flowclone::concurrency::shutdown::{ShutdownResult, ShutdownTx, create_shutdown_channel};
use flowclone::orchestrator::CloneOrchestrator;
use flowclone::postgres::{PgDestination, PgSource};
use flowclone::progress::TracingProgress;
use flowclone::tally::RunTally;
use flowclone::types::FlowLimit;
use flowclone_config::shared::CloneConfig;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::CliResult;

/// Outcome of a clone run as reported to the user.
#[derive(Debug, Clone, Copy)]
pub struct CloneReport {
    pub tally: RunTally,
    /// Whether the run was stopped by Ctrl+C before the source was exhausted.
    pub interrupted: bool,
}

impl CloneReport {
    /// Returns the line printed on standard output once the run is over.
    pub fn summary(&self) -> String {
        format!(
            "{} entries processed; {} succeed and {} errors.",
            self.tally.processed(),
            self.tally.succeeded(),
            self.tally.errored()
        )
    }
}

/// Clones the configured source table into the destination table.
///
/// Ctrl+C stops pulling new records. The writes in flight settle and the partial tally is
/// reported as interrupted.
pub async fn run_clone(config: CloneConfig) -> CliResult<CloneReport> {
    info!("starting flowclone");

    log_config(&config);

    let flow = FlowLimit::new(config.flow)?;
    let source = PgSource::new(config.src);
    let destination = PgDestination::new(config.dst);

    let mut orchestrator = CloneOrchestrator::new(source, destination, flow)
        .with_progress(TracingProgress::default());

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let shutdown_handle = spawn_shutdown_listener(shutdown_tx);

    let result = orchestrator.run_until_shutdown(shutdown_rx).await;

    // If the run finished before Ctrl+C, the listener is still waiting and must be stopped.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let report = match result? {
        ShutdownResult::Ok(tally) => CloneReport {
            tally,
            interrupted: false,
        },
        ShutdownResult::Shutdown(tally) => CloneReport {
            tally,
            interrupted: true,
        },
    };

    Ok(report)
}

/// Spawns a task triggering shutdown on Ctrl+C.
fn spawn_shutdown_listener(shutdown_tx: ShutdownTx) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl+c, the clone cannot be interrupted");
            return;
        }

        info!("ctrl+c received, waiting for in-flight records before stopping");
        shutdown_tx.shutdown();
    })
}

fn log_config(config: &CloneConfig) {
    info!(
        src_database = %config.src.database,
        src_collection = %config.src.collection,
        src_query = config.src.filter().unwrap_or(""),
        src_tls = config.src.tls.enabled,
        dst_database = %config.dst.database,
        dst_collection = %config.dst.collection,
        dst_tls = config.dst.tls.enabled,
        flow = config.flow,
        "clone config"
    );
}
