use tokio::sync::watch;

/// Transmitter side of the shutdown coordination channel.
///
/// Sending on [`ShutdownTx`] asks every subscribed run to stop pulling new records. Records that
/// were already dispatched are allowed to settle.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Wraps a watch sender into a [`ShutdownTx`].
    pub fn new(tx: watch::Sender<()>) -> Self {
        Self(tx)
    }

    /// Signals shutdown to all receivers.
    pub fn shutdown(&self) {
        // Use infallible send to support shutting down before any receivers subscribe.
        self.0.send_replace(());
    }

    /// Creates a new shutdown receiver subscription.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Receiver side of the shutdown coordination channel.
pub type ShutdownRx = watch::Receiver<()>;

/// Result of an operation that can be interrupted by a shutdown signal.
///
/// [`ShutdownResult::Shutdown`] carries whatever partial result was produced before the signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    Ok(T),
    Shutdown(I),
}

impl<T> ShutdownResult<T, T> {
    /// Returns the carried value regardless of whether the operation was interrupted.
    pub fn into_inner(self) -> T {
        match self {
            ShutdownResult::Ok(value) | ShutdownResult::Shutdown(value) => value,
        }
    }
}

/// Creates a new shutdown coordination channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx::new(tx), rx)
}

/// Resolves once shutdown was signaled on `shutdown_rx`.
///
/// Never resolves when no receiver is given or when the transmitter is dropped without signaling.
pub(crate) async fn shutdown_signaled(shutdown_rx: &mut Option<ShutdownRx>) {
    if let Some(rx) = shutdown_rx
        && rx.changed().await.is_ok()
    {
        return;
    }

    std::future::pending::<()>().await
}
