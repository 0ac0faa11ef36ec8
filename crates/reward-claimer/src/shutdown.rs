use tokio::sync::watch;

/// Broadcasts the request to shut down to every long running task.
///
/// Holders of a [`ShutdownSignal`] resolve once SIGINT or SIGTERM was
/// received (or [`Shutdown::trigger`] was called).
pub struct Shutdown(watch::Sender<bool>);

#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl Shutdown {
    pub fn new() -> Self {
        Self(watch::channel(false).0)
    }

    /// Triggers the shutdown once the process receives SIGINT or SIGTERM.
    pub fn on_os_signal(self) {
        tokio::spawn(async move {
            wait_for_signal().await;
            self.trigger();
        });
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.0.subscribe())
    }

    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolves once the shutdown was triggered. Also resolves if the
    /// [`Shutdown`] was dropped without triggering.
    pub async fn wait(mut self) {
        let _ = self.0.wait_for(|shutdown| *shutdown).await;
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::{signal, signal::unix};

        let mut sigterm = match unix::signal(unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                tracing::error!(?err, "failed to install SIGTERM handler");
                let _ = signal::ctrl_c().await;
                tracing::info!("Received SIGINT");
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            },
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            },
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received SIGINT");
    }
}
