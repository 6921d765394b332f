use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// How long each listener gets to wind down before it is abandoned
const COMPONENT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub type ComponentResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Graceful shutdown coordinator
///
/// Listeners subscribe for the stop signal and are registered by name so
/// `shutdown` can wait for them to finish.
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
    components: Vec<(String, JoinHandle<ComponentResult>)>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            components: Vec::new(),
        }
    }

    /// Get a shutdown receiver for components to listen on
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Track a running component's task
    pub fn register_component<E>(
        &mut self,
        name: impl Into<String>,
        handle: JoinHandle<Result<(), E>>,
    ) where
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let result: ComponentResult = match handle.await {
                Ok(result) => result.map_err(Into::into),
                Err(e) => Err(e.into()),
            };
            result
        });
        self.components.push((name.into(), handle));
    }

    /// Signal every component and wait for each to stop
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }

        for (name, handle) in self.components {
            match timeout(COMPONENT_SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(Ok(()))) => info!("Component '{}' shut down successfully", name),
                Ok(Ok(Err(e))) => error!("Component '{}' stopped with error: {}", name, e),
                Ok(Err(e)) => error!("Component '{}' task failed: {}", name, e),
                Err(_) => warn!("Component '{}' shutdown timed out", name),
            }
        }

        info!("Graceful shutdown completed");
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}
