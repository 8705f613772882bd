use crate::config::RuntimeConfig;
use crate::config_loader::ConfigLoader;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::watch;

/// Watches the runtime-mutable JSON document (auto_execute, paper_trading,
/// engine_running, ...) and broadcasts every change on a typed channel, per
/// the design note that runtime switches live in an observable state object
/// rather than a global singleton.
pub struct ConfigWatcher {
    tx: watch::Sender<RuntimeConfig>,
}

impl ConfigWatcher {
    /// Creates a new configuration watcher with an initial runtime configuration.
    ///
    /// Returns a tuple of the watcher and a receiver for configuration updates.
    #[must_use]
    pub fn new(initial_config: RuntimeConfig) -> (Self, watch::Receiver<RuntimeConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx }, rx)
    }

    /// Watches the runtime config file for changes and broadcasts updates.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(&self, runtime_config_path: &str) -> Result<()> {
        let tx = self.tx.clone();
        let runtime_config_path = runtime_config_path.to_string();

        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(Path::new(&runtime_config_path), RecursiveMode::NonRecursive)?;

            for event in notify_rx {
                if event.kind.is_modify() {
                    tracing::info!("Runtime config file changed, reloading...");
                    match ConfigLoader::load_runtime(&runtime_config_path) {
                        Ok(new_config) => {
                            let _ = tx.send(new_config);
                            tracing::info!("Runtime config reloaded successfully");
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload runtime config: {}", e);
                        }
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
