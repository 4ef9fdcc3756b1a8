//! Configuration file watcher for hot reload.
//!
//! Only validated configurations are forwarded; a file that fails to parse or
//! validate is logged and skipped so the engine keeps its current settings.
//! Editors often emit several events per save, so a reload identical to the
//! last forwarded configuration is dropped.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ResilienceConfig;

/// Watches one configuration file and streams validated updates.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ResilienceConfig>,
    last_sent: Mutex<Option<ResilienceConfig>>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ResilienceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
            last_sent: Mutex::new(None),
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// The returned handle must be kept alive for updates to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    self.handle_event(&event);
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }

    /// Reload on writes and creations; returns true if an update was sent.
    fn handle_event(&self, event: &Event) -> bool {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return false;
        }

        tracing::info!(path = ?self.path, "Config file change detected, reloading");
        let new_config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                return false;
            }
        };

        let mut last = self.last_sent.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_ref() == Some(&new_config) {
            tracing::debug!("Config unchanged, skipping update");
            return false;
        }
        if self.update_tx.send(new_config.clone()).is_err() {
            tracing::warn!("Config update receiver dropped");
            return false;
        }
        *last = Some(new_config);
        true
    }
}
