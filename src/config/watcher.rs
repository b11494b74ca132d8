//! Hot reload of the configuration file.
//!
//! Editors and `fs::write` produce several notifications per save, some of
//! them against a truncated file. A notification only yields an update when
//! the file is non-empty, parses, validates, and differs from the last
//! published config.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches one configuration file and publishes validated changes.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Begin watching on notify's background thread.
    ///
    /// Dropping the returned handle stops the watch and closes the channel.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, updates } = self;
        let last = Mutex::new(load_config(&path).ok());
        let source = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "config watch error");
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }

                if fs::metadata(&source).map_or(true, |meta| meta.len() == 0) {
                    return;
                }

                let next = match load_config(&source) {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::error!(
                            path = %source.display(),
                            error = %e,
                            "reload rejected, keeping current configuration"
                        );
                        return;
                    }
                };

                let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
                if last.as_ref() == Some(&next) {
                    return;
                }
                *last = Some(next.clone());
                let _ = updates.send(next);
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %path.display(), "watching config file");
        Ok(watcher)
    }
}
