//! Mock document watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::mimic::Mimic;

/// Watches the mock document and reloads the shared [`Mimic`] on change.
pub struct MockFileWatcher {
    path: PathBuf,
    mimic: Arc<Mimic>,
}

impl MockFileWatcher {
    pub fn new(path: &Path, mimic: Arc<Mimic>) -> Self {
        Self {
            path: path.to_path_buf(),
            mimic,
        }
    }

    /// Start watching. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let mimic = self.mimic.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                handle_event(&mimic, &path, res);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Mock watcher started");
        Ok(watcher)
    }
}

/// React to one watch event. Returns true when a reload succeeded.
pub(crate) fn handle_event(mimic: &Mimic, path: &Path, res: notify::Result<Event>) -> bool {
    match res {
        Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
            tracing::info!("Mock document change detected, reloading...");
            match mimic.load(path) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        "Failed to reload mocks: {}. Keeping current mocks.",
                        e
                    );
                    false
                }
            }
        }
        Ok(_) => false,
        Err(e) => {
            tracing::error!("Watch error: {:?}", e);
            false
        }
    }
}
