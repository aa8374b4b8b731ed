//! OS file watching for local sources.

use std::path::Path;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::refresh::ChangeEvent;

/// Watches one directory tree and feeds a change stream suitable for
/// [`RefreshEngine::attach_changes`](crate::RefreshEngine::attach_changes).
///
/// Event kinds and paths are not inspected; the engine rebuilds the whole
/// source either way. Dropping the watcher stops the stream, which in turn
/// ends the attached refresh task.
pub struct SourceWatcher {
    _watcher: notify::RecommendedWatcher,
}

impl SourceWatcher {
    /// Watch `root` recursively.
    pub fn start(root: &Path) -> notify::Result<(Self, UnboundedReceiver<ChangeEvent>)> {
        let (tx, rx) = unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
                match event {
                    // Send failures mean the engine side is gone; the watcher
                    // is about to be dropped with it.
                    Ok(_) => {
                        let _ = tx.send(ChangeEvent);
                    }
                    Err(err) => {
                        tracing::warn!(
                            target = "pier.index",
                            error = %err,
                            "file watch error"
                        );
                    }
                }
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(
            target = "pier.index",
            root = %root.display(),
            "watching source directory"
        );
        Ok((Self { _watcher: watcher }, rx))
    }
}
