//! File watching.
//!
//! ```text
//! notify ─► crossbeam ─► Debouncer ─► ChangeResolver::classify ─► Workers
//!  (os)      channel     (quiet         (watch globs)              (per kind)
//!                         window)
//! ```
//!
//! The watcher starts before the initial build so edits made while it runs
//! are not lost; they are replayed once the build finishes.

mod debouncer;
mod resolver;
mod roots;
mod worker;

#[cfg(test)]
mod tests;

pub use debouncer::{DEFAULT_DEBOUNCE_MS, is_temp_file};
pub use resolver::ChangeResolver;
pub use worker::{Rebuild, WorkerSender, Workers};

use std::{path::PathBuf, time::Duration};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use notify::RecommendedWatcher;

use debouncer::Debouncer;
use roots::WatchRoots;

use crate::{asset::AssetKind, error::Result, shutdown::ShutdownToken};

/// Upper bound on how long the loop sleeps before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// A debounced change, already attributed to one asset kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: AssetKind,
    pub change: ChangeKind,
}

/// Recursive watch over the source tree.
pub struct FsWatcher {
    rx: Receiver<notify::Result<notify::Event>>,
    /// Must stay alive for events to flow.
    watcher: RecommendedWatcher,
    roots: WatchRoots,
    debouncer: Debouncer,
}

impl FsWatcher {
    /// Start watching immediately; events buffer until [`run`](Self::run).
    pub fn new(roots: Vec<PathBuf>, debounce: Duration) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        let mut roots = WatchRoots::new(roots);
        roots.attach_existing(&mut watcher)?;

        Ok(Self {
            rx,
            watcher,
            roots,
            debouncer: Debouncer::new(debounce),
        })
    }

    /// Feed changes to `workers` until `shutdown`. Blocks the calling thread.
    pub fn run(mut self, resolver: &ChangeResolver, workers: &WorkerSender, shutdown: &ShutdownToken) {
        while !shutdown.is_cancelled() {
            match self.rx.recv_timeout(self.debouncer.sleep_duration(POLL_INTERVAL)) {
                Ok(Ok(event)) => {
                    self.debouncer.add_event(&event);
                    continue;
                }
                // a broken subscription is reported, the others keep going
                Ok(Err(e)) => log!("watch"; "notify error: {}", e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.roots.maintain(&mut self.watcher);
            let Some(changes) = self.debouncer.take_if_ready() else {
                continue;
            };
            if !dispatch(changes, resolver, workers) {
                break;
            }
        }
    }
}

/// Attribute raw changes to kinds and queue them.
///
/// Returns `false` once the workers are gone.
fn dispatch(
    changes: Vec<(PathBuf, ChangeKind)>,
    resolver: &ChangeResolver,
    workers: &WorkerSender,
) -> bool {
    for (path, change) in changes {
        let kinds = resolver.classify(&path);
        if kinds.is_empty() {
            debug!("watch"; "ignored {}", path.display());
            continue;
        }

        log!("watch"; "{} {}", change.label(), path.display());
        for kind in kinds {
            let event = ChangeEvent {
                path: path.clone(),
                kind,
                change,
            };
            if !workers.send(event) {
                return false;
            }
        }
    }
    true
}
