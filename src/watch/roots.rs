//! Watch roots that survive being deleted and recreated.
//!
//! `git checkout` or `rm -rf src && cp -r ...` drops the OS watch along with
//! the directory. Each root remembers whether it is attached; [`maintain`]
//! moves it between the two states as the directory comes and goes.
//!
//! [`maintain`]: WatchRoots::maintain

use std::path::PathBuf;

use notify::{RecursiveMode, Watcher};

use crate::asset::normalize_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootState {
    Attached,
    Missing,
}

#[derive(Debug)]
struct Root {
    path: PathBuf,
    state: RootState,
}

pub(super) struct WatchRoots {
    roots: Vec<Root>,
}

impl WatchRoots {
    pub(super) fn new(paths: Vec<PathBuf>) -> Self {
        let roots = paths
            .iter()
            .map(|path| Root {
                path: normalize_path(path),
                state: RootState::Missing,
            })
            .collect();
        Self { roots }
    }

    /// Attach every root present now. Failing to watch an existing root is
    /// fatal; a missing one is picked up later.
    pub(super) fn attach_existing(&mut self, watcher: &mut impl Watcher) -> notify::Result<()> {
        for root in &mut self.roots {
            if !root.path.is_dir() {
                debug!("watch"; "not watching missing {}", root.path.display());
                continue;
            }
            watcher.watch(&root.path, RecursiveMode::Recursive)?;
            root.state = RootState::Attached;
        }
        Ok(())
    }

    /// Detach vanished roots and attach reappeared ones.
    ///
    /// Returns how many roots were attached again.
    pub(super) fn maintain(&mut self, watcher: &mut impl Watcher) -> usize {
        let mut reattached = 0;

        for root in &mut self.roots {
            match (root.state, root.path.is_dir()) {
                (RootState::Attached, false) => {
                    // the OS handle died with the directory
                    let _ = watcher.unwatch(&root.path);
                    root.state = RootState::Missing;
                    log!("watch"; "{} removed, waiting for it to come back", root.path.display());
                }
                (RootState::Missing, true) => match watcher.watch(&root.path, RecursiveMode::Recursive) {
                    Ok(()) => {
                        root.state = RootState::Attached;
                        reattached += 1;
                        log!("watch"; "re-attached {}", root.path.display());
                    }
                    Err(e) => debug!("watch"; "re-attach {} failed: {}", root.path.display(), e),
                },
                _ => {}
            }
        }

        reattached
    }

    #[cfg(test)]
    pub(super) fn attached(&self) -> usize {
        self.roots
            .iter()
            .filter(|root| root.state == RootState::Attached)
            .count()
    }
}
