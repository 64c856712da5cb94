//! Reload notifications.
//!
//! The stage runner reports through a [`ReloadSink`] and never knows who is
//! listening:
//!
//! ```text
//! StageRunner --[reload/error/clear_error]--> ReloadHub --[JSON]--> browsers
//!                                          \-> NoopSink   (build, one-shot tasks)
//!                                          \-> MemorySink (tests)
//! ```

mod hub;
mod message;

pub use hub::ReloadHub;
pub(crate) use hub::MAX_PORT_RETRIES;
pub use message::ReloadMessage;

use std::path::PathBuf;

use parking_lot::Mutex;

use crate::asset::AssetKind;

/// A stage finished and wrote output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSignal {
    pub kind: AssetKind,
    pub paths: Vec<PathBuf>,
}

/// Receiver of stage outcomes.
pub trait ReloadSink: Send + Sync {
    /// A stage succeeded with at least one output.
    fn reload(&self, signal: &ReloadSignal);

    /// A file failed in a stage. `path` is relative to the source root.
    fn error(&self, kind: AssetKind, path: &str, error: &str);

    /// A stage ran without errors.
    fn clear_error(&self, kind: AssetKind);
}

/// Drops everything. Used when nobody can be notified.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ReloadSink for NoopSink {
    fn reload(&self, _: &ReloadSignal) {}
    fn error(&self, _: AssetKind, _: &str, _: &str) {}
    fn clear_error(&self, _: AssetKind) {}
}

/// What a [`MemorySink`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Reload(ReloadSignal),
    Error { kind: AssetKind, path: String },
    ClearError(AssetKind),
}

/// Records every call in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Reload signals only.
    pub fn reloads(&self) -> Vec<ReloadSignal> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Reload(signal) => Some(signal.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ReloadSink for MemorySink {
    fn reload(&self, signal: &ReloadSignal) {
        self.events.lock().push(SinkEvent::Reload(signal.clone()));
    }

    fn error(&self, kind: AssetKind, path: &str, _: &str) {
        self.events.lock().push(SinkEvent::Error {
            kind,
            path: path.to_string(),
        });
    }

    fn clear_error(&self, kind: AssetKind) {
        self.events.lock().push(SinkEvent::ClearError(kind));
    }
}
