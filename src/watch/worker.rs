//! Per-kind rebuild workers.
//!
//! ```text
//! ChangeEvent ─► Workers::send ─► [html] ─► spawn_blocking(rebuild)
//!                               ─► [css ] ─► ...
//!                               ─► ...
//! ```
//!
//! Each kind has its own queue and task. A task drains everything queued
//! for its kind into one batch and runs one rebuild for it, so a burst of
//! saves costs a single stage run. Batches of one kind never overlap;
//! different kinds run independently.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use super::ChangeEvent;
use crate::{asset::AssetKind, shutdown::ShutdownToken};

/// Something that can rerun a stage. Runs on the blocking pool.
pub trait Rebuild: Send + Sync + 'static {
    /// `batch` holds every coalesced event for `kind`, in arrival order.
    fn rebuild(&self, kind: AssetKind, batch: &[ChangeEvent]);
}

pub struct Workers {
    senders: Vec<mpsc::UnboundedSender<ChangeEvent>>,
    handles: Vec<JoinHandle<usize>>,
}

impl Workers {
    /// Start one worker per kind on the current tokio runtime.
    pub fn spawn(rebuild: Arc<dyn Rebuild>, shutdown: &ShutdownToken) -> Self {
        let mut senders = Vec::with_capacity(AssetKind::ALL.len());
        let mut handles = Vec::with_capacity(AssetKind::ALL.len());

        for kind in AssetKind::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            let rebuild = Arc::clone(&rebuild);
            let shutdown = shutdown.clone();
            senders.push(tx);
            handles.push(tokio::spawn(run_worker(kind, rx, rebuild, shutdown)));
        }

        Self { senders, handles }
    }

    /// Queue an event for its kind. Returns `false` once the worker is gone.
    pub fn send(&self, event: ChangeEvent) -> bool {
        self.senders[event.kind.index()].send(event).is_ok()
    }

    /// A cheap handle for queueing from other threads.
    pub fn sender(&self) -> WorkerSender {
        WorkerSender {
            senders: self.senders.clone(),
        }
    }

    /// Close every queue and wait for the workers to finish.
    ///
    /// Returns the number of rebuilds each worker ran, indexed by kind.
    pub async fn join(self) -> [usize; 5] {
        drop(self.senders);
        let mut runs = [0; 5];
        for (i, handle) in self.handles.into_iter().enumerate() {
            runs[i] = handle.await.unwrap_or_else(|e| {
                log!("watch"; "{} worker failed: {}", AssetKind::ALL[i], e);
                0
            });
        }
        runs
    }
}

/// Queue side of [`Workers`], usable from the watcher thread.
#[derive(Clone)]
pub struct WorkerSender {
    senders: Vec<mpsc::UnboundedSender<ChangeEvent>>,
}

impl WorkerSender {
    pub fn send(&self, event: ChangeEvent) -> bool {
        self.senders[event.kind.index()].send(event).is_ok()
    }
}

async fn run_worker(
    kind: AssetKind,
    mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    rebuild: Arc<dyn Rebuild>,
    shutdown: ShutdownToken,
) -> usize {
    let mut runs = 0;

    loop {
        let first = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let mut batch = vec![first];
        while let Ok(event) = rx.try_recv() {
            batch.push(event);
        }
        debug!(kind.name(); "rebuild for {} change(s)", batch.len());

        let rebuild = Arc::clone(&rebuild);
        let task = tokio::task::spawn_blocking(move || rebuild.rebuild(kind, &batch));
        if let Err(e) = task.await {
            log!(kind.name(); "rebuild panicked: {}", e);
        }
        runs += 1;
    }

    debug!(kind.name(); "worker stopped after {} rebuild(s)", runs);
    runs
}
