//! Watch session: everything that lives while `sitepipe run watch` runs.
//!
//! ```text
//!            ┌──────────── Session ─────────────────────────────┐
//!            │ FsWatcher ─► Workers ─► StageRunner ─► ReloadHub │──► browsers
//!            │                             │                    │
//!            │ DevServer ◄── dist/ ◄───────┘                    │──► browsers
//!            └──────────────────────────────────────────────────┘
//! ```
//!
//! Created once, dropped on Ctrl+C. Nothing here is global; the token is the
//! only thing the parts share besides the runner.

use std::{sync::Arc, thread, time::Duration};

use crate::{
    asset::{AssetKind, PathRegistry},
    build,
    config::PipelineConfig,
    error::{PipelineError, Result},
    graph::ExecutionPlan,
    reload::{ReloadHub, ReloadSink},
    server::DevServer,
    shutdown::ShutdownToken,
    stage::{StageCatalog, StageRunner},
    watch::{ChangeEvent, ChangeResolver, FsWatcher, Rebuild, Workers},
};

pub struct Session {
    catalog: Arc<StageCatalog>,
    runner: Arc<StageRunner>,
    server: DevServer,
    watcher: FsWatcher,
    shutdown: ShutdownToken,
}

impl Session {
    /// Bind both ports and start watching. Nothing is built yet.
    pub fn start(config: &PipelineConfig, shutdown: ShutdownToken) -> Result<Self> {
        let registry = PathRegistry::from_config(config)?;
        let catalog = Arc::new(StageCatalog::new(config, &registry));

        let hub = ReloadHub::bind(config.serve.interface, config.serve.reload_port, shutdown.clone())?;
        let server = DevServer::bind(
            config.serve.interface,
            config.serve.port,
            registry.clean_root(),
            Some(hub.port()),
        )?;

        // watcher first: edits made during the initial build are replayed
        let watcher = FsWatcher::new(
            vec![registry.src_root().to_path_buf()],
            Duration::from_millis(config.watch.debounce_ms),
        )?;

        debug!("reload"; "ws://{}:{}", config.serve.interface, hub.port());
        let sink: Arc<dyn ReloadSink> = hub;
        let runner = Arc::new(StageRunner::new(registry.clean_root(), sink));

        Ok(Self {
            catalog,
            runner,
            server,
            watcher,
            shutdown,
        })
    }

    /// Run the plan's build phases, then serve and watch until shutdown.
    pub fn run(self, plan: &ExecutionPlan) -> Result<()> {
        let results = build::execute(plan, &self.runner, &self.catalog)?;
        build::report(&results);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(PipelineError::Runtime)?;

        let rebuild = Arc::new(Rebuilder {
            resolver: ChangeResolver::new(Arc::clone(&self.catalog)),
            runner: Arc::clone(&self.runner),
        });
        let workers = {
            let _guard = runtime.enter();
            Workers::spawn(rebuild, &self.shutdown)
        };

        let Self {
            catalog,
            server,
            watcher,
            shutdown,
            ..
        } = self;

        let server_thread = {
            let shutdown = shutdown.clone();
            thread::spawn(move || server.run(&shutdown))
        };
        let watch_thread = {
            let shutdown = shutdown.clone();
            let sender = workers.sender();
            let resolver = ChangeResolver::new(catalog);
            thread::spawn(move || watcher.run(&resolver, &sender, &shutdown))
        };

        log!("watch"; "watching for changes, press Ctrl+C to stop");
        runtime.block_on(async {
            shutdown.cancelled().await;
            workers.join().await;
        });

        for (name, handle) in [("serve", server_thread), ("watch", watch_thread)] {
            if handle.join().is_err() {
                log!(name; "thread panicked");
            }
        }
        Ok(())
    }
}

/// Reruns the stage a change resolves to.
struct Rebuilder {
    resolver: ChangeResolver,
    runner: Arc<StageRunner>,
}

impl Rebuild for Rebuilder {
    fn rebuild(&self, kind: AssetKind, batch: &[ChangeEvent]) {
        let Some(event) = batch.last() else {
            return;
        };
        let stage = self.resolver.resolve(event);
        debug_assert_eq!(stage.kind, kind);

        match self.runner.run(stage) {
            Ok(result) => build::report_status(&result),
            // the watcher keeps going; a recreated root is picked up again
            Err(e) => log!("error"; "{}: {}", kind, e),
        }
    }
}
