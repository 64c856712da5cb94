//! `sitepipe run <task>`.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::Task;
use crate::{
    asset::PathRegistry,
    build,
    config::PipelineConfig,
    graph::{Node, StageGraph},
    reload::NoopSink,
    session::Session,
    shutdown::ShutdownToken,
    stage::{StageCatalog, StageRunner},
};

/// Execute one task to completion.
///
/// Transform failures are reported but do not fail the task; fatal
/// pipeline errors do.
pub fn run_task(task: Task, config: &PipelineConfig) -> Result<()> {
    let plan = StageGraph::new()
        .plan(task)
        .context("invalid stage graph")?;

    if plan.contains(Node::Watch) {
        let shutdown = ShutdownToken::new();
        shutdown
            .cancel_on_interrupt()
            .context("failed to install Ctrl+C handler")?;
        let session = Session::start(config, shutdown).context("failed to start watch session")?;
        return session.run(&plan).map_err(Into::into);
    }

    let registry = PathRegistry::from_config(config)?;
    let catalog = StageCatalog::new(config, &registry);
    let runner = StageRunner::new(registry.clean_root(), Arc::new(NoopSink));

    let results = build::execute(&plan, &runner, &catalog)
        .with_context(|| format!("task `{task}` failed"))?;
    if !build::report(&results) {
        log!("error"; "task `{}` finished with errors", task);
    }
    Ok(())
}
