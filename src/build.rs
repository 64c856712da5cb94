//! Plan execution for the one-shot phases.
//!
//! `clean` runs to completion before any content stage starts; content
//! stages of one phase run concurrently on the rayon pool. Long-lived nodes
//! (`serve`, `watch`) are left to [`crate::session::Session`].

use rayon::prelude::*;

use crate::{
    error::Result,
    graph::{ExecutionPlan, Node},
    logger,
    stage::{StageCatalog, StageResult, StageRunner},
};

/// Run the `clean` and content nodes of `plan`, phase by phase.
///
/// Results come back in declaration order. The first fatal error ends the
/// plan; transform failures do not.
pub fn execute(
    plan: &ExecutionPlan,
    runner: &StageRunner,
    catalog: &StageCatalog,
) -> Result<Vec<StageResult>> {
    let mut results = Vec::new();

    for phase in plan.phases() {
        if phase.contains(&Node::Clean) {
            runner.clean()?;
        }

        let stages: Vec<_> = phase
            .iter()
            .filter_map(|node| match node {
                Node::Content(kind) => Some(catalog.get(*kind)),
                _ => None,
            })
            .collect();
        if stages.is_empty() {
            continue;
        }

        let outcomes: Vec<Result<StageResult>> =
            stages.par_iter().map(|stage| runner.run(stage)).collect();
        for outcome in outcomes {
            results.push(outcome?);
        }
    }

    Ok(results)
}

/// Print one line per stage. Returns `true` when every stage succeeded.
pub fn report(results: &[StageResult]) -> bool {
    let mut ok = true;
    for result in results {
        if result.is_success() {
            log!(result.kind().name(); "{}", result.summary());
        } else {
            ok = false;
            log!("error"; "{}", result.summary());
        }
    }
    ok
}

/// Watch-mode variant of [`report`] for a single rebuild.
pub fn report_status(result: &StageResult) {
    if result.is_success() {
        logger::status_success(&format!("rebuilt {}", result.summary()));
    } else {
        let detail = result
            .errors()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        logger::status_error(&result.summary(), &detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset::{AssetKind, PathRegistry},
        cli::Task,
        config::PipelineConfig,
        graph::StageGraph,
        reload::NoopSink,
    };
    use std::{fs, sync::Arc};
    use tempfile::TempDir;

    fn setup() -> (TempDir, StageRunner, StageCatalog, PipelineConfig) {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("assets/js")).unwrap();
        fs::write(src.join("assets/js/app.js"), "var a = 1;\n").unwrap();

        let config = PipelineConfig::with_root(tmp.path());
        let registry = PathRegistry::from_config(&config).unwrap();
        let catalog = StageCatalog::new(&config, &registry);
        let runner = StageRunner::new(registry.clean_root(), Arc::new(NoopSink));
        (tmp, runner, catalog, config)
    }

    #[test]
    fn test_build_cleans_stale_output() {
        let (_tmp, runner, catalog, config) = setup();
        let stale = config.dist_dir().join("stale.txt");
        fs::create_dir_all(config.dist_dir()).unwrap();
        fs::write(&stale, "old").unwrap();

        let plan = StageGraph::new().plan(Task::Build).unwrap();
        let results = execute(&plan, &runner, &catalog).unwrap();

        assert!(!stale.exists());
        assert_eq!(results.len(), 5);
        assert_eq!(
            results.iter().map(StageResult::kind).collect::<Vec<_>>(),
            AssetKind::ALL
        );
        assert!(config.dist_dir().join("assets/js/app.min.js").is_file());
        assert!(report(&results));
    }

    #[test]
    fn test_single_task_keeps_other_output() {
        let (_tmp, runner, catalog, config) = setup();
        let other = config.dist_dir().join("index.html");
        fs::create_dir_all(config.dist_dir()).unwrap();
        fs::write(&other, "kept").unwrap();

        let plan = StageGraph::new().plan(Task::Js).unwrap();
        let results = execute(&plan, &runner, &catalog).unwrap();
        assert_eq!(results.len(), 1);
        assert!(other.exists());
    }

    #[test]
    fn test_missing_src_is_fatal() {
        let (tmp, runner, catalog, _config) = setup();
        fs::remove_dir_all(tmp.path().join("src")).unwrap();
        let plan = StageGraph::new().plan(Task::Build).unwrap();
        assert!(execute(&plan, &runner, &catalog).is_err());
    }
}
