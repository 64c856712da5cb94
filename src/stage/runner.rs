//! Stage execution.
//!
//! ```text
//! source glob ─► read ─► steps ─► write full ─► variant steps ─► write .min
//!                          │                          │
//!                          └──── StageError ◄─────────┘  (file skipped, stage continues)
//! ```
//!
//! Files within a stage are processed in parallel on the rayon pool; results
//! are reported in source order. Runs of the same kind are serialized.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use rayon::prelude::*;

use super::{Stage, StageError, StageResult};
use crate::{
    asset::{Asset, AssetKind, to_slash},
    error::{PipelineError, Result},
    logger,
    reload::{ReloadSignal, ReloadSink},
    transform::apply_all,
};

/// Outcome for one source file: what reached disk, and the step that failed.
///
/// A failing variant step still leaves the full artifact written.
type FileOutcome = Result<(Vec<PathBuf>, Option<StageError>)>;

pub struct StageRunner {
    clean_root: PathBuf,
    sink: Arc<dyn ReloadSink>,
    /// One lock per kind, so two runs never write the same outputs at once.
    locks: [Mutex<()>; 5],
}

impl StageRunner {
    pub fn new(clean_root: impl Into<PathBuf>, sink: Arc<dyn ReloadSink>) -> Self {
        Self {
            clean_root: clean_root.into(),
            sink,
            locks: Default::default(),
        }
    }

    pub fn clean_root(&self) -> &Path {
        &self.clean_root
    }

    /// Remove the whole output tree. Returns once deletion has finished.
    ///
    /// A missing tree is not an error.
    pub fn clean(&self) -> Result<()> {
        // exclude every stage while the tree disappears
        let _guards: Vec<_> = self.locks.iter().map(|lock| lock.lock()).collect();
        match fs::remove_dir_all(&self.clean_root) {
            Ok(()) => {
                log!("clean"; "removed {}", self.clean_root.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("clean"; "{} does not exist", self.clean_root.display());
                Ok(())
            }
            Err(source) => Err(PipelineError::Clean {
                path: self.clean_root.clone(),
                source,
            }),
        }
    }

    /// Run one stage over its full source set.
    ///
    /// Transform failures end up in [`StageResult::Failure`]; only problems
    /// with the trees themselves are returned as `Err`.
    pub fn run(&self, stage: &Stage) -> Result<StageResult> {
        let _guard = self.locks[stage.kind.index()].lock();

        let src_root = stage.spec.source.base();
        if !src_root.is_dir() {
            return Err(PipelineError::SourceRootMissing(src_root.to_path_buf()));
        }

        let files = stage
            .spec
            .source
            .walk()
            .map_err(|e| PipelineError::io(stage.spec.source.walk_root(), e))?;
        debug!(stage.name(); "{} source file(s)", files.len());

        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .map(|file| self.process(stage, file))
            .collect();

        let mut outputs = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            let (written, error) = outcome?;
            outputs.extend(written);
            if let Some(error) = error {
                self.report(stage.kind, &error);
                errors.push(error);
            }
        }

        let result = StageResult::new(stage.kind, outputs, errors);
        if result.is_success() {
            self.sink.clear_error(stage.kind);
            if !result.outputs().is_empty() {
                self.sink.reload(&ReloadSignal {
                    kind: stage.kind,
                    paths: result.outputs().to_vec(),
                });
            }
        }
        Ok(result)
    }

    fn process(&self, stage: &Stage, file: &Path) -> FileOutcome {
        let spec = &stage.spec;
        let display = file
            .strip_prefix(spec.source.base())
            .unwrap_or(file)
            .to_path_buf();
        let failed = |step: &'static str, message: String| StageError {
            step,
            file: display.clone(),
            message,
        };

        let contents = fs::read(file).map_err(|e| PipelineError::io(file, e))?;
        let rel = file.strip_prefix(&spec.base).unwrap_or(file);
        let asset = Asset::new(rel, file, contents);

        let full = match apply_all(&stage.steps, asset) {
            Ok(asset) => asset,
            Err((step, e)) => return Ok((Vec::new(), Some(failed(step, e.to_string())))),
        };

        let mut written = Vec::with_capacity(2);
        let full_path = spec.output_dir.join(&full.path);
        if write_if_changed(&full_path, &full.contents)? {
            debug!(stage.name(); "wrote {}", full_path.display());
        }
        written.push(full_path);

        if let Some(variant) = &stage.variant {
            let min = match apply_all(&variant.steps, full) {
                Ok(asset) => asset,
                Err((step, e)) => return Ok((written, Some(failed(step, e.to_string())))),
            };
            let min_path = spec.output_dir.join(&min.path);
            write_if_changed(&min_path, &min.contents)?;
            written.push(min_path);
        }

        Ok((written, None))
    }

    fn report(&self, kind: AssetKind, error: &StageError) {
        logger::notify_error(kind.error_title(), &error.to_string());
        self.sink
            .error(kind, &to_slash(&error.file), &error.message);
    }
}

/// Write `bytes` unless the file already holds exactly them.
///
/// Returns whether anything was written. Leaving identical files untouched
/// keeps their mtime, so a rerun with unchanged sources is a no-op on disk.
fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<bool> {
    if fs::read(path).is_ok_and(|existing| existing == bytes) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| PipelineError::io(path, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset::PathRegistry,
        config::PipelineConfig,
        error::TransformError,
        reload::{MemorySink, SinkEvent},
        stage::{StageCatalog, Variant},
        transform::Transform,
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };
    use tempfile::TempDir;

    /// Holds each file for a while and records how many are in flight.
    #[derive(Default)]
    struct Slow {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    struct SlowStep(Arc<Slow>);

    impl Transform for SlowStep {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn apply(&self, asset: Asset) -> std::result::Result<Asset, TransformError> {
            let now = self.0.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            self.0.active.fetch_sub(1, Ordering::SeqCst);
            self.0.calls.fetch_add(1, Ordering::SeqCst);
            Ok(asset)
        }
    }

    struct Fail;

    impl Transform for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn apply(&self, _: Asset) -> std::result::Result<Asset, TransformError> {
            Err(TransformError::script("cannot minify"))
        }
    }

    struct Fixture {
        dir: TempDir,
        config: PipelineConfig,
        sink: Arc<MemorySink>,
        runner: StageRunner,
        catalog: StageCatalog,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("src")).unwrap();
            let config = PipelineConfig::with_root(dir.path());
            let registry = PathRegistry::from_config(&config).unwrap();
            let catalog = StageCatalog::new(&config, &registry);
            let sink = Arc::new(MemorySink::new());
            let runner = StageRunner::new(config.dist_dir(), sink.clone());
            Self {
                dir,
                config,
                sink,
                runner,
                catalog,
            }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn run(&self, kind: AssetKind) -> StageResult {
            self.runner.run(self.catalog.get(kind)).unwrap()
        }

        fn dist(&self, rel: &str) -> PathBuf {
            self.config.dist_dir().join(rel)
        }
    }

    #[test]
    fn test_empty_source_set() {
        let fx = Fixture::new();
        for kind in AssetKind::ALL {
            let result = fx.run(kind);
            assert!(result.is_success());
            assert!(result.outputs().is_empty());
        }
        assert!(fx.sink.reloads().is_empty());
    }

    #[test]
    fn test_missing_source_root_is_fatal() {
        let fx = Fixture::new();
        fs::remove_dir(fx.dir.path().join("src")).unwrap();
        let err = fx.runner.run(fx.catalog.get(AssetKind::Js)).unwrap_err();
        assert!(matches!(err, PipelineError::SourceRootMissing(_)));
    }

    #[test]
    fn test_js_full_and_min() {
        let fx = Fixture::new();
        fx.write("src/assets/js/app.js", "function hello(name) {\n  return 'hi ' + name;\n}\n");

        let result = fx.run(AssetKind::Js);
        assert_eq!(
            result.outputs(),
            [fx.dist("assets/js/app.js"), fx.dist("assets/js/app.min.js")]
        );
        assert!(fx.dist("assets/js/app.min.js").is_file());
        assert_eq!(fx.sink.reloads().len(), 1);
    }

    #[test]
    fn test_fonts_copied_without_min() {
        let fx = Fixture::new();
        fx.write("src/assets/fonts/inter/inter.woff2", "font-bytes");

        let result = fx.run(AssetKind::Fonts);
        assert_eq!(result.outputs(), [fx.dist("assets/fonts/inter/inter.woff2")]);
        assert_eq!(
            fs::read(fx.dist("assets/fonts/inter/inter.woff2")).unwrap(),
            b"font-bytes"
        );
    }

    #[test]
    fn test_failure_reported_and_other_files_continue() {
        let fx = Fixture::new();
        fx.write("src/assets/scss/broken.scss", ".a { color: red");
        fx.write("src/assets/scss/main.scss", ".a { color: red; }");

        let result = fx.run(AssetKind::Css);
        let StageResult::Failure { errors, outputs, .. } = &result else {
            panic!("expected failure");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, PathBuf::from("assets/scss/broken.scss"));
        assert_eq!(errors[0].step, "compile-styles");
        assert!(outputs.contains(&fx.dist("assets/css/main.css")));
        assert!(!fx.dist("assets/css/broken.css").exists());

        // failed stage: overlay, no reload
        assert_eq!(
            fx.sink.events(),
            vec![SinkEvent::Error {
                kind: AssetKind::Css,
                path: "assets/scss/broken.scss".into()
            }]
        );
    }

    #[test]
    fn test_unchanged_output_not_rewritten() {
        let fx = Fixture::new();
        fx.write("src/assets/fonts/a.woff", "x");
        fx.run(AssetKind::Fonts);
        let out = fx.dist("assets/fonts/a.woff");
        assert!(!write_if_changed(&out, b"x").unwrap());
        assert!(write_if_changed(&out, b"y").unwrap());
    }

    #[test]
    fn test_clean() {
        let fx = Fixture::new();
        fx.write("src/assets/fonts/a.woff", "x");
        fx.run(AssetKind::Fonts);
        assert!(fx.config.dist_dir().exists());

        fx.runner.clean().unwrap();
        assert!(!fx.config.dist_dir().exists());
        // missing root is fine
        fx.runner.clean().unwrap();
    }

    #[test]
    fn test_same_kind_runs_never_overlap() {
        let fx = Fixture::new();
        fx.write("src/assets/fonts/a.woff", "x");
        let slow = Arc::new(Slow::default());
        let stage = Stage {
            kind: AssetKind::Fonts,
            spec: fx.catalog.get(AssetKind::Fonts).spec.clone(),
            steps: vec![Box::new(SlowStep(Arc::clone(&slow)))],
            variant: None,
        };

        thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| fx.runner.run(&stage).unwrap());
            }
        });

        assert_eq!(slow.calls.load(Ordering::SeqCst), 3);
        assert_eq!(slow.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_variant_failure_keeps_full_output() {
        let fx = Fixture::new();
        fx.write("src/assets/fonts/a.woff", "x");
        let stage = Stage {
            kind: AssetKind::Fonts,
            spec: fx.catalog.get(AssetKind::Fonts).spec.clone(),
            steps: Vec::new(),
            variant: Some(Variant::minified(vec![Box::new(Fail)])),
        };

        let result = fx.runner.run(&stage).unwrap();
        let StageResult::Failure { errors, outputs, .. } = &result else {
            panic!("expected failure");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, "fail");
        assert_eq!(outputs, &[fx.dist("assets/fonts/a.woff")]);
        assert!(fx.dist("assets/fonts/a.woff").is_file());
        assert!(!fx.dist("assets/fonts/a.min.woff").exists());
    }
}
