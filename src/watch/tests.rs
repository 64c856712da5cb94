use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use tempfile::TempDir;

use super::debouncer::{DEFAULT_DEBOUNCE_MS, Debouncer};
use super::roots::WatchRoots;
use super::*;
use crate::{asset::PathRegistry, config::PipelineConfig, stage::StageCatalog};

fn window() -> Duration {
    Duration::from_millis(DEFAULT_DEBOUNCE_MS)
}

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn resolver() -> ChangeResolver {
    let config = PipelineConfig::with_root("/site");
    let registry = PathRegistry::from_config(&config).unwrap();
    ChangeResolver::new(Arc::new(StageCatalog::new(&config, &registry)))
}

fn change(path: &str, kind: AssetKind) -> ChangeEvent {
    ChangeEvent {
        path: PathBuf::from(path),
        kind,
        change: ChangeKind::Modified,
    }
}

/// Records every rebuild instead of running stages.
#[derive(Default)]
struct Recorder {
    runs: Mutex<Vec<(AssetKind, Vec<PathBuf>)>>,
}

impl Rebuild for Recorder {
    fn rebuild(&self, kind: AssetKind, batch: &[ChangeEvent]) {
        let paths = batch.iter().map(|e| e.path.clone()).collect();
        self.runs.lock().push((kind, paths));
    }
}

impl Recorder {
    fn runs_for(&self, kind: AssetKind) -> Vec<Vec<PathBuf>> {
        self.runs
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, paths)| paths.clone())
            .collect()
    }
}

// ============================================================================
// debouncer
// ============================================================================

#[test]
fn test_debouncer_empty() {
    let mut debouncer = Debouncer::new(window());
    assert!(debouncer.take_if_ready().is_none());
    assert_eq!(debouncer.sleep_duration(Duration::from_millis(100)), Duration::from_millis(100));
}

#[test]
fn test_event_routing_by_kind() {
    let mut debouncer = Debouncer::new(window());

    debouncer.add_event(&make_event(vec!["/project/a.scss"], create_kind()));
    debouncer.add_event(&make_event(vec!["/project/b.scss"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/project/c.scss"], remove_kind()));

    assert_eq!(debouncer.changes.len(), 3);
    assert_eq!(debouncer.changes[Path::new("/project/a.scss")], ChangeKind::Created);
    assert_eq!(debouncer.changes[Path::new("/project/b.scss")], ChangeKind::Modified);
    assert_eq!(debouncer.changes[Path::new("/project/c.scss")], ChangeKind::Removed);
}

#[test]
fn test_metadata_change_ignored() {
    let mut debouncer = Debouncer::new(window());
    let kind = notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ));
    debouncer.add_event(&make_event(vec!["/project/a.js"], kind));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_temp_file_ignored() {
    let mut debouncer = Debouncer::new(window());

    debouncer.add_event(&make_event(vec!["/project/real.js"], modify_kind()));
    let first_time = debouncer.last_event.unwrap();

    std::thread::sleep(Duration::from_millis(5));

    debouncer.add_event(&make_event(vec!["/project/.real.js.swp", "/project/real.js~"], modify_kind()));
    assert_eq!(debouncer.last_event.unwrap(), first_time);
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_dedup_first_event_wins() {
    let mut debouncer = Debouncer::new(window());

    debouncer.add_event(&make_event(vec!["/project/a.js"], create_kind()));
    debouncer.add_event(&make_event(vec!["/project/a.js"], modify_kind()));

    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(debouncer.changes[Path::new("/project/a.js")], ChangeKind::Created);
}

#[test]
fn test_create_then_remove_discards() {
    let mut debouncer = Debouncer::new(window());

    debouncer.add_event(&make_event(vec!["/project/a.js"], create_kind()));
    debouncer.add_event(&make_event(vec!["/project/a.js"], remove_kind()));
    assert!(debouncer.changes.is_empty(), "created+removed should discard");
}

#[test]
fn test_modify_then_remove_upgrades() {
    let mut debouncer = Debouncer::new(window());

    debouncer.add_event(&make_event(vec!["/project/a.js"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/project/a.js"], remove_kind()));
    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(debouncer.changes[Path::new("/project/a.js")], ChangeKind::Removed);
}

#[test]
fn test_remove_then_create_restores() {
    let mut debouncer = Debouncer::new(window());

    debouncer.add_event(&make_event(vec!["/project/a.js"], remove_kind()));
    debouncer.add_event(&make_event(vec!["/project/a.js"], create_kind()));
    assert_eq!(debouncer.changes[Path::new("/project/a.js")], ChangeKind::Created);
}

#[test]
fn test_take_waits_for_quiet_window() {
    let mut debouncer = Debouncer::new(Duration::from_millis(20));
    debouncer.add_event(&make_event(vec!["/project/b.js", "/project/a.js"], modify_kind()));
    assert!(debouncer.take_if_ready().is_none());

    std::thread::sleep(Duration::from_millis(30));
    let changes = debouncer.take_if_ready().unwrap();
    assert_eq!(
        changes,
        [
            (PathBuf::from("/project/a.js"), ChangeKind::Modified),
            (PathBuf::from("/project/b.js"), ChangeKind::Modified),
        ]
    );
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_sleep_duration_after_event() {
    let mut debouncer = Debouncer::new(window());
    debouncer.add(PathBuf::from("/project/a.js"), ChangeKind::Modified);

    let dur = debouncer.sleep_duration(Duration::from_secs(1));
    assert!(dur >= Duration::from_millis(DEFAULT_DEBOUNCE_MS - 10));
    assert!(dur <= Duration::from_millis(DEFAULT_DEBOUNCE_MS));
}

#[cfg(unix)]
#[test]
fn test_symlinked_root_events_classify() {
    let tmp = TempDir::new().unwrap();
    let real = tmp.path().join("site");
    std::fs::create_dir_all(real.join("src/assets/scss")).unwrap();
    std::fs::write(real.join("src/assets/scss/main.scss"), "").unwrap();
    let link = tmp.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let config = PipelineConfig::with_root(&link);
    let registry = PathRegistry::from_config(&config).unwrap();
    let resolver = ChangeResolver::new(Arc::new(StageCatalog::new(&config, &registry)));

    let mut debouncer = Debouncer::new(Duration::ZERO);
    let event = link.join("src/assets/scss/main.scss");
    debouncer.add_event(&make_event(vec![event.to_str().unwrap()], modify_kind()));
    let changes = debouncer.take_if_ready().unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(resolver.classify(&changes[0].0), [AssetKind::Css]);
}

// ============================================================================
// workers
// ============================================================================

#[tokio::test]
async fn test_bounded_events_one_rebuild_per_batch() {
    let recorder = Arc::new(Recorder::default());
    let shutdown = ShutdownToken::new();
    let workers = Workers::spawn(recorder.clone(), &shutdown);

    // queued before any worker gets to run, so each kind sees one batch
    let events = [
        change("/site/src/assets/scss/main.scss", AssetKind::Css),
        change("/site/src/assets/js/app.js", AssetKind::Js),
        change("/site/src/assets/scss/_vars.scss", AssetKind::Css),
        change("/site/src/assets/scss/main.scss", AssetKind::Css),
    ];
    for event in events {
        assert!(workers.send(event));
    }

    let runs = workers.join().await;
    assert_eq!(runs[AssetKind::Css.index()], 1);
    assert_eq!(runs[AssetKind::Js.index()], 1);
    assert_eq!(runs[AssetKind::Html.index()], 0);

    assert_eq!(
        recorder.runs_for(AssetKind::Css),
        [vec![
            PathBuf::from("/site/src/assets/scss/main.scss"),
            PathBuf::from("/site/src/assets/scss/_vars.scss"),
            PathBuf::from("/site/src/assets/scss/main.scss"),
        ]]
    );
    assert!(recorder.runs_for(AssetKind::Images).is_empty());
}

#[tokio::test]
async fn test_later_events_start_a_new_batch() {
    let recorder = Arc::new(Recorder::default());
    let shutdown = ShutdownToken::new();
    let workers = Workers::spawn(recorder.clone(), &shutdown);

    workers.send(change("/site/src/index.html", AssetKind::Html));
    // let the first batch finish before queueing the second
    while recorder.runs_for(AssetKind::Html).is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    workers.send(change("/site/src/about.html", AssetKind::Html));

    let runs = workers.join().await;
    assert_eq!(runs[AssetKind::Html.index()], 2);
}

#[tokio::test]
async fn test_workers_stop_on_cancel() {
    let recorder = Arc::new(Recorder::default());
    let shutdown = ShutdownToken::new();
    let workers = Workers::spawn(recorder.clone(), &shutdown);
    // keeps every queue open, so only the token can end the workers
    let _sender = workers.sender();

    shutdown.cancel();
    let runs = tokio::time::timeout(Duration::from_secs(5), workers.join())
        .await
        .expect("workers did not stop");
    assert_eq!(runs, [0; 5]);
}

#[tokio::test]
async fn test_dispatch_classifies_and_queues() {
    let recorder = Arc::new(Recorder::default());
    let shutdown = ShutdownToken::new();
    let workers = Workers::spawn(recorder.clone(), &shutdown);

    let changes = vec![
        (PathBuf::from("/site/src/assets/images/logo.png"), ChangeKind::Created),
        (PathBuf::from("/site/src/assets/js/app.js"), ChangeKind::Removed),
        (PathBuf::from("/site/README.md"), ChangeKind::Modified),
    ];
    assert!(dispatch(changes, &resolver(), &workers.sender()));

    let runs = workers.join().await;
    assert_eq!(runs, [0, 0, 1, 0, 1]);
    assert_eq!(
        recorder.runs_for(AssetKind::Images),
        [vec![PathBuf::from("/site/src/assets/images/logo.png")]]
    );
}

// ============================================================================
// watcher
// ============================================================================

#[test]
fn test_watch_roots_reattach() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("src");
    let mut watcher = notify::recommended_watcher(|_: notify::Result<notify::Event>| {}).unwrap();

    let mut roots = WatchRoots::new(vec![root.clone()]);
    roots.attach_existing(&mut watcher).unwrap();
    assert_eq!(roots.attached(), 0);

    std::fs::create_dir_all(&root).unwrap();
    assert_eq!(roots.maintain(&mut watcher), 1);
    assert_eq!(roots.attached(), 1);
    // steady state: nothing to do
    assert_eq!(roots.maintain(&mut watcher), 0);

    std::fs::remove_dir_all(&root).unwrap();
    assert_eq!(roots.maintain(&mut watcher), 0);
    assert_eq!(roots.attached(), 0);

    std::fs::create_dir_all(&root).unwrap();
    assert_eq!(roots.maintain(&mut watcher), 1);
}

#[test]
fn test_fs_watcher_stops_on_cancel() {
    let tmp = TempDir::new().unwrap();
    let watcher = FsWatcher::new(vec![tmp.path().to_path_buf()], window()).unwrap();
    let shutdown = ShutdownToken::new();
    shutdown.cancel();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let workers = runtime.block_on(async {
        Workers::spawn(Arc::new(Recorder::default()), &ShutdownToken::new())
    });
    // returns at once: the token is already cancelled
    watcher.run(&resolver(), &workers.sender(), &shutdown);
}
