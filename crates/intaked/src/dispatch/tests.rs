//! Unit tests for classification-driven dispatch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use intake_plugins::{FileProcessor, Operation, PluginError, PluginRegistry};
use mockall::mock;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use time::OffsetDateTime;
use time::macros::datetime;

use super::*;
use crate::archive::{ArchiveError, Archiver, Clock};
use crate::classify::Classifier;
use crate::event_source::FileEvent;
use crate::queue::{CancellationToken, HandoffQueue};

mock! {
    Processor {}
    impl FileProcessor for Processor {
        fn history(&self, path: &Path) -> Result<(), PluginError>;
        fn security(&self, path: &Path) -> Result<(), PluginError>;
        fn complex_analysis(&self, path: &Path) -> Result<(), PluginError>;
    }
}

type CallLog = Arc<Mutex<Vec<(String, Operation, PathBuf)>>>;

/// Processor that appends every call to a shared log.
struct Recorder {
    name: &'static str,
    log: CallLog,
    fail_on: Option<Operation>,
    panic_on: Option<Operation>,
    on_call: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Recorder {
    fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            fail_on: None,
            panic_on: None,
            on_call: None,
        }
    }

    fn failing_on(mut self, operation: Operation) -> Self {
        self.fail_on = Some(operation);
        self
    }

    fn panicking_on(mut self, operation: Operation) -> Self {
        self.panic_on = Some(operation);
        self
    }

    fn with_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    fn record(&self, operation: Operation, path: &Path) -> Result<(), PluginError> {
        self.log
            .lock()
            .expect("call log lock")
            .push((self.name.to_owned(), operation, path.to_path_buf()));
        if let Some(hook) = &self.on_call {
            hook();
        }
        assert_ne!(
            self.panic_on,
            Some(operation),
            "{} crashed during {operation}",
            self.name
        );
        if self.fail_on == Some(operation) {
            return Err(PluginError::failed(format!("{} refused {operation}", self.name)));
        }
        Ok(())
    }
}

impl FileProcessor for Recorder {
    fn history(&self, path: &Path) -> Result<(), PluginError> {
        self.record(Operation::History, path)
    }

    fn security(&self, path: &Path) -> Result<(), PluginError> {
        self.record(Operation::Security, path)
    }

    fn complex_analysis(&self, path: &Path) -> Result<(), PluginError> {
        self.record(Operation::ComplexAnalysis, path)
    }
}

struct FixedClock(OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

const STAMP: &str = "20240611083000";

struct Workspace {
    _root: TempDir,
    inbox: PathBuf,
    archive: PathBuf,
}

impl Workspace {
    fn drop_file(&self, relative: &str) -> PathBuf {
        let path = self.inbox.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create inbox subdirectory");
        }
        fs::write(&path, "<rates/>").expect("write inbox file");
        path
    }

    fn dispatcher(&self, registry: PluginRegistry) -> Dispatcher {
        let clock = Arc::new(FixedClock(datetime!(2024-06-11 08:30:00 UTC)));
        Dispatcher::new(
            Classifier::default(),
            registry,
            Archiver::with_clock(&self.archive, clock),
        )
    }

    fn archived_names(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.archive) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|entry| {
                entry
                    .expect("archive entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

#[fixture]
fn workspace() -> Workspace {
    let root = TempDir::new().expect("temp dir");
    let inbox = root.path().join("a");
    fs::create_dir(&inbox).expect("create inbox");
    let archive = root.path().join("archive");
    Workspace {
        inbox,
        archive,
        _root: root,
    }
}

fn as_plugin(processor: impl FileProcessor + 'static) -> Arc<dyn FileProcessor> {
    Arc::new(processor)
}

fn registry_of(processors: Vec<(&str, Arc<dyn FileProcessor>)>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for (name, processor) in processors {
        registry.register(name, processor).expect("register");
    }
    registry
}

fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn calls(log: &CallLog) -> Vec<(String, Operation, PathBuf)> {
    log.lock().expect("call log lock").clone()
}

fn run_queue(dispatcher: &Dispatcher, paths: &[PathBuf]) -> ConsumerSummary {
    let queue = HandoffQueue::new();
    for path in paths {
        queue.push(FileEvent::new(path.clone())).expect("queue open");
    }
    queue.close();
    dispatcher.run(&queue, &CancellationToken::new())
}

#[rstest]
fn history_file_invokes_history_once_then_archives(workspace: Workspace) {
    let source = workspace.drop_file("ratehistory.xml");
    let expected = source.clone();
    let mut processor = MockProcessor::new();
    processor
        .expect_history()
        .withf(move |path| path == expected.as_path())
        .times(1)
        .returning(|_| Ok(()));
    processor.expect_security().never();
    processor.expect_complex_analysis().never();
    let dispatcher = workspace.dispatcher(registry_of(vec![("rates", as_plugin(processor))]));

    let summary = run_queue(&dispatcher, &[source.clone()]);

    assert_eq!(summary.archived, 1);
    assert!(!source.exists(), "file should leave the inbox");
    assert_eq!(
        workspace.archived_names(),
        vec![format!("ratehistory_{STAMP}.xml")]
    );
}

#[rstest]
fn limits_file_runs_security_then_complex_analysis_on_every_plugin(workspace: Workspace) {
    let source = workspace.drop_file("RateLimits.xml");
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![
        ("first", as_plugin(Recorder::new("first", &log))),
        ("second", as_plugin(Recorder::new("second", &log))),
    ]));

    let report = dispatcher.dispatch(&FileEvent::new(source.clone()), &CancellationToken::new());

    let expected = vec![
        ("first".to_owned(), Operation::Security, source.clone()),
        ("second".to_owned(), Operation::Security, source.clone()),
        ("first".to_owned(), Operation::ComplexAnalysis, source.clone()),
        ("second".to_owned(), Operation::ComplexAnalysis, source.clone()),
    ];
    assert_eq!(calls(&log), expected);
    assert_eq!(report.state(), FileState::Archived);
    assert_eq!(
        workspace.archived_names(),
        vec![format!("RateLimits_{STAMP}.xml")]
    );
}

#[rstest]
fn failing_plugin_does_not_block_others_or_archiving(workspace: Workspace) {
    let source = workspace.drop_file("ratehistory.xml");
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![
        (
            "flaky",
            as_plugin(Recorder::new("flaky", &log).failing_on(Operation::History)),
        ),
        ("steady", as_plugin(Recorder::new("steady", &log))),
    ]));

    let report = dispatcher.dispatch(&FileEvent::new(source.clone()), &CancellationToken::new());

    let invoked: Vec<String> = calls(&log).into_iter().map(|(name, _, _)| name).collect();
    assert_eq!(invoked, vec!["flaky", "steady"]);
    assert_eq!(report.failures(), 1);
    let failed = report
        .outcomes()
        .iter()
        .find(|outcome| !outcome.succeeded())
        .expect("one failure recorded");
    assert_eq!(failed.plugin(), "flaky");
    assert_eq!(failed.operation(), Operation::History);
    assert!(matches!(failed.result(), Err(PluginError::Failed { .. })));
    assert!(matches!(report.disposition(), Disposition::Archived(_)));
    assert!(!source.exists());
}

#[rstest]
fn panicking_plugin_is_isolated_and_the_queue_keeps_draining(workspace: Workspace) {
    let history = workspace.drop_file("ratehistory.xml");
    let limits = workspace.drop_file("ratelimits.xml");
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![
        (
            "crashy",
            as_plugin(Recorder::new("crashy", &log).panicking_on(Operation::History)),
        ),
        ("steady", as_plugin(Recorder::new("steady", &log))),
    ]));

    let report = dispatcher.dispatch(&FileEvent::new(history.clone()), &CancellationToken::new());
    let summary = run_queue(&dispatcher, &[limits.clone()]);

    let panicked = report
        .outcomes()
        .iter()
        .find(|outcome| !outcome.succeeded())
        .expect("panic recorded as a failure");
    assert_eq!(panicked.plugin(), "crashy");
    assert!(matches!(
        panicked.result(),
        Err(PluginError::Panicked { operation: Operation::History, .. })
    ));
    assert_eq!(report.failures(), 1);
    assert_eq!(report.state(), FileState::Archived);
    assert_eq!(summary.archived, 1);
    let invoked: Vec<(String, Operation)> = calls(&log)
        .into_iter()
        .map(|(name, operation, _)| (name, operation))
        .collect();
    assert_eq!(
        invoked,
        vec![
            ("crashy".to_owned(), Operation::History),
            ("steady".to_owned(), Operation::History),
            ("crashy".to_owned(), Operation::Security),
            ("steady".to_owned(), Operation::Security),
            ("crashy".to_owned(), Operation::ComplexAnalysis),
            ("steady".to_owned(), Operation::ComplexAnalysis),
        ]
    );
    assert!(!history.exists());
    assert!(!limits.exists());
}

#[rstest]
fn failure_in_security_still_runs_complex_analysis(workspace: Workspace) {
    let source = workspace.drop_file("ratelimits.xml");
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![(
        "rates",
        as_plugin(Recorder::new("rates", &log).failing_on(Operation::Security)),
    )]));

    let report = dispatcher.dispatch(&FileEvent::new(source), &CancellationToken::new());

    let operations: Vec<Operation> = calls(&log).into_iter().map(|(_, op, _)| op).collect();
    assert_eq!(
        operations,
        vec![Operation::Security, Operation::ComplexAnalysis]
    );
    assert_eq!(report.state(), FileState::Archived);
}

#[rstest]
fn unrecognized_file_is_left_untouched(workspace: Workspace) {
    let source = workspace.drop_file("unknown.xml");
    let mut processor = MockProcessor::new();
    processor.expect_history().never();
    processor.expect_security().never();
    processor.expect_complex_analysis().never();
    let dispatcher = workspace.dispatcher(registry_of(vec![("rates", as_plugin(processor))]));

    let summary = run_queue(&dispatcher, &[source.clone()]);

    assert_eq!(summary.unrecognized, 1);
    assert_eq!(summary.archived, 0);
    assert!(source.exists(), "unrecognized file stays in place");
    assert!(workspace.archived_names().is_empty());
}

#[rstest]
fn empty_registry_still_archives_recognised_files(workspace: Workspace) {
    let source = workspace.drop_file("ratehistory.xml");
    let dispatcher = workspace.dispatcher(PluginRegistry::new());

    let report = dispatcher.dispatch(&FileEvent::new(source.clone()), &CancellationToken::new());

    assert!(report.outcomes().is_empty());
    assert_eq!(report.state(), FileState::Archived);
    assert!(!source.exists());
}

#[rstest]
fn consumer_dispatches_in_queue_order(workspace: Workspace) {
    let paths: Vec<PathBuf> = ["one", "two", "three", "four"]
        .iter()
        .map(|dir| workspace.drop_file(&format!("{dir}/ratehistory.xml")))
        .collect();
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![(
        "rates",
        as_plugin(Recorder::new("rates", &log)),
    )]));

    let summary = run_queue(&dispatcher, &paths);

    let seen: Vec<PathBuf> = calls(&log).into_iter().map(|(_, _, path)| path).collect();
    assert_eq!(seen, paths);
    assert_eq!(summary.dispatched, 4);
    // Same name, same second: only the first reaches the archive.
    assert_eq!(summary.archived, 1);
    assert_eq!(summary.failed, 3);
}

#[rstest]
fn same_second_collision_leaves_second_file_and_is_not_retried(workspace: Workspace) {
    let first = workspace.drop_file("x/ratehistory.xml");
    let second = workspace.drop_file("y/ratehistory.xml");
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![(
        "rates",
        as_plugin(Recorder::new("rates", &log)),
    )]));

    let first_report = dispatcher.dispatch(&FileEvent::new(first.clone()), &CancellationToken::new());
    let second_report =
        dispatcher.dispatch(&FileEvent::new(second.clone()), &CancellationToken::new());

    assert_eq!(first_report.state(), FileState::Archived);
    assert!(matches!(
        second_report.disposition(),
        Disposition::ArchiveFailed(ArchiveError::DestinationExists { .. })
    ));
    assert!(!first.exists());
    assert!(second.exists(), "colliding file stays in the inbox");
    assert_eq!(calls(&log).len(), 2, "each file is dispatched exactly once");
}

#[rstest]
fn archive_failure_is_reported_without_retry(workspace: Workspace) {
    let source = workspace.drop_file("ratehistory.xml");
    let doomed = source.clone();
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![(
        "consumer",
        as_plugin(Recorder::new("consumer", &log).with_hook(move || {
            drop(fs::remove_file(&doomed));
        })),
    )]));

    let summary = run_queue(&dispatcher, &[source]);

    assert_eq!(summary.failed, 1);
    assert_eq!(calls(&log).len(), 1);
    assert!(workspace.archived_names().is_empty());
}

#[rstest]
fn cancellation_stops_new_invocations_and_leaves_queue(workspace: Workspace) {
    let first = workspace.drop_file("p/ratelimits.xml");
    let second = workspace.drop_file("q/ratehistory.xml");
    let token = CancellationToken::new();
    let hook_token = token.clone();
    let log = new_log();
    let dispatcher = workspace.dispatcher(registry_of(vec![
        (
            "stopper",
            as_plugin(Recorder::new("stopper", &log).with_hook(move || hook_token.cancel())),
        ),
        ("bystander", as_plugin(Recorder::new("bystander", &log))),
    ]));
    let queue = HandoffQueue::new();
    queue.push(FileEvent::new(first.clone())).expect("queue open");
    queue.push(FileEvent::new(second.clone())).expect("queue open");

    let summary = dispatcher.run(&queue, &token);

    let invoked: Vec<(String, Operation)> = calls(&log)
        .into_iter()
        .map(|(name, op, _)| (name, op))
        .collect();
    assert_eq!(invoked, vec![("stopper".to_owned(), Operation::Security)]);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(queue.len(), 1, "second file remains queued");
    assert!(first.exists(), "interrupted file stays in place");
    assert!(second.exists());
}

#[test]
fn file_states_have_stable_labels() {
    let labels: Vec<&str> = [
        FileState::Unrecognized,
        FileState::Classified,
        FileState::Dispatching,
        FileState::Archived,
        FileState::Failed,
    ]
    .iter()
    .map(|state| state.as_str())
    .collect();
    assert_eq!(
        labels,
        vec!["unrecognized", "classified", "dispatching", "archived", "failed"]
    );
}
