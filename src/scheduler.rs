//! Sequential run scheduler.
//!
//! A run walks the test list in order, starting each enabled unit test after
//! a short delay and waiting for its completion before moving on. Everything
//! happens on the caller's thread; unit tests report back through a channel.

use crate::deferred::DeferredQueue;
use crate::logger::{Logger, STARTED_BANNER, STOPPED_BANNER};
use crate::settings::{self, SharedSettings};
use crate::unit_test::{Completion, TestFinished, UnitTest};
use log::{debug, info, warn};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Log file used when none has been configured.
pub const DEFAULT_LOG_FILE_NAME: &str = "pairtestor.log";

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Delay between picking a test and calling its `start()`.
    pub start_delay: Duration,
    /// Directory the log file name is resolved against.
    pub app_dir: PathBuf,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(1),
            app_dir: crate::utils::application_dir(),
        }
    }
}

/// Run options read from the settings store when a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub log_file_name: String,
    pub clear_log_on_start: bool,
    pub break_on_error: bool,
}

impl RunOptions {
    pub fn load(store: &dyn settings::SettingsStore) -> Self {
        let log_file_name = settings::string_value(store, settings::LOG_FILE_NAME_KEY)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
        Self {
            log_file_name,
            clear_log_on_start: settings::bool_value(store, settings::CLEAR_LOG_ON_START_KEY),
            break_on_error: settings::bool_value(store, settings::BREAK_ON_ERROR_KEY),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub value: usize,
    pub maximum: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Why a start request was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefusal {
    AlreadyRunning,
    SamePorts,
    NoEnabledTests,
}

impl fmt::Display for StartRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartRefusal::AlreadyRunning => f.write_str("a run is already in progress"),
            StartRefusal::SamePorts => f.write_str("source and destination ports are the same"),
            StartRefusal::NoEnabledTests => f.write_str("no unit test is enabled"),
        }
    }
}

/// Results of one run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub results: Vec<TestFinished>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Deferred work queued by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    StartTest(usize),
}

/// 顺序测试调度器
pub struct Scheduler {
    tests: Vec<Box<dyn UnitTest>>,
    logger: Rc<Logger>,
    settings: SharedSettings,
    options: SchedulerOptions,
    deferred: DeferredQueue<Deferred>,
    events_tx: flume::Sender<TestFinished>,
    events_rx: flume::Receiver<TestFinished>,
    state: RunState,
    run: u64,
    /// Next list position to look at.
    cursor: usize,
    /// Enabled tests still to report.
    remaining: usize,
    /// List position of the test started last and not yet finished.
    current: Option<usize>,
    progress: Progress,
    controls_enabled: bool,
    pair: (String, String),
    run_options: Option<RunOptions>,
    summary: RunSummary,
    progress_listener: Option<Box<dyn FnMut(Progress)>>,
}

impl Scheduler {
    pub fn new(
        tests: Vec<Box<dyn UnitTest>>,
        logger: Rc<Logger>,
        settings: SharedSettings,
        options: SchedulerOptions,
    ) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            tests,
            logger,
            settings,
            options,
            deferred: DeferredQueue::new(),
            events_tx,
            events_rx,
            state: RunState::Idle,
            run: 0,
            cursor: 0,
            remaining: 0,
            current: None,
            progress: Progress::default(),
            controls_enabled: true,
            pair: (String::new(), String::new()),
            run_options: None,
            summary: RunSummary::default(),
            progress_listener: None,
        }
    }

    /// Registers an observer called whenever the progress changes.
    pub fn on_progress<F>(&mut self, listener: F)
    where
        F: FnMut(Progress) + 'static,
    {
        self.progress_listener = Some(Box::new(listener));
    }

    fn set_progress(&mut self, progress: Progress) {
        self.progress = progress;
        if let Some(listener) = self.progress_listener.as_mut() {
            listener(progress);
        }
    }

    pub fn tests(&self) -> &[Box<dyn UnitTest>] {
        &self.tests
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the pair selection and start controls accept input.
    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// Outcomes of the current or most recent run.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn log_file(&self) -> PathBuf {
        self.logger.file_name()
    }

    fn enabled_count(&self) -> usize {
        self.tests.iter().filter(|t| t.is_enabled()).count()
    }

    /// Starts a run of every enabled test against `src` -> `dst`.
    ///
    /// A refused request leaves the scheduler untouched.
    pub fn request_start(&mut self, src: &str, dst: &str) -> Result<(), StartRefusal> {
        if self.is_running() {
            return Err(StartRefusal::AlreadyRunning);
        }
        if src == dst {
            return Err(StartRefusal::SamePorts);
        }
        let enabled = self.enabled_count();
        if enabled == 0 {
            return Err(StartRefusal::NoEnabledTests);
        }

        let run_options = RunOptions::load(&*self.settings);
        self.run += 1;
        self.remaining = enabled;
        self.set_progress(Progress {
            value: 0,
            maximum: enabled,
        });
        self.pair = (src.to_string(), dst.to_string());
        self.summary = RunSummary::default();
        self.logger
            .set_file_name(self.options.app_dir.join(&run_options.log_file_name));
        self.logger
            .add_content(STARTED_BANNER, run_options.clear_log_on_start);
        info!(
            "Run {} started: {src} -> {dst}, {enabled} test(s), log {}",
            self.run,
            self.logger.file_name().display()
        );
        self.run_options = Some(run_options);
        self.state = RunState::Running;
        self.controls_enabled = false;
        self.advance();
        Ok(())
    }

    /// Picks the next enabled test at or after the cursor and queues its start.
    fn advance(&mut self) {
        while let Some(test) = self.tests.get_mut(self.cursor) {
            let index = self.cursor;
            self.cursor += 1;
            if !test.is_enabled() {
                debug!("Skipping disabled unit test {}", test.name());
                continue;
            }
            test.set_pair(&self.pair.0, &self.pair.1);
            debug!(
                "Unit test {} starts in {:?}",
                test.name(),
                self.options.start_delay
            );
            self.current = Some(index);
            self.deferred.schedule(self.options.start_delay, Deferred::StartTest(index));
            return;
        }

        warn!(
            "Test list exhausted with {} test(s) outstanding, stopping run",
            self.remaining
        );
        self.stop();
    }

    fn dispatch(&mut self, task: Deferred) {
        match task {
            Deferred::StartTest(index) => {
                let completion = Completion::new(
                    self.run,
                    index,
                    self.tests[index].id(),
                    self.events_tx.clone(),
                );
                info!("Starting unit test {}", self.tests[index].name());
                self.tests[index].start(completion);
            }
        }
    }

    /// Handles a completion event.
    pub fn on_test_finished(&mut self, event: TestFinished) {
        if !self.is_running() || event.run != self.run || self.current != Some(event.index) {
            warn!(
                "Ignoring unexpected completion of {} (run {}, index {})",
                event.id, event.run, event.index
            );
            return;
        }

        info!("Unit test {} finished: {}", event.id, event.outcome);
        let failed = event.outcome.is_failure();
        self.current = None;
        self.summary.results.push(event);
        self.remaining -= 1;
        self.set_progress(Progress {
            value: self.progress.maximum - self.remaining,
            maximum: self.progress.maximum,
        });

        let break_on_error = self
            .run_options
            .as_ref()
            .is_some_and(|options| options.break_on_error);
        if self.remaining == 0 {
            self.stop();
        } else if failed && break_on_error {
            info!("Breaking run after failure, {} test(s) skipped", self.remaining);
            self.stop();
        } else {
            self.advance();
        }
    }

    fn stop(&mut self) {
        self.deferred.cancel_all();
        self.controls_enabled = true;
        self.cursor = 0;
        self.current = None;
        self.remaining = 0;
        self.logger.add_content(STOPPED_BANNER, false);
        self.state = RunState::Idle;
        info!(
            "Run {} stopped: {} passed, {} failed",
            self.run,
            self.summary.results.len() - self.summary.failed(),
            self.summary.failed()
        );
    }

    /// Processes at most one pending event or due task. Returns whether
    /// anything was processed.
    pub fn step(&mut self) -> bool {
        if let Ok(event) = self.events_rx.try_recv() {
            self.on_test_finished(event);
            return true;
        }
        if let Some(task) = self.deferred.pop_due(Instant::now()) {
            self.dispatch(task);
            return true;
        }
        false
    }

    /// Processes every due task and pending event without blocking. Returns
    /// whether anything was processed.
    pub fn poll(&mut self) -> bool {
        let mut worked = false;
        while self.step() {
            worked = true;
        }
        worked
    }

    /// Drives the run until the scheduler is idle again.
    ///
    /// Blocks for as long as a started unit test has not reported back.
    pub fn run_until_idle(&mut self) {
        while self.is_running() {
            if self.poll() {
                continue;
            }
            let event = match self.deferred.next_due() {
                Some(due) => match self.events_rx.recv_deadline(due) {
                    Ok(event) => Some(event),
                    Err(flume::RecvTimeoutError::Timeout) => None,
                    // the scheduler holds a sender itself
                    Err(flume::RecvTimeoutError::Disconnected) => None,
                },
                None => self.events_rx.recv().ok(),
            };
            if let Some(event) = event {
                self.on_test_finished(event);
            }
        }
    }
}
