//! Recording collaborators for tests

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use tempfile::TempDir;

use solo_utils::LogHandle;

use crate::collaborators::{
    Application, ApplicationFactory, CrashReporter, CrashWindowChoice, FallbackUi, ProxySink,
    UpdateChecker, Window,
};
use crate::context::LaunchContext;
use crate::crash::{CrashRecoveryOutcome, CrashStatus};
use crate::lifecycle::{Collaborators, EndpointTeardown, GateOptions, LifecycleGate, LogSetup};
use crate::nesting::NestingTracker;
use crate::proxy::{AppliedProxy, ProxyData};

#[derive(Default)]
pub struct RecordingWindow {
    pub activations: Cell<usize>,
}

impl Window for RecordingWindow {
    fn activate(&self) {
        self.activations.set(self.activations.get() + 1);
    }
}

#[derive(Default)]
pub struct AppRecord {
    pub runs: usize,
    pub opened_files: Vec<String>,
    pub opened_urls: Vec<String>,
    pub dropped: bool,
}

struct RecordingApp {
    record: Rc<RefCell<AppRecord>>,
    window: Rc<RecordingWindow>,
    running: bool,
}

impl Application for RecordingApp {
    fn run(&mut self) {
        self.record.borrow_mut().runs += 1;
        self.running = true;
    }

    fn main_window(&self) -> Option<Rc<dyn Window>> {
        self.running
            .then(|| Rc::clone(&self.window) as Rc<dyn Window>)
    }

    fn open_files(&mut self, paths: Vec<String>) {
        self.record.borrow_mut().opened_files.extend(paths);
    }

    fn check_start_url(&mut self, context: &mut LaunchContext) {
        if !self.running {
            return;
        }
        if let Some(url) = context.take_start_url() {
            self.record.borrow_mut().opened_urls.push(url);
        }
    }
}

impl Drop for RecordingApp {
    fn drop(&mut self) {
        self.record.borrow_mut().dropped = true;
    }
}

struct RecordingFactory {
    record: Rc<RefCell<AppRecord>>,
    window: Rc<RecordingWindow>,
}

impl ApplicationFactory for RecordingFactory {
    fn create(&mut self, _context: &LaunchContext) -> Box<dyn Application> {
        Box::new(RecordingApp {
            record: Rc::clone(&self.record),
            window: Rc::clone(&self.window),
            running: false,
        })
    }
}

struct ScriptedCrash {
    outcome: CrashRecoveryOutcome,
    restart_status: CrashStatus,
    calls: Rc<RefCell<Vec<&'static str>>>,
}

impl CrashReporter for ScriptedCrash {
    fn start(&mut self) -> CrashRecoveryOutcome {
        self.calls.borrow_mut().push("start");
        self.outcome.clone()
    }

    fn restart(&mut self) -> CrashStatus {
        self.calls.borrow_mut().push("restart");
        self.restart_status
    }

    fn finish(&mut self) {
        self.calls.borrow_mut().push("finish");
    }
}

struct FlagUpdater {
    ready: bool,
    stopped: Rc<Cell<bool>>,
}

impl UpdateChecker for FlagUpdater {
    fn ready_to_install(&self) -> bool {
        self.ready
    }

    fn stop(&mut self) {
        self.stopped.set(true);
    }
}

#[derive(Default)]
pub struct UiRecord {
    pub not_started: Vec<String>,
    pub crash_dumps: Vec<Vec<u8>>,
    pub fallback_window: Rc<RecordingWindow>,
    pub showing: bool,
}

struct RecordingUi {
    record: Rc<RefCell<UiRecord>>,
    choice: CrashWindowChoice,
    proxy_change: Option<ProxyData>,
}

impl FallbackUi for RecordingUi {
    fn show_not_started(&mut self, reason: &str) {
        let mut record = self.record.borrow_mut();
        record.not_started.push(reason.to_string());
        record.showing = true;
    }

    fn show_last_crashed(
        &mut self,
        dump: &[u8],
        on_proxy_change: &mut dyn FnMut(ProxyData),
    ) -> CrashWindowChoice {
        {
            let mut record = self.record.borrow_mut();
            record.crash_dumps.push(dump.to_vec());
            record.showing = true;
        }
        if let Some(proxy) = self.proxy_change.clone() {
            on_proxy_change(proxy);
        }
        self.choice
    }

    fn pre_launch_window(&self) -> Option<Rc<dyn Window>> {
        let record = self.record.borrow();
        record
            .showing
            .then(|| Rc::clone(&record.fallback_window) as Rc<dyn Window>)
    }
}

struct SharedProxySink(Rc<RefCell<Vec<AppliedProxy>>>);

impl ProxySink for SharedProxySink {
    fn apply(&mut self, proxy: AppliedProxy) {
        self.0.borrow_mut().push(proxy);
    }
}

/// Teardown that records the order of calls
#[derive(Default)]
pub struct RecordingTeardown {
    pub calls: Vec<&'static str>,
}

impl EndpointTeardown for RecordingTeardown {
    fn close_listener(&mut self) {
        self.calls.push("listener");
    }

    fn close_clients(&mut self) {
        self.calls.push("clients");
    }

    fn close_client_connection(&mut self) {
        self.calls.push("client_connection");
    }
}

/// Builds gates wired to recorders in a private temp directory
pub struct Harness {
    pub dir: TempDir,
    pub options: GateOptions,
    pub crash_outcome: CrashRecoveryOutcome,
    pub restart_status: CrashStatus,
    pub crash_choice: CrashWindowChoice,
    pub crash_window_proxy: Option<ProxyData>,
    pub update_ready: bool,
    pub context: LaunchContext,
    pub app: Rc<RefCell<AppRecord>>,
    pub window: Rc<RecordingWindow>,
    pub ui: Rc<RefCell<UiRecord>>,
    pub crash_calls: Rc<RefCell<Vec<&'static str>>>,
    pub proxies: Rc<RefCell<Vec<AppliedProxy>>>,
    pub updater_stopped: Rc<Cell<bool>>,
    pub log_handle: LogHandle,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            options: GateOptions {
                start_update: true,
                ..Default::default()
            },
            crash_outcome: CrashRecoveryOutcome::NoDump,
            restart_status: CrashStatus::Ok,
            crash_choice: CrashWindowChoice::Relaunch,
            crash_window_proxy: None,
            update_ready: false,
            context: LaunchContext::default(),
            app: Rc::default(),
            window: Rc::default(),
            ui: Rc::default(),
            crash_calls: Rc::default(),
            proxies: Rc::default(),
            updater_stopped: Rc::default(),
            log_handle: LogHandle::default(),
        }
    }

    pub fn with_update_ready(mut self) -> Self {
        self.update_ready = true;
        self
    }

    pub fn with_crash(mut self, outcome: CrashRecoveryOutcome) -> Self {
        self.crash_outcome = outcome;
        self
    }

    pub fn with_crash_window_proxy(mut self, proxy: ProxyData) -> Self {
        self.crash_window_proxy = Some(proxy);
        self
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir.path().join("log").join("solo.log")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.dir.path().join("log").join("solo.lock")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("solo-test.sock")
    }

    pub fn gate(&self) -> LifecycleGate {
        let collaborators = Collaborators {
            factory: Box::new(RecordingFactory {
                record: Rc::clone(&self.app),
                window: Rc::clone(&self.window),
            }),
            crash: Box::new(ScriptedCrash {
                outcome: self.crash_outcome.clone(),
                restart_status: self.restart_status,
                calls: Rc::clone(&self.crash_calls),
            }),
            updater: Some(Box::new(FlagUpdater {
                ready: self.update_ready,
                stopped: Rc::clone(&self.updater_stopped),
            })),
            ui: Box::new(RecordingUi {
                record: Rc::clone(&self.ui),
                choice: self.crash_choice,
                proxy_change: self.crash_window_proxy.clone(),
            }),
            proxy_sink: Box::new(SharedProxySink(Rc::clone(&self.proxies))),
        };
        let logs = LogSetup {
            handle: self.log_handle.clone(),
            log_file: self.log_file(),
            lock_file: self.lock_file(),
        };
        LifecycleGate::new(
            self.context.clone(),
            NestingTracker::new(),
            collaborators,
            logs,
            self.options.clone(),
        )
    }
}
