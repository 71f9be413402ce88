//! Startup and shutdown sequencing of the primary instance
//!
//! Once this launch owns the endpoint, the gate decides whether the
//! application may start at all (pending update, log writer, crash recovery),
//! builds it, hands it whatever earlier launches relayed, and later tears
//! everything down exactly once.

use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use solo_protocol::SHOW_COMMAND;
use solo_utils::{LogHandle, Result, WriterLock};

use crate::collaborators::{
    Application, ApplicationFactory, CrashReporter, CrashWindowChoice, FallbackUi, ProxySink,
    UpdateChecker,
};
use crate::context::LaunchContext;
use crate::crash::{CrashRecoveryOutcome, CrashStatus};
use crate::endpoint::InstanceMode;
use crate::nesting::NestingTracker;
use crate::proxy::{select_global_proxy, LoadedProxy, ProxyData, ProxySettings};
use crate::relay::RelayActions;

/// Where the primary is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Running,
    Quitting,
    QuitProcessed,
}

/// How startup ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The application is running
    Launched,
    /// A downloaded update replaces this launch
    InstallingUpdate,
    /// Startup failed and the fallback window was shown
    NotStarted,
    /// Quit was requested before the application started
    Quit,
}

/// Everything the gate delegates to
pub struct Collaborators {
    pub factory: Box<dyn ApplicationFactory>,
    pub crash: Box<dyn CrashReporter>,
    /// `None` when updates are disabled
    pub updater: Option<Box<dyn UpdateChecker>>,
    pub ui: Box<dyn FallbackUi>,
    pub proxy_sink: Box<dyn ProxySink>,
}

/// Log file routing for the primary
pub struct LogSetup {
    pub handle: LogHandle,
    pub log_file: PathBuf,
    /// Lock guarding the profile's shared log file
    pub lock_file: PathBuf,
}

/// Gate settings resolved from CLI and config
#[derive(Debug, Clone, Default)]
pub struct GateOptions {
    pub mode: InstanceMode,
    pub start_update: bool,
    pub proxy_settings: ProxySettings,
    pub proxy: ProxyData,
}

/// Transport resources released on shutdown
pub trait EndpointTeardown {
    /// Stop listening and release the endpoint name
    fn close_listener(&mut self);

    /// Close and forget every accepted connection
    fn close_clients(&mut self);

    /// Close the connection this launch holds to another primary
    fn close_client_connection(&mut self) {}
}

/// Sequences the primary's startup and shutdown
pub struct LifecycleGate {
    context: LaunchContext,
    nesting: Rc<NestingTracker>,
    collaborators: Collaborators,
    application: Option<Box<dyn Application>>,
    logs: LogSetup,
    writer_lock: Option<WriterLock>,
    options: GateOptions,
    state: LaunchState,
    restarting_update: bool,
    crash_tracking: bool,
}

impl LifecycleGate {
    pub fn new(
        mut context: LaunchContext,
        nesting: Rc<NestingTracker>,
        collaborators: Collaborators,
        logs: LogSetup,
        options: GateOptions,
    ) -> Self {
        if options.proxy_settings == ProxySettings::Enabled {
            context.set_sandbox_proxy(options.proxy.clone());
        }
        Self {
            context,
            nesting,
            collaborators,
            application: None,
            logs,
            writer_lock: None,
            options,
            state: LaunchState::Running,
            restarting_update: false,
            crash_tracking: false,
        }
    }

    pub fn context(&self) -> &LaunchContext {
        &self.context
    }

    pub fn nesting(&self) -> Rc<NestingTracker> {
        Rc::clone(&self.nesting)
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    pub fn is_quitting(&self) -> bool {
        self.state != LaunchState::Running
    }

    pub fn has_application(&self) -> bool {
        self.application.is_some()
    }

    /// Whether this launch quit to install an update
    pub fn restarting_update(&self) -> bool {
        self.restarting_update
    }

    /// Run startup after this launch became the primary
    pub fn primary_started(&mut self) -> StartupOutcome {
        if !self.options.mode.is_multi() && self.options.start_update {
            let ready = self
                .collaborators
                .updater
                .as_ref()
                .is_some_and(|updater| updater.ready_to_install());
            if ready {
                info!("Update is ready to install, quitting to install it");
                self.restarting_update = true;
                self.request_quit();
                return StartupOutcome::InstallingUpdate;
            }
        }
        self.single_instance_checked()
    }

    /// Continue startup once no other primary owns this profile
    pub fn single_instance_checked(&mut self) -> StartupOutcome {
        if self.options.mode.is_multi() {
            info!("Many instances allowed, starting...");
        }

        self.refresh_global_proxy();

        if let Err(e) = self.start_logging() {
            error!("Could not start logging: {}", e);
            return self.not_started(&e.to_string());
        }

        match self.collaborators.crash.start() {
            CrashRecoveryOutcome::NoDump => {
                self.crash_tracking = true;
                self.launch_application()
            }
            CrashRecoveryOutcome::DumpOpenFailed => self.not_started("could not open crash state"),
            CrashRecoveryOutcome::DumpEmpty => {
                // Unclean exit without a report, nothing to show
                match self.collaborators.crash.restart() {
                    CrashStatus::CantOpen => self.not_started("could not open crash state"),
                    CrashStatus::Ok => {
                        self.crash_tracking = true;
                        self.launch_application()
                    }
                }
            }
            CrashRecoveryOutcome::DumpWithContent(dump) => self.recover_from_crash(&dump),
        }
    }

    fn recover_from_crash(&mut self, dump: &[u8]) -> StartupOutcome {
        let mut proxy_change = None;
        let choice = self
            .collaborators
            .ui
            .show_last_crashed(dump, &mut |proxy| proxy_change = Some(proxy));

        if let Some(proxy) = proxy_change {
            self.context.set_sandbox_proxy(proxy);
            self.refresh_global_proxy();
        }

        match choice {
            CrashWindowChoice::Relaunch => {
                match self.collaborators.crash.restart() {
                    CrashStatus::Ok => self.crash_tracking = true,
                    CrashStatus::CantOpen => warn!("Crash tracking unavailable for this run"),
                }
                self.launch_application()
            }
            CrashWindowChoice::Quit => {
                self.request_quit();
                StartupOutcome::Quit
            }
        }
    }

    fn not_started(&mut self, reason: &str) -> StartupOutcome {
        self.collaborators.ui.show_not_started(reason);
        StartupOutcome::NotStarted
    }

    /// Route logs to the profile log file, claiming it unless multi-instance
    fn start_logging(&mut self) -> Result<()> {
        if !self.options.mode.is_multi() && self.writer_lock.is_none() {
            let lock = WriterLock::acquire(&self.logs.lock_file)?;
            debug!("Log writer lock held at {}", lock.path().display());
            self.writer_lock = Some(lock);
        }
        self.logs.handle.attach_file(&self.logs.log_file)?;
        info!("Logging to {}", self.logs.log_file.display());
        Ok(())
    }

    /// Apply the proxy matching the current settings
    pub fn refresh_global_proxy(&mut self) {
        let loaded = self.application.as_ref().map(|_| LoadedProxy {
            settings: self.options.proxy_settings,
            selected: &self.options.proxy,
        });
        let applied = select_global_proxy(self.context.sandbox_proxy(), loaded);
        self.collaborators.proxy_sink.apply(applied);
    }

    /// Build and run the application, then hand it everything relayed so far
    pub fn launch_application(&mut self) -> StartupOutcome {
        if self.application.is_some() {
            return StartupOutcome::Launched;
        }
        if self.is_quitting() {
            info!("Quit requested before launch");
            return StartupOutcome::Quit;
        }

        let mut application = self.collaborators.factory.create(&self.context);
        application.run();
        self.application = Some(application);

        self.refresh_global_proxy();
        self.deliver_pending();
        StartupOutcome::Launched
    }

    /// Apply what a relayed batch asked for
    pub fn apply_actions(&mut self, actions: RelayActions) {
        for name in &actions.external {
            self.exec_external(name);
        }
        if !actions.send_paths.is_empty() {
            self.context.queue_send_paths(actions.send_paths);
        }
        if let Some(url) = actions.start_url {
            self.context.set_start_url(url);
        }
        self.deliver_pending();
    }

    /// Hand queued paths and the start URL to the application, if it is ready
    fn deliver_pending(&mut self) {
        let Some(application) = self.application.as_mut() else {
            return;
        };
        if self.context.has_send_paths() && application.main_window().is_some() {
            application.open_files(self.context.take_send_paths());
        }
        application.check_start_url(&mut self.context);
    }

    /// Execute an external command relayed by a secondary
    pub fn exec_external(&mut self, name: &str) {
        if name != SHOW_COMMAND {
            debug!("Ignoring external command {:?}", name);
            return;
        }

        let window = self
            .application
            .as_ref()
            .and_then(|application| application.main_window())
            .or_else(|| self.collaborators.ui.pre_launch_window());
        match window {
            Some(window) => self.nesting.activate_window_delayed(window),
            None => debug!("No window to show yet"),
        }
    }

    /// Ask the event loop to stop
    pub fn request_quit(&mut self) {
        if self.state == LaunchState::Running {
            info!("Quit requested");
            self.state = LaunchState::Quitting;
        }
    }

    /// Tear everything down; later calls do nothing and return `false`
    pub fn close_application(&mut self, endpoints: &mut dyn EndpointTeardown) -> bool {
        if self.state == LaunchState::QuitProcessed {
            return false;
        }
        self.state = LaunchState::QuitProcessed;
        info!("Closing application");

        self.application = None;

        endpoints.close_listener();
        endpoints.close_clients();
        endpoints.close_client_connection();

        if let Some(mut updater) = self.collaborators.updater.take() {
            updater.stop();
        }

        if self.crash_tracking {
            self.collaborators.crash.finish();
            self.crash_tracking = false;
        }
        if self.logs.handle.is_started() {
            info!("Closing log file {}", self.logs.log_file.display());
            self.logs.handle.detach_file();
        }
        self.writer_lock = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{AppliedProxy, ProxyKind};
    use crate::test_support::{Harness, RecordingTeardown};

    #[test]
    fn test_clean_start_launches_application() {
        let harness = Harness::new();
        let mut gate = harness.gate();

        assert_eq!(gate.primary_started(), StartupOutcome::Launched);
        assert!(gate.has_application());
        assert_eq!(harness.app.borrow().runs, 1);
        assert!(harness.log_file().exists());
    }

    #[test]
    fn test_ready_update_skips_launch() {
        let harness = Harness::new().with_update_ready();
        let mut gate = harness.gate();

        assert_eq!(gate.primary_started(), StartupOutcome::InstallingUpdate);
        assert!(gate.restarting_update());
        assert!(gate.is_quitting());
        assert_eq!(harness.app.borrow().runs, 0);
    }

    #[test]
    fn test_no_start_update_ignores_ready_update() {
        let mut harness = Harness::new().with_update_ready();
        harness.options.start_update = false;
        let mut gate = harness.gate();
        assert_eq!(gate.primary_started(), StartupOutcome::Launched);
    }

    #[test]
    fn test_locked_profile_shows_not_started() {
        let harness = Harness::new();
        let _other_writer = WriterLock::acquire(&harness.lock_file()).unwrap();
        let mut gate = harness.gate();

        assert_eq!(gate.primary_started(), StartupOutcome::NotStarted);
        assert_eq!(harness.ui.borrow().not_started.len(), 1);
        assert!(!gate.has_application());
    }

    #[test]
    fn test_multi_instance_skips_writer_lock() {
        let mut harness = Harness::new().with_update_ready();
        harness.options.mode = InstanceMode::Multi;
        let _other_writer = WriterLock::acquire(&harness.lock_file()).unwrap();
        let mut gate = harness.gate();

        assert_eq!(gate.primary_started(), StartupOutcome::Launched);
    }

    #[test]
    fn test_crash_open_failure_shows_not_started() {
        let harness = Harness::new().with_crash(CrashRecoveryOutcome::DumpOpenFailed);
        let mut gate = harness.gate();
        assert_eq!(gate.primary_started(), StartupOutcome::NotStarted);
    }

    #[test]
    fn test_empty_dump_restarts_and_launches() {
        let harness = Harness::new().with_crash(CrashRecoveryOutcome::DumpEmpty);
        let mut gate = harness.gate();

        assert_eq!(gate.primary_started(), StartupOutcome::Launched);
        assert_eq!(*harness.crash_calls.borrow(), vec!["start", "restart"]);
    }

    #[test]
    fn test_empty_dump_restart_failure() {
        let mut harness = Harness::new().with_crash(CrashRecoveryOutcome::DumpEmpty);
        harness.restart_status = CrashStatus::CantOpen;
        let mut gate = harness.gate();
        assert_eq!(gate.primary_started(), StartupOutcome::NotStarted);
    }

    #[test]
    fn test_crash_window_proxy_change_refreshes_proxy() {
        let socks = ProxyData {
            kind: ProxyKind::Socks5,
            host: "10.0.0.1".into(),
            port: 1080,
            ..Default::default()
        };
        let harness = Harness::new()
            .with_crash(CrashRecoveryOutcome::DumpWithContent(b"boom".to_vec()))
            .with_crash_window_proxy(socks.clone());
        let mut gate = harness.gate();

        assert_eq!(gate.primary_started(), StartupOutcome::Launched);
        let applied = harness.proxies.borrow();
        assert_eq!(applied[0], AppliedProxy::System);
        assert_eq!(applied[1], AppliedProxy::Application(socks));
        assert_eq!(harness.ui.borrow().crash_dumps, vec![b"boom".to_vec()]);
    }

    #[test]
    fn test_crash_window_quit() {
        let mut harness =
            Harness::new().with_crash(CrashRecoveryOutcome::DumpWithContent(b"boom".to_vec()));
        harness.crash_choice = CrashWindowChoice::Quit;
        let mut gate = harness.gate();

        assert_eq!(gate.primary_started(), StartupOutcome::Quit);
        assert_eq!(gate.state(), LaunchState::Quitting);
        assert_eq!(harness.app.borrow().runs, 0);
    }

    #[test]
    fn test_loaded_settings_decide_proxy_after_launch() {
        let mut harness = Harness::new();
        harness.options.proxy_settings = ProxySettings::Disabled;
        let mut gate = harness.gate();

        gate.primary_started();
        let applied = harness.proxies.borrow();
        assert_eq!(applied.first(), Some(&AppliedProxy::System));
        assert_eq!(applied.last(), Some(&AppliedProxy::NoProxy));
    }

    #[test]
    fn test_relayed_url_before_launch_is_flushed() {
        let harness = Harness::new();
        let mut gate = harness.gate();

        gate.apply_actions(RelayActions {
            external: vec!["show".into()],
            send_paths: vec!["/tmp/a.txt".into()],
            start_url: Some("tg://early".into()),
        });
        assert_eq!(gate.context().start_url(), Some("tg://early"));
        assert_eq!(gate.context().send_paths(), ["/tmp/a.txt"]);

        gate.primary_started();
        let app = harness.app.borrow();
        assert_eq!(app.opened_urls, vec!["tg://early"]);
        assert_eq!(app.opened_files, vec!["/tmp/a.txt"]);
        assert!(gate.context().start_url().is_none());
    }

    #[test]
    fn test_launch_is_noop_when_running() {
        let harness = Harness::new();
        let mut gate = harness.gate();
        gate.primary_started();
        assert_eq!(gate.launch_application(), StartupOutcome::Launched);
        assert_eq!(harness.app.borrow().runs, 1);
    }

    #[test]
    fn test_show_activates_main_window_after_dispatch() {
        let harness = Harness::new();
        let mut gate = harness.gate();
        gate.primary_started();

        let nesting = gate.nesting();
        {
            let _dispatch = nesting.dispatch();
            gate.exec_external("show");
            gate.exec_external("quit");
            assert_eq!(harness.window.activations.get(), 0);
        }
        assert_eq!(harness.window.activations.get(), 1);
    }

    #[test]
    fn test_show_before_launch_uses_fallback_window() {
        let harness = Harness::new();
        let _other_writer = WriterLock::acquire(&harness.lock_file()).unwrap();
        let mut gate = harness.gate();
        gate.primary_started();

        gate.exec_external("show");
        assert_eq!(harness.ui.borrow().fallback_window.activations.get(), 1);
    }

    #[test]
    fn test_close_application_is_idempotent() {
        let harness = Harness::new();
        let mut gate = harness.gate();
        gate.primary_started();

        let mut teardown = RecordingTeardown::default();
        assert!(gate.close_application(&mut teardown));
        assert!(!gate.close_application(&mut teardown));

        assert_eq!(teardown.calls, vec!["listener", "clients", "client_connection"]);
        assert_eq!(gate.state(), LaunchState::QuitProcessed);
        assert!(harness.app.borrow().dropped);
        assert!(harness.updater_stopped.get());
        assert_eq!(*harness.crash_calls.borrow(), vec!["start", "finish"]);
    }

    #[test]
    fn test_close_releases_writer_lock() {
        let harness = Harness::new();
        let mut gate = harness.gate();
        gate.primary_started();
        gate.close_application(&mut RecordingTeardown::default());

        assert!(WriterLock::acquire(&harness.lock_file()).is_ok());
    }

    #[test]
    fn test_close_detaches_log_file() {
        let mut harness = Harness::new();
        harness.log_handle = LogHandle::file_backed();
        let mut gate = harness.gate();

        gate.primary_started();
        assert!(harness.log_handle.is_started());

        gate.close_application(&mut RecordingTeardown::default());
        assert!(!harness.log_handle.is_started());
    }

    #[test]
    fn test_launch_after_quit_request_does_nothing() {
        let harness = Harness::new();
        let mut gate = harness.gate();
        gate.request_quit();
        assert_eq!(gate.launch_application(), StartupOutcome::Quit);
        assert!(!gate.has_application());
    }
}
