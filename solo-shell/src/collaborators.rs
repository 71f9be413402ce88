//! Seams between the shell and the application it hosts
//!
//! The shell decides *when* things happen (launch, hand-over, activation,
//! shutdown); these traits decide *what* happens. The `solo` binary wires in
//! the headless defaults, tests wire in recorders.

use std::rc::Rc;

use crate::context::LaunchContext;
use crate::crash::{CrashRecoveryOutcome, CrashStatus};
use crate::proxy::{AppliedProxy, ProxyData};

/// A top-level window that can be brought to the foreground
pub trait Window {
    fn activate(&self);

    /// Hidden windows are never activated
    fn is_hidden(&self) -> bool {
        false
    }
}

/// The hosted application
pub trait Application {
    /// Start the application; returns once it is up
    fn run(&mut self);

    /// The primary window, once the application has created one
    fn main_window(&self) -> Option<Rc<dyn Window>>;

    /// File-open handler for paths relayed from other launches
    fn open_files(&mut self, paths: Vec<String>);

    /// Consume the pending start URL if the application is ready for it
    fn check_start_url(&mut self, context: &mut LaunchContext);
}

/// Builds the application once startup has cleared every gate
pub trait ApplicationFactory {
    fn create(&mut self, context: &LaunchContext) -> Box<dyn Application>;
}

/// Decides whether opening a URL should raise the primary window
pub trait UrlPolicy {
    fn requires_activation(&self, url: &str) -> bool;
}

/// Tracks whether the previous run ended cleanly
pub trait CrashReporter {
    /// Inspect what the previous run left behind and start tracking this one
    fn start(&mut self) -> CrashRecoveryOutcome;

    /// Start tracking again after recovering from a previous crash
    fn restart(&mut self) -> CrashStatus;

    /// Mark this run as having exited cleanly
    fn finish(&mut self);
}

/// Reports whether a downloaded update is waiting to be installed
pub trait UpdateChecker {
    fn ready_to_install(&self) -> bool;

    fn stop(&mut self);
}

/// What the user chose in the crash window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashWindowChoice {
    Relaunch,
    Quit,
}

/// Minimal UI available before the application exists
pub trait FallbackUi {
    /// Tell the user the application could not start
    fn show_not_started(&mut self, reason: &str);

    /// Show the crash window for `dump`
    ///
    /// Proxy edits made from the window are reported through `on_proxy_change`.
    fn show_last_crashed(
        &mut self,
        dump: &[u8],
        on_proxy_change: &mut dyn FnMut(ProxyData),
    ) -> CrashWindowChoice;

    /// The window currently shown, if any
    fn pre_launch_window(&self) -> Option<Rc<dyn Window>>;
}

/// Applies the process-wide proxy
pub trait ProxySink {
    fn apply(&mut self, proxy: AppliedProxy);
}

/// Gives another process permission to take the foreground
pub trait ProcessActivator {
    fn activate_process(&self, pid: u64);
}
