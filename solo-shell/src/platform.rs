//! Platform defaults for foreground handling and pre-launch UI

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{info, warn};

use crate::collaborators::{CrashWindowChoice, FallbackUi, ProcessActivator, Window};
use crate::proxy::ProxyData;

/// Foreground permission is not a thing on Unix; just record the request
#[derive(Debug, Default)]
pub struct LogOnlyActivator;

impl ProcessActivator for LogOnlyActivator {
    fn activate_process(&self, pid: u64) {
        info!("Primary instance {} asked to take the foreground", pid);
    }
}

/// Terminal stand-in for a fallback window
#[derive(Debug)]
pub struct ConsoleWindow {
    title: String,
}

impl ConsoleWindow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl Window for ConsoleWindow {
    fn activate(&self) {
        eprintln!("solo: {}", self.title);
    }
}

/// Fallback UI that reports on stderr
///
/// The crash window never blocks: it prints the report and relaunches.
#[derive(Default)]
pub struct StderrFallbackUi {
    window: RefCell<Option<Rc<ConsoleWindow>>>,
}

impl StderrFallbackUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn show(&self, title: String) {
        let window = Rc::new(ConsoleWindow::new(title));
        window.activate();
        *self.window.borrow_mut() = Some(window);
    }
}

impl FallbackUi for StderrFallbackUi {
    fn show_not_started(&mut self, reason: &str) {
        warn!("Application not started: {}", reason);
        self.show(format!("could not start: {}", reason));
    }

    fn show_last_crashed(
        &mut self,
        dump: &[u8],
        _on_proxy_change: &mut dyn FnMut(ProxyData),
    ) -> CrashWindowChoice {
        let report = String::from_utf8_lossy(dump);
        warn!("Last run crashed: {}", report.trim_end());
        self.show(format!("the last run crashed, relaunching\n{}", report.trim_end()));
        CrashWindowChoice::Relaunch
    }

    fn pre_launch_window(&self) -> Option<Rc<dyn Window>> {
        self.window
            .borrow()
            .as_ref()
            .map(|window| Rc::clone(window) as Rc<dyn Window>)
    }
}
