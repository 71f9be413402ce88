//! Headless application hosted by the `solo` binary
//!
//! Stands in for a GUI: it owns one main window and logs every file and
//! URL handed to it.

use std::cell::Cell;
use std::rc::Rc;

use tracing::info;

use crate::collaborators::{Application, ApplicationFactory, Window};
use crate::context::LaunchContext;

/// Main window of the headless application
#[derive(Debug, Default)]
pub struct HeadlessWindow {
    activations: Cell<usize>,
}

impl HeadlessWindow {
    /// Number of times the window was brought forward
    pub fn activations(&self) -> usize {
        self.activations.get()
    }
}

impl Window for HeadlessWindow {
    fn activate(&self) {
        self.activations.set(self.activations.get() + 1);
        info!("Main window activated");
    }
}

/// Application without a UI
#[derive(Debug, Default)]
pub struct HeadlessApplication {
    window: Option<Rc<HeadlessWindow>>,
    opened_files: Vec<String>,
    opened_urls: Vec<String>,
}

impl HeadlessApplication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened_files(&self) -> &[String] {
        &self.opened_files
    }

    pub fn opened_urls(&self) -> &[String] {
        &self.opened_urls
    }
}

impl Application for HeadlessApplication {
    fn run(&mut self) {
        info!("Application running");
        self.window = Some(Rc::new(HeadlessWindow::default()));
    }

    fn main_window(&self) -> Option<Rc<dyn Window>> {
        self.window
            .as_ref()
            .map(|window| Rc::clone(window) as Rc<dyn Window>)
    }

    fn open_files(&mut self, paths: Vec<String>) {
        for path in paths {
            info!("Opening file {}", path);
            self.opened_files.push(path);
        }
    }

    fn check_start_url(&mut self, context: &mut LaunchContext) {
        if self.window.is_none() {
            return;
        }
        if let Some(url) = context.take_start_url() {
            info!("Opening URL {}", url);
            self.opened_urls.push(url);
        }
    }
}

/// Factory for [`HeadlessApplication`]
#[derive(Debug, Default)]
pub struct HeadlessFactory;

impl ApplicationFactory for HeadlessFactory {
    fn create(&mut self, _context: &LaunchContext) -> Box<dyn Application> {
        Box::new(HeadlessApplication::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_waits_for_run() {
        let mut app = HeadlessApplication::new();
        let mut context = LaunchContext::new(vec![], Some("tg://x".into()));

        app.check_start_url(&mut context);
        assert!(app.opened_urls().is_empty());
        assert_eq!(context.start_url(), Some("tg://x"));

        app.run();
        app.check_start_url(&mut context);
        assert_eq!(app.opened_urls(), ["tg://x"]);
        assert!(context.start_url().is_none());
    }

    #[test]
    fn test_window_after_run() {
        let mut app = HeadlessApplication::new();
        assert!(app.main_window().is_none());
        app.run();
        assert!(app.main_window().is_some());
    }
}
