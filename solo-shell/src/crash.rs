//! Crash detection through a running-marker file
//!
//! The marker exists for as long as the primary runs. A clean shutdown
//! removes it, so finding one at startup means the previous run died. A
//! panic writes its message into the marker before the process goes down.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::collaborators::CrashReporter;

/// What the previous run left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashRecoveryOutcome {
    /// Previous run exited cleanly
    NoDump,
    /// The crash state could not be read or written
    DumpOpenFailed,
    /// Previous run died without recording anything
    DumpEmpty,
    /// Previous run recorded a crash report
    DumpWithContent(Vec<u8>),
}

/// Result of (re)starting crash tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashStatus {
    Ok,
    CantOpen,
}

/// Crash reporter backed by a marker file in the state directory
#[derive(Debug)]
pub struct FileCrashReporter {
    marker: PathBuf,
}

impl FileCrashReporter {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Record panics into the marker before the default hook runs
    pub fn install_panic_hook(&self) {
        let marker = self.marker.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let record = fs::OpenOptions::new()
                .append(true)
                .open(&marker)
                .and_then(|mut file| writeln!(file, "{}", panic_info));
            if record.is_err() {
                eprintln!("failed to record panic in {}", marker.display());
            }
            previous(panic_info);
        }));
    }

    fn create_marker(&self) -> io::Result<()> {
        if let Some(parent) = self.marker.parent() {
            solo_utils::paths::ensure_dir(parent)?;
        }
        fs::write(&self.marker, b"")
    }
}

impl CrashReporter for FileCrashReporter {
    fn start(&mut self) -> CrashRecoveryOutcome {
        match fs::read(&self.marker) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => match self.create_marker() {
                Ok(()) => {
                    debug!("Crash marker created at {}", self.marker.display());
                    CrashRecoveryOutcome::NoDump
                }
                Err(e) => {
                    warn!("Could not create crash marker {}: {}", self.marker.display(), e);
                    CrashRecoveryOutcome::DumpOpenFailed
                }
            },
            Err(e) => {
                warn!("Could not read crash marker {}: {}", self.marker.display(), e);
                CrashRecoveryOutcome::DumpOpenFailed
            }
            Ok(content) if content.is_empty() => {
                info!("Previous run did not exit cleanly");
                CrashRecoveryOutcome::DumpEmpty
            }
            Ok(content) => {
                info!("Previous run crashed, {} bytes of crash report", content.len());
                CrashRecoveryOutcome::DumpWithContent(content)
            }
        }
    }

    fn restart(&mut self) -> CrashStatus {
        match self.create_marker() {
            Ok(()) => CrashStatus::Ok,
            Err(e) => {
                warn!("Could not reset crash marker {}: {}", self.marker.display(), e);
                CrashStatus::CantOpen
            }
        }
    }

    fn finish(&mut self) {
        match fs::remove_file(&self.marker) {
            Ok(()) => debug!("Crash marker removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove crash marker {}: {}", self.marker.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_clean_previous_run() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("state").join("running");
        let mut reporter = FileCrashReporter::new(&marker);

        assert_eq!(reporter.start(), CrashRecoveryOutcome::NoDump);
        assert!(marker.exists());

        reporter.finish();
        assert!(!marker.exists());
    }

    #[test]
    fn test_unclean_exit_without_report() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("running");
        std::fs::write(&marker, b"").unwrap();

        let mut reporter = FileCrashReporter::new(&marker);
        assert_eq!(reporter.start(), CrashRecoveryOutcome::DumpEmpty);
        assert_eq!(reporter.restart(), CrashStatus::Ok);
    }

    #[test]
    fn test_crash_report_content() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("running");
        std::fs::write(&marker, b"panicked at main.rs").unwrap();

        let mut reporter = FileCrashReporter::new(&marker);
        assert_eq!(
            reporter.start(),
            CrashRecoveryOutcome::DumpWithContent(b"panicked at main.rs".to_vec())
        );

        assert_eq!(reporter.restart(), CrashStatus::Ok);
        assert!(std::fs::read(&marker).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_marker() {
        let dir = tempdir().unwrap();
        // A directory cannot be read as a file
        let marker = dir.path().join("running");
        std::fs::create_dir(&marker).unwrap();

        let mut reporter = FileCrashReporter::new(&marker);
        assert_eq!(reporter.start(), CrashRecoveryOutcome::DumpOpenFailed);
        assert_eq!(reporter.restart(), CrashStatus::CantOpen);
    }

    #[test]
    fn test_peer_markers_do_not_interfere() {
        let dir = tempdir().unwrap();
        let mut first = FileCrashReporter::new(dir.path().join("running-100"));
        let mut second = FileCrashReporter::new(dir.path().join("running-200"));

        assert_eq!(first.start(), CrashRecoveryOutcome::NoDump);
        assert_eq!(second.start(), CrashRecoveryOutcome::NoDump);

        first.finish();
        assert!(!first.marker().exists());
        assert!(second.marker().exists());
    }
}
