//! Pending-update detection

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::collaborators::UpdateChecker;

/// Reports an update as ready when the downloader left its marker behind
#[derive(Debug)]
pub struct MarkerUpdateChecker {
    marker: PathBuf,
    running: bool,
}

impl MarkerUpdateChecker {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
            running: true,
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl UpdateChecker for MarkerUpdateChecker {
    fn ready_to_install(&self) -> bool {
        let ready = self.running && self.marker.is_file();
        debug!("Update ready marker {}: {}", self.marker.display(), ready);
        ready
    }

    fn stop(&mut self) {
        if self.running {
            info!("Update checker stopped");
            self.running = false;
        }
    }
}
