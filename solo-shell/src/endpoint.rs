//! Local endpoint naming
//!
//! Every install directory maps to one well-known local socket, so two
//! launches from the same install find each other while different installs
//! never collide.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use uuid::Uuid;

/// Prefix shared by every endpoint name on this platform
#[cfg(target_os = "macos")]
pub const ENDPOINT_PREFIX: &str = "solo-mac-";
#[cfg(not(target_os = "macos"))]
pub const ENDPOINT_PREFIX: &str = "solo-";

/// Hash length kept by platform-store builds
#[cfg(feature = "store-build")]
const STORE_HASH_CHARS: usize = 4;

/// Whether several primaries may run side by side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceMode {
    #[default]
    Single,
    Multi,
}

impl InstanceMode {
    pub fn from_flag(many: bool) -> Self {
        if many {
            Self::Multi
        } else {
            Self::Single
        }
    }

    pub fn is_multi(self) -> bool {
        self == Self::Multi
    }
}

/// Name and socket path of the local endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    path: PathBuf,
    mode: InstanceMode,
}

impl Endpoint {
    /// Derive the endpoint for `install_dir`, placing the socket in `socket_dir`
    pub fn derive(install_dir: &Path, mode: InstanceMode, socket_dir: &Path) -> Self {
        let mut name = format!("{}{}", ENDPOINT_PREFIX, install_dir_hash(install_dir));
        if mode.is_multi() {
            name.push('-');
            name.push_str(&Uuid::new_v4().to_string());
        }
        let path = socket_dir.join(format!("{}.sock", name));
        Self { name, path, mode }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Socket file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> InstanceMode {
        self.mode
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Hex MD5 of the canonical install directory
fn install_dir_hash(install_dir: &Path) -> String {
    let canonical = install_dir
        .canonicalize()
        .unwrap_or_else(|_| absolute(install_dir));
    let digest = Md5::digest(canonical.to_string_lossy().as_bytes());
    let hash = hex::encode(digest);

    #[cfg(feature = "store-build")]
    let hash = hash[..STORE_HASH_CHARS].to_string();

    hash
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
