//! Global proxy selection

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collaborators::ProxySink;

/// Proxy protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    None,
    Socks5,
    Http,
}

/// How the user configured proxying
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxySettings {
    #[default]
    System,
    Enabled,
    Disabled,
}

/// One proxy server
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyData {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl ProxyData {
    /// Whether this proxy can be handed to the network layer directly
    pub fn is_application_proxy(&self) -> bool {
        matches!(self.kind, ProxyKind::Socks5 | ProxyKind::Http)
    }
}

impl std::fmt::Debug for ProxyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyData")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Proxy configuration coming from loaded application settings
#[derive(Debug, Clone, Copy)]
pub struct LoadedProxy<'a> {
    pub settings: ProxySettings,
    pub selected: &'a ProxyData,
}

/// Outcome of proxy selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedProxy {
    Application(ProxyData),
    System,
    NoProxy,
}

impl std::fmt::Display for AppliedProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Application(proxy) => {
                write!(f, "{:?} proxy {}:{}", proxy.kind, proxy.host, proxy.port)
            }
            Self::System => write!(f, "system proxy configuration"),
            Self::NoProxy => write!(f, "no proxy"),
        }
    }
}

/// Pick the process-wide proxy
///
/// `loaded` is `None` until the application settings are available, in which
/// case the sandbox proxy stands in for the selected one.
pub fn select_global_proxy(sandbox: &ProxyData, loaded: Option<LoadedProxy<'_>>) -> AppliedProxy {
    let proxy = match &loaded {
        Some(loaded) if loaded.settings == ProxySettings::Enabled => loaded.selected,
        Some(_) => return system_or_none(loaded),
        None => sandbox,
    };

    if proxy.is_application_proxy() {
        AppliedProxy::Application(proxy.clone())
    } else {
        system_or_none(loaded)
    }
}

fn system_or_none(loaded: Option<LoadedProxy<'_>>) -> AppliedProxy {
    match loaded {
        None => AppliedProxy::System,
        Some(loaded) if loaded.settings == ProxySettings::System => AppliedProxy::System,
        Some(_) => AppliedProxy::NoProxy,
    }
}

/// Proxy sink that logs and remembers the last applied proxy
#[derive(Debug, Default)]
pub struct LoggingProxySink {
    applied: Option<AppliedProxy>,
}

impl LoggingProxySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Option<&AppliedProxy> {
        self.applied.as_ref()
    }
}

impl ProxySink for LoggingProxySink {
    fn apply(&mut self, proxy: AppliedProxy) {
        info!("Using {}", proxy);
        self.applied = Some(proxy);
    }
}
