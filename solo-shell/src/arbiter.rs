//! Single-instance arbitration
//!
//! A launch first tries to connect to the well-known endpoint. Reaching it
//! makes this launch a secondary that relays its intent and exits; failing
//! to reach it makes this launch the primary, which takes the endpoint over.

use std::future::Future;
use std::io;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use solo_utils::{Result, SoloError};

use crate::endpoint::Endpoint;

/// Local stream transport the arbiter runs over
pub trait LocalTransport {
    type Stream: AsyncRead + AsyncWrite + Unpin + 'static;
    type Listener;

    fn connect(&self, endpoint: &Endpoint) -> impl Future<Output = io::Result<Self::Stream>>;

    fn listen(&self, endpoint: &Endpoint) -> io::Result<Self::Listener>;
}

/// Unix domain socket transport
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixTransport;

impl LocalTransport for UnixTransport {
    type Stream = UnixStream;
    type Listener = UnixListener;

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<UnixStream> {
        UnixStream::connect(endpoint.path()).await
    }

    fn listen(&self, endpoint: &Endpoint) -> io::Result<UnixListener> {
        if let Some(parent) = endpoint.path().parent() {
            solo_utils::paths::ensure_dir(parent)?;
        }
        bind_listener(endpoint.path())
    }
}

/// Bind `socket_path`, replacing a socket file left behind by a dead primary
///
/// A socket that still accepts connections is never removed.
pub fn bind_listener(socket_path: &Path) -> io::Result<UnixListener> {
    match UnixListener::bind(socket_path) {
        Ok(listener) => Ok(listener),
        Err(bind_error) if bind_error.kind() == io::ErrorKind::AddrInUse => {
            if !socket_path.exists() {
                return Err(bind_error);
            }

            if std::os::unix::net::UnixStream::connect(socket_path).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("primary already listening at {}", socket_path.display()),
                ));
            }

            debug!("Removing stale socket {}", socket_path.display());
            remove_socket_if_exists(socket_path)?;
            UnixListener::bind(socket_path)
        }
        Err(bind_error) => Err(bind_error),
    }
}

/// Remove the socket file, ignoring a file that is already gone
pub fn remove_socket_if_exists(socket_path: &Path) -> io::Result<()> {
    match std::fs::remove_file(socket_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Where arbitration currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterState {
    Idle,
    AttemptingConnect,
    ConnectedAsSecondary,
    ConnectFailed,
    ListeningAsPrimary,
    Error,
}

/// Role this launch ended up with
pub enum Role<S, L> {
    /// Connected to an existing primary
    Secondary(S),
    /// Owns the endpoint
    Primary(L),
}

/// Decides whether this launch is the primary or a secondary
pub struct InstanceArbiter<T: LocalTransport> {
    transport: T,
    endpoint: Endpoint,
    state: ArbiterState,
}

impl<T: LocalTransport> InstanceArbiter<T> {
    pub fn new(transport: T, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
            state: ArbiterState::Idle,
        }
    }

    pub fn state(&self) -> ArbiterState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Connect to an existing primary or become one
    pub async fn arbitrate(&mut self) -> Result<Role<T::Stream, T::Listener>> {
        if self.endpoint.mode().is_multi() {
            info!("Many instances allowed, starting primary on {}", self.endpoint);
            return self.listen().map(Role::Primary);
        }

        self.state = ArbiterState::AttemptingConnect;
        info!("Connecting local socket to {}...", self.endpoint);

        match self.transport.connect(&self.endpoint).await {
            Ok(stream) => {
                self.state = ArbiterState::ConnectedAsSecondary;
                info!("Connected to primary instance, relaying launch");
                Ok(Role::Secondary(stream))
            }
            Err(e) => {
                self.state = ArbiterState::ConnectFailed;
                if is_endpoint_missing(&e) {
                    info!("No primary instance found, starting server and app");
                } else {
                    warn!("Local socket connect error: {}, starting server and app", e);
                }
                self.listen().map(Role::Primary)
            }
        }
    }

    fn listen(&mut self) -> Result<T::Listener> {
        match self.transport.listen(&self.endpoint) {
            Ok(listener) => {
                self.state = ArbiterState::ListeningAsPrimary;
                info!("Listening on {}", self.endpoint.path().display());
                Ok(listener)
            }
            Err(source) => {
                self.state = ArbiterState::Error;
                error!("Failed to start listening on {}: {}", self.endpoint, source);
                Err(SoloError::Bind {
                    endpoint: self.endpoint.name().to_string(),
                    source,
                })
            }
        }
    }
}

/// Whether a connect error just means nobody is listening
fn is_endpoint_missing(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}
