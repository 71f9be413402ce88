//! Primary side of the relay: per-client buffering and command handling

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use solo_protocol::{Command, Response, ServerCodec, SHOW_COMMAND};

use crate::collaborators::UrlPolicy;
use crate::context::LaunchContext;

/// Identifies one accepted secondary connection
pub type ClientId = u64;

/// Connection state of an accepted client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    Disconnected,
}

/// Accepted connection and its unparsed bytes
#[derive(Debug)]
pub struct PendingClient {
    id: ClientId,
    buffer: BytesMut,
    codec: ServerCodec,
    state: ClientState,
}

impl PendingClient {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            buffer: BytesMut::new(),
            codec: ServerCodec::new(),
            state: ClientState::Connected,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Bytes received but not yet terminated
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Append `bytes` and split off every complete command
    ///
    /// A framing error discards what is buffered; the connection stays open.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Command> {
        self.buffer.extend_from_slice(bytes);

        let mut commands = Vec::new();
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(command)) => commands.push(command),
                Ok(None) => break,
                Err(e) => {
                    warn!("Local client {} sent bad data: {}", self.id, e);
                    self.buffer.clear();
                    break;
                }
            }
        }
        commands
    }
}

/// Work produced by one read from a client
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RelayBatch {
    /// Replies for the client that sent the batch, in order
    pub responses: Vec<Response>,
    pub actions: RelayActions,
}

/// What the primary should do on behalf of a secondary
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RelayActions {
    /// External commands to execute, in order
    pub external: Vec<String>,
    /// Paths for the file-open handler
    pub send_paths: Vec<String>,
    /// URL to hand to the application
    pub start_url: Option<String>,
}

impl RelayActions {
    pub fn is_empty(&self) -> bool {
        self.external.is_empty() && self.send_paths.is_empty() && self.start_url.is_none()
    }
}

/// Accepted clients of the primary and the rules for answering them
pub struct CommandRelay {
    clients: Vec<PendingClient>,
    own_pid: u64,
    policy: Box<dyn UrlPolicy>,
    next_id: ClientId,
}

impl CommandRelay {
    pub fn new(own_pid: u64, policy: Box<dyn UrlPolicy>) -> Self {
        Self {
            clients: Vec::new(),
            own_pid,
            policy,
            next_id: 1,
        }
    }

    /// Register a newly accepted connection
    pub fn accept(&mut self) -> ClientId {
        let id = self.next_id;
        self.next_id += 1;
        self.clients.push(PendingClient::new(id));
        debug!("Local client {} connected", id);
        id
    }

    pub fn client(&self, id: ClientId) -> Option<&PendingClient> {
        self.clients.iter().find(|client| client.id == id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Handle bytes received from client `id`
    ///
    /// Send paths are only taken while `context` has none queued, and a URL
    /// only while it has no start URL, so an earlier launch always wins.
    pub fn read_client(&mut self, id: ClientId, bytes: &[u8], context: &LaunchContext) -> RelayBatch {
        let mut batch = RelayBatch::default();
        let Some(client) = self.clients.iter_mut().find(|client| client.id == id) else {
            warn!("Data from unknown local client {}", id);
            return batch;
        };
        let take_paths = !context.has_send_paths();
        let take_url = context.start_url().is_none();

        for command in client.feed(bytes) {
            match command {
                Command::Show => {
                    batch.actions.external.push(SHOW_COMMAND.to_string());
                    batch.responses.push(Response::activate(self.own_pid));
                }
                Command::Exec(name) => {
                    debug!("Executing external command {:?}", name);
                    batch.actions.external.push(name);
                    batch.responses.push(Response::activate(self.own_pid));
                }
                Command::Send(path) => {
                    if take_paths {
                        batch.actions.send_paths.push(path);
                    } else {
                        debug!("Ignoring sent path, paths already queued");
                    }
                }
                Command::Open(url) => {
                    let mut activate = true;
                    if take_url {
                        activate = self.policy.requires_activation(&url);
                        batch.actions.start_url = Some(url);
                    }
                    if activate {
                        batch.actions.external.push(SHOW_COMMAND.to_string());
                        batch.responses.push(Response::activate(self.own_pid));
                    } else {
                        batch.responses.push(Response::no_activation());
                    }
                }
                Command::Unknown(segment) => {
                    warn!("Unknown command {:?} passed in local socket", segment);
                }
            }
        }
        batch
    }

    /// Record that client `id` went away
    pub fn mark_disconnected(&mut self, id: ClientId) {
        if let Some(client) = self.clients.iter_mut().find(|client| client.id == id) {
            client.state = ClientState::Disconnected;
        }
    }

    /// Drop every client that is no longer connected, returning their ids
    pub fn remove_clients(&mut self) -> Vec<ClientId> {
        let mut removed = Vec::new();
        self.clients.retain(|client| {
            let keep = client.state == ClientState::Connected;
            if !keep {
                removed.push(client.id);
            }
            keep
        });
        for id in &removed {
            debug!("Local client {} removed", id);
        }
        removed
    }

    /// Forget every client
    pub fn close_all(&mut self) -> Vec<ClientId> {
        self.clients.drain(..).map(|client| client.id).collect()
    }
}
