//! Event loop of the primary instance
//!
//! One task owns the listener, the write half of every accepted connection,
//! the relay and the lifecycle gate. Reader tasks only forward what they read
//! back to it, so relay state is never shared across tasks.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info, warn};

use solo_protocol::{Response, ServerCodec};

use crate::arbiter::remove_socket_if_exists;
use crate::lifecycle::{EndpointTeardown, LifecycleGate, StartupOutcome};
use crate::relay::{ClientId, CommandRelay};


/// Read buffer size for client connections
const READ_BUFFER_SIZE: usize = 4096;

/// Consecutive read errors tolerated before a client is dropped
const MAX_READ_FAILURES: usize = 3;

/// Capacity of the reader-to-loop channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// What a reader task observed on its connection
#[derive(Debug)]
pub enum ClientEvent {
    Data { id: ClientId, bytes: Vec<u8> },
    Failed { id: ClientId, error: io::Error },
    Disconnected { id: ClientId },
}

/// Requests the primary to shut down from anywhere
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn trigger(&self) {
        // No receivers means the loop already stopped
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener and accepted connections of the primary
struct Connections {
    listener: Option<UnixListener>,
    socket_path: PathBuf,
    relay: CommandRelay,
    writers: HashMap<ClientId, FramedWrite<OwnedWriteHalf, ServerCodec>>,
    readers: HashMap<ClientId, JoinHandle<()>>,
}

impl Connections {
    async fn send_responses(&mut self, id: ClientId, responses: Vec<Response>) {
        let Some(writer) = self.writers.get_mut(&id) else {
            return;
        };
        for response in responses {
            debug!("Answering local client {} with {}", id, response);
            if let Err(e) = writer.send(response).await {
                warn!("Failed to answer local client {}: {}", id, e);
                break;
            }
        }
    }

    fn remove_clients(&mut self) {
        for id in self.relay.remove_clients() {
            self.writers.remove(&id);
            self.readers.remove(&id);
        }
    }
}

impl EndpointTeardown for Connections {
    fn close_listener(&mut self) {
        if self.listener.take().is_some() {
            if let Err(e) = remove_socket_if_exists(&self.socket_path) {
                warn!("Could not remove socket {}: {}", self.socket_path.display(), e);
            }
            debug!("Listener closed");
        }
    }

    fn close_clients(&mut self) {
        let closed = self.relay.close_all();
        self.writers.clear();
        for (_, reader) in self.readers.drain() {
            reader.abort();
        }
        debug!("Closed {} local clients", closed.len());
    }
}

enum LoopEvent {
    Accepted(io::Result<UnixStream>),
    Client(ClientEvent),
    Shutdown,
}

/// The primary's event loop
pub struct PrimaryLoop {
    gate: LifecycleGate,
    connections: Connections,
    events_tx: mpsc::Sender<ClientEvent>,
    events_rx: mpsc::Receiver<ClientEvent>,
    shutdown: broadcast::Receiver<()>,
}

impl PrimaryLoop {
    pub fn new(
        gate: LifecycleGate,
        listener: UnixListener,
        socket_path: PathBuf,
        relay: CommandRelay,
        shutdown: &ShutdownHandle,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            gate,
            connections: Connections {
                listener: Some(listener),
                socket_path,
                relay,
                writers: HashMap::new(),
                readers: HashMap::new(),
            },
            events_tx,
            events_rx,
            shutdown: shutdown.subscribe(),
        }
    }

    pub fn gate(&self) -> &LifecycleGate {
        &self.gate
    }

    /// Start the application, serve secondaries until quit, then tear down
    ///
    /// A launch that did not start keeps serving so later launches can bring
    /// the fallback window forward.
    pub async fn run(&mut self) -> StartupOutcome {
        let outcome = self.gate.primary_started();
        if !self.gate.is_quitting() {
            self.serve().await;
        }
        self.close();
        outcome
    }

    async fn serve(&mut self) {
        info!("Primary serving on {}", self.connections.socket_path.display());
        while !self.gate.is_quitting() {
            let event = tokio::select! {
                accepted = accept(self.connections.listener.as_ref()) => LoopEvent::Accepted(accepted),
                Some(event) = self.events_rx.recv() => LoopEvent::Client(event),
                _ = self.shutdown.recv() => LoopEvent::Shutdown,
            };

            match event {
                LoopEvent::Accepted(Ok(stream)) => self.on_new_connection(stream),
                LoopEvent::Accepted(Err(e)) => error!("Failed to accept local client: {}", e),
                LoopEvent::Client(event) => self.on_client_event(event).await,
                LoopEvent::Shutdown => {
                    info!("Shutdown requested");
                    self.gate.request_quit();
                }
            }
        }
    }

    fn on_new_connection(&mut self, stream: UnixStream) {
        let nesting = self.gate.nesting();
        let _dispatch = nesting.dispatch();

        let id = self.connections.relay.accept();
        let (read, write) = stream.into_split();
        self.connections
            .writers
            .insert(id, FramedWrite::new(write, ServerCodec::new()));
        let reader = tokio::spawn(read_client(id, read, self.events_tx.clone()));
        self.connections.readers.insert(id, reader);
    }

    async fn on_client_event(&mut self, event: ClientEvent) {
        let nesting = self.gate.nesting();
        match event {
            ClientEvent::Data { id, bytes } => {
                let responses = {
                    let _dispatch = nesting.dispatch();
                    let batch = self
                        .connections
                        .relay
                        .read_client(id, &bytes, self.gate.context());
                    self.gate.apply_actions(batch.actions);
                    batch.responses
                };
                self.connections.send_responses(id, responses).await;
            }
            ClientEvent::Failed { id, error } => {
                warn!("Local client {} read error: {}", id, error);
            }
            ClientEvent::Disconnected { id } => {
                let _dispatch = nesting.dispatch();
                debug!("Local client {} disconnected", id);
                self.connections.relay.mark_disconnected(id);
                self.connections.remove_clients();
            }
        }
    }

    /// Tear everything down inside a nested loop level
    fn close(&mut self) {
        let nesting = self.gate.nesting();
        let gate = &mut self.gate;
        let connections = &mut self.connections;
        nesting.run_nested(|| {
            gate.request_quit();
            gate.close_application(connections);
        });
    }
}

async fn accept(listener: Option<&UnixListener>) -> io::Result<UnixStream> {
    match listener {
        Some(listener) => listener.accept().await.map(|(stream, _)| stream),
        None => std::future::pending().await,
    }
}

/// Forward everything read from one client to the loop
///
/// Only end of stream or a dead peer ends the connection. Other read errors
/// are reported and reading resumes, up to `MAX_READ_FAILURES` in a row.
async fn read_client<R>(id: ClientId, mut reader: R, events: mpsc::Sender<ClientEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut failures = 0;
    loop {
        let event = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                failures = 0;
                ClientEvent::Data {
                    id,
                    bytes: buf[..n].to_vec(),
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) if is_disconnect(&error) => {
                debug!("Local client {} connection lost: {}", id, error);
                break;
            }
            Err(error) => {
                failures += 1;
                ClientEvent::Failed { id, error }
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
        if failures >= MAX_READ_FAILURES {
            break;
        }
    }
    let _ = events.send(ClientEvent::Disconnected { id }).await;
}

fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}
