//! Command relay between launches
//!
//! The secondary half turns a launch into `SEND:` / `OPEN:` / `CMD:` segments
//! and waits for `RES:`. The primary half buffers each accepted connection,
//! interprets complete segments and decides the replies.

mod client;
mod policy;
mod server;

pub use client::{build_intent, SecondaryClient};
pub use policy::PrefixUrlPolicy;
pub use server::{ClientId, ClientState, CommandRelay, PendingClient, RelayActions, RelayBatch};
