//! solo-shell: single-instance coordination for the solo application
//!
//! Every launch derives the same local endpoint from its install directory.
//! The first launch to claim it becomes the primary and hosts the
//! application; later launches relay their files, URL or a plain "show" to
//! the primary and exit.

pub mod arbiter;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod crash;
pub mod endpoint;
pub mod headless;
pub mod lifecycle;
pub mod nesting;
pub mod platform;
pub mod primary;
pub mod proxy;
pub mod relay;
pub mod update;

#[cfg(test)]
mod test_support;

pub use arbiter::{InstanceArbiter, Role, UnixTransport};
pub use endpoint::{Endpoint, InstanceMode};
pub use lifecycle::{LifecycleGate, StartupOutcome};
pub use nesting::NestingTracker;
pub use primary::{PrimaryLoop, ShutdownHandle};
