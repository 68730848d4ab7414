//! Router client presence over SSH.
//!
//! Reads the router's associated-client list through a remote `cat`, parses
//! it into [`ConnectedDevice`] records and optionally polls it on a fixed
//! schedule. See [`DevicePresence`] for the entry point.

pub mod config;
pub mod device;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod parser;
pub mod poller;
pub mod presence;
pub mod session;

#[cfg(test)]
mod testing;

pub use device::{ConnectedDevice, FrequencyBand};
pub use error::PresenceError;
pub use presence::DevicePresence;
pub use session::{RemoteShell, SshSession, SshSettings};
