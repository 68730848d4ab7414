//! Remote shell session to the router.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{Level, debug, info};
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;

use crate::error::PresenceError;
use crate::logging::{self, SharedLogger};

const LOG_TARGET: &str = "router_presence::session";

/// A session able to run one command at a time and hand back its stdout.
///
/// Implementations are not expected to tolerate concurrent `execute` calls;
/// callers serialise access (see [`crate::fetcher::PresenceFetcher`]).
#[async_trait]
pub trait RemoteShell: Send {
    /// Establishes the session. Failures are [`PresenceError::Connection`].
    async fn connect(&mut self) -> Result<(), PresenceError>;

    /// Runs `command` on a fresh channel and returns everything it wrote to
    /// stdout.
    async fn execute(&mut self, command: &str) -> Result<Vec<u8>, PresenceError>;

    /// Closes the session. Safe to call when never connected.
    async fn disconnect(&mut self);

    fn is_initialised(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct SshSettings {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub key_path: PathBuf,
    pub key_passphrase: Option<String>,
    /// Bounds the handshake and each command execution.
    pub timeout: Duration,
}

/// Key-authenticated SSH session.
///
/// The server's host key is accepted without verification (trust on first
/// use); its fingerprint is only logged.
pub struct SshSession {
    settings: SshSettings,
    handle: Option<Handle<SshClient>>,
    logger: SharedLogger,
}

impl SshSession {
    pub fn new(settings: SshSettings, logger: SharedLogger) -> Self {
        SshSession {
            settings,
            handle: None,
            logger,
        }
    }

    async fn open(&self) -> Result<Handle<SshClient>, PresenceError> {
        let settings = &self.settings;
        let key = russh_keys::load_secret_key(&settings.key_path, settings.key_passphrase.as_deref())
            .map_err(|e| {
                PresenceError::Connection(format!(
                    "failed to load key {}: {}",
                    settings.key_path.display(),
                    e
                ))
            })?;

        let config = Arc::new(Config::default());
        let address = (settings.host.as_str(), settings.port);
        let mut handle = tokio::time::timeout(
            settings.timeout,
            client::connect(config, address, SshClient),
        )
        .await
        .map_err(|_| PresenceError::Connection(format!("connect timed out after {:?}", settings.timeout)))?
        .map_err(|e| {
            PresenceError::Connection(format!(
                "failed to connect to {}:{}: {}",
                settings.host, settings.port, e
            ))
        })?;

        let authenticated = handle
            .authenticate_publickey(&settings.user, Arc::new(key))
            .await
            .map_err(|e| PresenceError::Connection(format!("authentication error: {e}")))?;
        if !authenticated {
            return Err(PresenceError::Connection(format!(
                "authentication rejected for user '{}'",
                settings.user
            )));
        }

        Ok(handle)
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn connect(&mut self) -> Result<(), PresenceError> {
        debug!(
            "Connecting to {}@{}:{}",
            self.settings.user, self.settings.host, self.settings.port
        );
        let handle = self.open().await?;
        info!("SSH session established with {}", self.settings.host);
        self.handle = Some(handle);
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<Vec<u8>, PresenceError> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| PresenceError::Execution("session not established".to_string()))?;

        let mut channel = handle.channel_open_session().await?;
        let timeout = self.settings.timeout;
        let result = match tokio::time::timeout(timeout, read_exec(&mut channel, command)).await {
            Ok(result) => result,
            Err(_) => {
                logging::emit(
                    &*self.logger,
                    Level::Warn,
                    LOG_TARGET,
                    format_args!("`{command}` produced no end of output within {timeout:?}"),
                );
                Err(PresenceError::Timeout(timeout))
            }
        };

        if let Err(e) = channel.close().await {
            debug!("Closing exec channel failed: {}", e);
        }
        result
    }

    async fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Disconnecting from {}", self.settings.host);
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "closing", "en")
                .await
            {
                logging::emit(
                    &*self.logger,
                    Level::Warn,
                    LOG_TARGET,
                    format_args!("Error disconnecting from {}: {}", self.settings.host, e),
                );
            }
        }
    }

    fn is_initialised(&self) -> bool {
        self.handle.is_some()
    }
}

/// Runs `command` and drains the channel until the remote side closes it.
async fn read_exec(channel: &mut Channel<Msg>, command: &str) -> Result<Vec<u8>, PresenceError> {
    channel.exec(true, command).await?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
            Some(ChannelMsg::ExtendedData { data, .. }) => stderr.extend_from_slice(&data),
            Some(ChannelMsg::ExitStatus { exit_status: status }) => exit_status = Some(status),
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    match exit_status {
        Some(0) | None => Ok(stdout),
        Some(status) => Err(PresenceError::Execution(format!(
            "`{}` exited with {}: {}",
            command,
            status,
            String::from_utf8_lossy(&stderr).trim()
        ))),
    }
}

struct SshClient;

#[async_trait]
impl client::Handler for SshClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!("Accepting server host key {}", server_public_key.fingerprint());
        Ok(true)
    }
}
