use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info};
use mac_address::MacAddress;

use crate::device::ConnectedDevice;
use crate::error::PresenceError;
use crate::fetcher::{self, PresenceFetcher};
use crate::logging::{self, SharedLogger};
use crate::poller::Poller;
use crate::session::{RemoteShell, SshSession, SshSettings};

/// Tracks which devices are associated with the router.
///
/// Queries and polling require [`connect`](Self::connect) first and fail with
/// [`PresenceError::NotConnected`] otherwise. Every remote read, whether from
/// a query or a polling tick, goes through one lock, so at most one command
/// runs on the session at a time.
pub struct DevicePresence<S: RemoteShell = SshSession> {
    settings: SshSettings,
    fetcher: Arc<PresenceFetcher<S>>,
    poller: Mutex<Option<Poller>>,
}

impl DevicePresence<SshSession> {
    pub fn new(settings: SshSettings, clientlist_path: &str) -> Self {
        let logger = logging::global();
        let shell = SshSession::new(settings.clone(), logger.clone());
        DevicePresence::with_shell(settings, shell, clientlist_path, logger)
    }
}

impl<S: RemoteShell + 'static> DevicePresence<S> {
    pub fn with_shell(
        settings: SshSettings,
        shell: S,
        clientlist_path: &str,
        logger: SharedLogger,
    ) -> Self {
        let command = fetcher::clientlist_command(clientlist_path);
        DevicePresence {
            settings,
            fetcher: Arc::new(PresenceFetcher::new(shell, command, logger)),
            poller: Mutex::new(None),
        }
    }

    /// Opens the session unless it is already open. Connection failures are
    /// returned as-is and leave the service disconnected.
    pub async fn connect(&self) -> Result<(), PresenceError> {
        self.fetcher.ensure_connected().await?;
        info!("Connected to router {}", self.settings.host);
        Ok(())
    }

    /// Closes the session and stops any active polling.
    pub async fn disconnect(&self) {
        self.fetcher.disconnect().await;
        self.stop_polling();
        info!("Disconnected from router {}", self.settings.host);
    }

    pub fn is_connected(&self) -> bool {
        self.fetcher.is_connected()
    }

    /// Reads the current device set. Read failures yield an empty set.
    pub async fn get_connected_devices(&self) -> Result<HashSet<ConnectedDevice>, PresenceError> {
        self.require_connected()?;
        Ok(self.fetcher.fetch_now().await)
    }

    pub async fn is_device_connected(&self, mac: MacAddress) -> Result<bool, PresenceError> {
        let devices = self.get_connected_devices().await?;
        Ok(devices.iter().any(|d| d.mac_address() == mac))
    }

    /// Polls every `period` and hands each result to `callback` on the
    /// polling task. Replaces any poller already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_polling<F>(&self, period: Duration, callback: F) -> Result<(), PresenceError>
    where
        F: FnMut(HashSet<ConnectedDevice>) + Send + 'static,
    {
        // Checked under the slot lock so a racing disconnect cannot miss the new poller
        let mut slot = self.poller_slot();
        self.require_connected()?;
        if let Some(previous) = slot.take() {
            debug!("Replacing active poller");
            previous.stop();
        }
        *slot = Some(Poller::start(self.fetcher.clone(), period, callback));
        Ok(())
    }

    /// Cancels polling. A tick already in progress still delivers its result.
    pub fn stop_polling(&self) {
        if let Some(poller) = self.poller_slot().take() {
            poller.stop();
            debug!("Polling stopped");
        }
    }

    pub fn is_polling_active(&self) -> bool {
        self.poller_slot().as_ref().is_some_and(Poller::is_active)
    }

    pub fn user(&self) -> &str {
        &self.settings.user
    }

    pub fn host(&self) -> &str {
        &self.settings.host
    }

    pub fn port(&self) -> u16 {
        self.settings.port
    }

    pub fn key_path(&self) -> &Path {
        &self.settings.key_path
    }

    fn require_connected(&self) -> Result<(), PresenceError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(PresenceError::NotConnected)
        }
    }

    fn poller_slot(&self) -> MutexGuard<'_, Option<Poller>> {
        self.poller.lock().unwrap_or_else(|e| e.into_inner())
    }
}
