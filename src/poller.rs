use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::device::ConnectedDevice;
use crate::fetcher::PresenceFetcher;
use crate::session::RemoteShell;

/// Smallest accepted polling period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A running polling loop.
///
/// Ticks run serially on one task at a fixed rate, starting immediately.
/// Stopping is checked between ticks, so a tick already in progress still
/// finishes and delivers its result.
pub struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Spawns the loop on the current Tokio runtime.
    pub fn start<S, F>(fetcher: Arc<PresenceFetcher<S>>, period: Duration, mut callback: F) -> Self
    where
        S: RemoteShell + 'static,
        F: FnMut(HashSet<ConnectedDevice>) + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Overrunning ticks are caught up rather than skipped
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let devices = fetcher.fetch_now().await;
                callback(devices);
            }
            debug!("Polling loop stopped");
        });

        debug!("Polling every {:?}", period);
        Poller { cancel, handle }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
