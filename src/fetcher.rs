use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{Level, debug};
use tokio::sync::Mutex;

use crate::device::ConnectedDevice;
use crate::error::PresenceError;
use crate::logging::{self, SharedLogger};
use crate::parser;
use crate::session::RemoteShell;

/// Where the router keeps its associated-client list.
pub const DEFAULT_CLIENTLIST_PATH: &str = "/tmp/clientlist.json";

const LOG_TARGET: &str = "router_presence::fetcher";

pub fn clientlist_command(path: &str) -> String {
    format!("cat {path}")
}

/// Owns the remote shell behind a mutex, so every use of the session
/// (queries, polling ticks, connect and disconnect) is serialised.
///
/// `connected` only changes while the mutex is held, so it never disagrees
/// with the session once a connect or disconnect has returned.
pub struct PresenceFetcher<S> {
    shell: Mutex<S>,
    connected: AtomicBool,
    command: String,
    logger: SharedLogger,
}

impl<S: RemoteShell> PresenceFetcher<S> {
    pub fn new(shell: S, command: String, logger: SharedLogger) -> Self {
        PresenceFetcher {
            shell: Mutex::new(shell),
            connected: AtomicBool::new(false),
            command,
            logger,
        }
    }

    /// Connects unless the session is already up.
    pub async fn ensure_connected(&self) -> Result<(), PresenceError> {
        let mut shell = self.shell.lock().await;
        if shell.is_initialised() {
            debug!("Session already initialised");
        } else {
            shell.connect().await?;
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn disconnect(&self) {
        let mut shell = self.shell.lock().await;
        self.connected.store(false, Ordering::SeqCst);
        if shell.is_initialised() {
            shell.disconnect().await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Reads and parses the client list, propagating every failure.
    pub async fn try_fetch(&self) -> Result<HashSet<ConnectedDevice>, PresenceError> {
        let raw = {
            let mut shell = self.shell.lock().await;
            shell.execute(&self.command).await?
        };
        parser::parse_clientlist(&String::from_utf8_lossy(&raw))
    }

    /// Reads the client list now. Failures are logged as warnings and come
    /// back as an empty set.
    pub async fn fetch_now(&self) -> HashSet<ConnectedDevice> {
        match self.try_fetch().await {
            Ok(devices) => {
                debug!("Fetched {} devices", devices.len());
                devices
            }
            Err(e) => {
                logging::emit(
                    &*self.logger,
                    Level::Warn,
                    LOG_TARGET,
                    format_args!("Failed to read devices from router: {e}"),
                );
                HashSet::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::logging::capture::CapturingLogger;
    use crate::testing::{FakeShell, Reply, SAMPLE_CLIENTLIST};

    fn build(shell: FakeShell) -> (PresenceFetcher<FakeShell>, Arc<CapturingLogger>) {
        let logger = Arc::new(CapturingLogger::default());
        let fetcher = PresenceFetcher::new(
            shell,
            clientlist_command(DEFAULT_CLIENTLIST_PATH),
            logger.clone(),
        );
        (fetcher, logger)
    }

    async fn connected(reply: Reply) -> (PresenceFetcher<FakeShell>, Arc<CapturingLogger>) {
        let (fetcher, logger) = build(FakeShell::new(reply));
        fetcher.ensure_connected().await.unwrap();
        (fetcher, logger)
    }

    #[tokio::test]
    async fn test_fetch_parses_output() {
        let shell = FakeShell::new(Reply::Output(SAMPLE_CLIENTLIST.to_string()));
        let stats = shell.stats();
        let (fetcher, logger) = build(shell);
        fetcher.ensure_connected().await.unwrap();

        let devices = fetcher.fetch_now().await;
        assert_eq!(devices.len(), 2);
        assert!(logger.warnings().is_empty());
        assert_eq!(
            stats.commands.lock().unwrap().as_slice(),
            ["cat /tmp/clientlist.json".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failures_become_empty_set_with_warning() {
        for reply in [
            Reply::Fail,
            Reply::Output("garbage".to_string()),
            Reply::Timeout,
        ] {
            let (fetcher, logger) = connected(reply).await;

            assert!(fetcher.fetch_now().await.is_empty());
            let warnings = logger.warnings();
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].starts_with("Failed to read devices from router"));
        }
    }

    #[tokio::test]
    async fn test_try_fetch_reports_error_kind() {
        let (fetcher, _) = connected(Reply::Timeout).await;
        assert!(matches!(fetcher.try_fetch().await, Err(PresenceError::Timeout(_))));

        let (fetcher, _) = connected(Reply::Output("{".into())).await;
        assert!(matches!(fetcher.try_fetch().await, Err(PresenceError::Parse(_))));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let shell = FakeShell::new(Reply::Output(String::new()));
        let stats = shell.stats();
        let (fetcher, _) = build(shell);

        assert!(!fetcher.is_connected());
        fetcher.ensure_connected().await.unwrap();
        fetcher.ensure_connected().await.unwrap();
        assert!(fetcher.is_connected());
        assert_eq!(stats.connects.load(Ordering::SeqCst), 1);

        fetcher.disconnect().await;
        fetcher.disconnect().await;
        assert!(!fetcher.is_connected());
        assert_eq!(stats.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connect_stays_disconnected() {
        let (fetcher, _) = build(FakeShell::new(Reply::Fail).refusing());
        assert!(matches!(
            fetcher.ensure_connected().await,
            Err(PresenceError::Connection(_))
        ));
        assert!(!fetcher.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_executions_never_overlap() {
        let shell = FakeShell::new(Reply::Output(SAMPLE_CLIENTLIST.to_string()))
            .with_delay(Duration::from_millis(5));
        let stats = shell.stats();
        let (fetcher, _) = build(shell);
        fetcher.ensure_connected().await.unwrap();
        let fetcher = Arc::new(fetcher);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move {
                    for _ in 0..5 {
                        assert_eq!(fetcher.fetch_now().await.len(), 2);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(stats.executions.load(Ordering::SeqCst), 40);
        assert_eq!(stats.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
