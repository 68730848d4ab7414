//! In-memory stand-in for the router's shell.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PresenceError;
use crate::session::RemoteShell;

pub const SAMPLE_CLIENTLIST: &str = r#"{"id":{"2G":{"aa:bb:cc:dd:ee:ff":{"ip":"192.168.1.10","rssi":-40}},"5G":{"11:22:33:44:55:66":{"ip":"192.168.1.20","rssi":-55}}}}"#;

#[derive(Clone, Debug)]
pub enum Reply {
    Output(String),
    Fail,
    Timeout,
}

#[derive(Default)]
pub struct ShellStats {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub executions: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub commands: Mutex<Vec<String>>,
}

pub struct FakeShell {
    reply: Arc<Mutex<Reply>>,
    delay: Duration,
    refuse_connect: bool,
    initialised: bool,
    stats: Arc<ShellStats>,
}

impl FakeShell {
    pub fn new(reply: Reply) -> Self {
        FakeShell {
            reply: Arc::new(Mutex::new(reply)),
            delay: Duration::ZERO,
            refuse_connect: false,
            initialised: false,
            stats: Arc::new(ShellStats::default()),
        }
    }

    /// Slows down both connecting and every execution.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn refusing(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    pub fn stats(&self) -> Arc<ShellStats> {
        self.stats.clone()
    }

    /// Handle for swapping the reply while the shell is owned elsewhere.
    pub fn reply_handle(&self) -> Arc<Mutex<Reply>> {
        self.reply.clone()
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn connect(&mut self) -> Result<(), PresenceError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.refuse_connect {
            return Err(PresenceError::Connection("authentication rejected".to_string()));
        }
        self.initialised = true;
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<Vec<u8>, PresenceError> {
        if !self.initialised {
            return Err(PresenceError::Execution("session not established".to_string()));
        }
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.stats.executions.fetch_add(1, Ordering::SeqCst);
        self.stats.commands.lock().unwrap().push(command.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.reply.lock().unwrap().clone();

        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            Reply::Output(out) => Ok(out.into_bytes()),
            Reply::Fail => Err(PresenceError::Execution("channel closed".to_string())),
            Reply::Timeout => Err(PresenceError::Timeout(Duration::from_secs(10))),
        }
    }

    async fn disconnect(&mut self) {
        self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        self.initialised = false;
    }

    fn is_initialised(&self) -> bool {
        self.initialised
    }
}
