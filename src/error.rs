use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresenceError {
    /// Session could not be established (network, key or authentication)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Remote command could not be run, or its output stream failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Client list was absent or malformed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Operation requires `connect()` first
    #[error("Not connected")]
    NotConnected,

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl PresenceError {
    /// Fatal errors reach the caller; the rest are absorbed into an empty
    /// device set by the fetcher.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PresenceError::Connection(_) | PresenceError::NotConnected)
    }
}

impl From<russh::Error> for PresenceError {
    fn from(err: russh::Error) -> Self {
        PresenceError::Execution(err.to_string())
    }
}
