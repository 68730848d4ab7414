use std::path::PathBuf;
use std::time::Duration;

use serde_derive::Deserialize;

use crate::fetcher::DEFAULT_CLIENTLIST_PATH;
use crate::session::SshSettings;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub router: RouterConfig,
    pub poll: Option<PollConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RouterConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub key_path: String,
    pub key_passphrase: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct PollConfig {
    pub interval_ms: Option<u64>,
    pub command_timeout_seconds: Option<u64>,
    pub clientlist_path: Option<String>,
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(contents)
    }

    fn poll(&self) -> PollConfig {
        self.poll.clone().unwrap_or_default()
    }

    pub fn ssh_settings(&self) -> SshSettings {
        SshSettings {
            user: self.router.user.clone(),
            host: self.router.host.clone(),
            port: self.router.port.unwrap_or(22),
            key_path: expand_home(&self.router.key_path),
            key_passphrase: self.router.key_passphrase.clone(),
            timeout: Duration::from_secs(self.poll().command_timeout_seconds.unwrap_or(10)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll().interval_ms.unwrap_or(10_000))
    }

    pub fn clientlist_path(&self) -> String {
        self.poll()
            .clientlist_path
            .unwrap_or_else(|| DEFAULT_CLIENTLIST_PATH.to_string())
    }
}

/// Expands a leading `~/` to the current user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
