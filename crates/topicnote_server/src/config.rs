//! Server configuration from command-line flags and environment.

use crate::server::{DEFAULT_MAX_REQUEST_BYTES, DEFAULT_READ_TIMEOUT_SECS};
use clap::Parser;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;
use topicnote_core::enrich::wikipedia::DEFAULT_WIKIPEDIA_BASE_URL;
use topicnote_core::WikipediaConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "topicnote-server", version, about = "Topic note RPC server")]
pub struct ServerConfig {
    /// Listen address.
    #[arg(long, env = "TOPICNOTE_ADDR", default_value = "127.0.0.1:8000")]
    pub addr: String,

    /// Path of the JSON note document.
    #[arg(long, env = "TOPICNOTE_DB_PATH", default_value = "notes.json")]
    pub db_path: PathBuf,

    /// trace|debug|info|warn|error. Defaults to debug for debug builds, info otherwise.
    #[arg(long, env = "TOPICNOTE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rolling log files. Defaults to `<cwd>/logs`.
    #[arg(long, env = "TOPICNOTE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Base URL of the Wikipedia REST API host.
    #[arg(long, env = "TOPICNOTE_WIKI_BASE_URL", default_value = DEFAULT_WIKIPEDIA_BASE_URL)]
    pub wiki_base_url: String,

    /// Timeout for one enrichment lookup.
    #[arg(long, env = "TOPICNOTE_LOOKUP_TIMEOUT_SECS", default_value_t = 10)]
    pub lookup_timeout_secs: u64,

    /// Largest accepted request line in bytes.
    #[arg(long, env = "TOPICNOTE_MAX_REQUEST_BYTES", default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,

    /// Seconds a connection may stay silent before it is closed.
    #[arg(long, env = "TOPICNOTE_READ_TIMEOUT_SECS", default_value_t = DEFAULT_READ_TIMEOUT_SECS)]
    pub read_timeout_secs: u64,
}

/// Invalid configuration value.
#[derive(Debug)]
pub enum ConfigError {
    ZeroTimeout,
    ZeroRequestLimit,
    ZeroReadTimeout,
    CurrentDir(std::io::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroTimeout => write!(f, "lookup timeout must be at least 1 second"),
            Self::ZeroRequestLimit => write!(f, "max request bytes must be positive"),
            Self::ZeroReadTimeout => write!(f, "read timeout must be at least 1 second"),
            Self::CurrentDir(err) => write!(f, "cannot resolve current directory: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CurrentDir(err) => Some(err),
            _ => None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::ZeroRequestLimit);
        }
        if self.read_timeout_secs == 0 {
            return Err(ConfigError::ZeroReadTimeout);
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or_else(|| topicnote_core::default_log_level())
    }

    /// Absolute log directory; relative values resolve against the cwd.
    pub fn resolved_log_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = self
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"));
        if dir.is_absolute() {
            return Ok(dir);
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(dir))
            .map_err(ConfigError::CurrentDir)
    }

    pub fn wikipedia(&self) -> WikipediaConfig {
        WikipediaConfig {
            base_url: self.wiki_base_url.clone(),
            timeout: Duration::from_secs(self.lookup_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ServerConfig};
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn defaults_listen_on_local_port_8000() {
        let config = ServerConfig::try_parse_from(["topicnote-server"]).unwrap();
        assert_eq!(config.addr, "127.0.0.1:8000");
        assert_eq!(config.db_path.to_str(), Some("notes.json"));
        assert!(config.resolved_log_dir().unwrap().is_absolute());
        assert_eq!(config.wikipedia().timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout(), Duration::from_secs(300));
        assert_eq!(config.log_level(), topicnote_core::default_log_level());
        config.validate().unwrap();
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config =
            ServerConfig::try_parse_from(["topicnote-server", "--lookup-timeout-secs", "0"])
                .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));

        let config =
            ServerConfig::try_parse_from(["topicnote-server", "--read-timeout-secs", "0"])
                .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ZeroReadTimeout)));
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "topicnote-server",
            "--addr",
            "0.0.0.0:9100",
            "--log-level",
            "warn",
            "--log-dir",
            "/var/log/topicnote",
            "--wiki-base-url",
            "http://mirror.local/",
            "--read-timeout-secs",
            "15",
        ])
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9100");
        assert_eq!(config.log_level(), "warn");
        assert_eq!(
            config.resolved_log_dir().unwrap().to_str(),
            Some("/var/log/topicnote")
        );
        assert_eq!(config.wikipedia().base_url, "http://mirror.local/");
        assert_eq!(config.read_timeout(), Duration::from_secs(15));
    }
}
