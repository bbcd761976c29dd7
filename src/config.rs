use crate::error::ConfigError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const KEY_SERVER_IP: &str = "rpcserverip";
pub const KEY_SERVER_PORT: &str = "rpcserverport";
pub const KEY_STORE_IP: &str = "zookeeperip";
pub const KEY_STORE_PORT: &str = "zookeeperport";
pub const KEY_POOL_SIZE: &str = "threadpoolsize";

/// Flat `key = value` process settings.
///
/// Lines starting with `#` and blank lines are skipped; keys and values are
/// whitespace-trimmed. Lines without `=` are ignored.
pub struct Settings {
    entries: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { entries }
    }

    /// Look up a key; None when the key is absent.
    #[inline]
    pub fn load(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    /// Insert or replace a key, for embedding without a config file.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

/// Socket-level deadlines shared by provider and channel.
#[derive(Clone, Copy)]
pub struct TimeoutSetting {
    /// Read timeout on provider-side accepted sockets, so a stalled peer
    /// cannot pin a worker.
    pub read_timeout: Duration,
    /// Connect timeout when a channel dials an endpoint.
    pub connect_timeout: Duration,
}

impl Default for TimeoutSetting {
    fn default() -> Self {
        Self { read_timeout: Duration::from_secs(5), connect_timeout: Duration::from_secs(10) }
    }
}

/// Provider runtime settings.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Advertised and bound IPv4 address.
    pub ip: String,
    /// Listening port; 0 lets the kernel pick and the actual port is announced.
    pub port: u16,
    /// Worker pool size; 0 means hardware parallelism.
    pub workers: usize,
    pub timeout: TimeoutSetting,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { ip: "127.0.0.1".to_string(), port: 0, workers: 0, timeout: TimeoutSetting::default() }
    }
}

impl ProviderConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let ip = settings.load(KEY_SERVER_IP).ok_or(ConfigError::Missing(KEY_SERVER_IP))?;
        let port_str =
            settings.load(KEY_SERVER_PORT).ok_or(ConfigError::Missing(KEY_SERVER_PORT))?;
        let port = port_str.parse::<u16>().map_err(|_| ConfigError::Invalid {
            key: KEY_SERVER_PORT,
            value: port_str.to_string(),
        })?;
        let workers = match settings.load(KEY_POOL_SIZE) {
            None => 0,
            Some(v) => v.parse::<usize>().map_err(|_| ConfigError::Invalid {
                key: KEY_POOL_SIZE,
                value: v.to_string(),
            })?,
        };
        Ok(Self { ip: ip.to_string(), port, workers, timeout: TimeoutSetting::default() })
    }
}

/// Coordination-store connect string from `zookeeperip` / `zookeeperport`.
pub fn store_endpoint(settings: &Settings) -> Result<String, ConfigError> {
    let host = settings.load(KEY_STORE_IP).ok_or(ConfigError::Missing(KEY_STORE_IP))?;
    let port = settings.load(KEY_STORE_PORT).ok_or(ConfigError::Missing(KEY_STORE_PORT))?;
    Ok(format!("{}:{}", host, port))
}
