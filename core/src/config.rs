//! Configuration management

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub listeners: Vec<ListenerConfig>,
    pub operators: Vec<OperatorConfig>,
    pub flood: FloodConfig,
    pub timeouts: TimeoutConfig,
    pub lookup: LookupConfig,
}

/// Server identity and administrative information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name as announced in prefixes and numerics
    pub name: String,
    /// Network name for the welcome line
    pub network: String,
    /// Free-form description
    pub description: String,
    /// Admin contact lines for ADMIN
    pub admin_location: String,
    pub admin_location2: String,
    pub admin_email: String,
    /// Path to the MOTD file; missing file yields ERR_NOMOTD
    pub motd_file: Option<String>,
    /// Maximum nickname length accepted from clients
    pub max_nickname_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "irc.example.org".to_string(),
            network: "ExampleNet".to_string(),
            description: "An IRC server".to_string(),
            admin_location: "Example City".to_string(),
            admin_location2: "Example Org".to_string(),
            admin_email: "admin@example.org".to_string(),
            motd_file: None,
            max_nickname_length: 30,
        }
    }
}

/// What kind of connections a listener accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerKind {
    Clients,
    Servers,
}

/// One listening socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub address: String,
    pub port: u16,
    pub kind: ListenerKind,
    /// Seconds between liveness PINGs to registered clients
    pub ping_frequency: u64,
    /// Connection-count cap for this listener
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 6667,
            kind: ListenerKind::Clients,
            ping_frequency: 120,
            max_connections: 1024,
        }
    }
}

/// Operator credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OperatorConfig {
    pub name: String,
    /// Hostmask (`nick!user@host` wildcards) the operator must connect from
    pub mask: String,
    /// `$ALGO$hexdigest` or plaintext
    pub password: String,
}

impl OperatorConfig {
    pub fn verify_password(&self, candidate: &str) -> bool {
        crate::hash::verify_password(&self.password, candidate)
    }
}

/// Flood control thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    pub enabled: bool,
    /// Lines stop being processed while a user's score is at or above this
    pub penalty_threshold: u32,
    /// Score added per received line
    pub score_per_line: u32,
    /// Score removed per decay tick
    pub decay_per_tick: u32,
    /// Seconds between decay ticks
    pub tick_seconds: u64,
    /// Receive-queue soft byte limit (warn)
    pub recvq_soft: usize,
    /// Receive-queue hard byte limit (disconnect)
    pub recvq_hard: usize,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            penalty_threshold: 10,
            score_per_line: 1,
            decay_per_tick: 2,
            tick_seconds: 1,
            recvq_soft: 512,
            recvq_hard: 1024,
        }
    }
}

/// Registration and liveness windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds a connection may spend unregistered
    pub authorization: u64,
    /// A registered client whose last PONG is older than this is dead
    pub pong_staleness: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            authorization: 60,
            pong_staleness: 180,
        }
    }
}

/// Asynchronous lookup behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub dns: bool,
    pub ident: bool,
    pub dns_timeout: u64,
    pub ident_timeout: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            dns: true,
            ident: true,
            dns_timeout: 5,
            ident_timeout: 8,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|e| Error::Config(format!("parse error: {}", e)))?;
        Ok(config)
    }

    /// Write configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("serialize error: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration. Called before startup; any failure here
    /// is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.server.name.is_empty() {
            return Err(Error::Config("server name cannot be empty".to_string()));
        }
        if self.listeners.is_empty() {
            return Err(Error::Config(
                "at least one listener must be configured".to_string(),
            ));
        }
        for listener in &self.listeners {
            if listener.port == 0 {
                return Err(Error::Config(format!(
                    "listener {} has port 0",
                    listener.address
                )));
            }
            if listener.max_connections == 0 {
                return Err(Error::Config(format!(
                    "listener {}:{} allows zero connections",
                    listener.address, listener.port
                )));
            }
            if listener.ping_frequency == 0 {
                return Err(Error::Config(format!(
                    "listener {}:{} has zero ping frequency",
                    listener.address, listener.port
                )));
            }
        }
        if self.flood.recvq_soft >= self.flood.recvq_hard {
            return Err(Error::Config(
                "recvq soft limit must be below the hard limit".to_string(),
            ));
        }
        if self.flood.enabled && self.flood.tick_seconds == 0 {
            return Err(Error::Config("flood tick cannot be zero".to_string()));
        }
        for op in &self.operators {
            if op.name.is_empty() || op.password.is_empty() {
                return Err(Error::Config(
                    "operator entries need a name and a password".to_string(),
                ));
            }
            if op.mask.is_empty() {
                return Err(Error::Config(format!(
                    "operator {} has an empty mask",
                    op.name
                )));
            }
        }
        Ok(())
    }

    /// Find an operator block by name.
    pub fn find_operator(&self, name: &str) -> Option<&OperatorConfig> {
        self.operators.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with_listener() -> Config {
        Config {
            listeners: vec![ListenerConfig::default()],
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = config_with_listener();
        assert!(config.validate().is_ok());
        assert_eq!(config.flood.recvq_soft, 512);
        assert_eq!(config.flood.recvq_hard, 1024);
    }

    #[test]
    fn test_no_listeners_rejected() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_recvq_limits_rejected() {
        let mut config = config_with_listener();
        config.flood.recvq_soft = 4096;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let mut config = config_with_listener();
        config.server.name = "irc.test.org".to_string();
        config.operators.push(OperatorConfig {
            name: "admin".to_string(),
            mask: "*!*@localhost".to_string(),
            password: "$SHA256$deadbeef".to_string(),
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferricd.toml");
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.name, "irc.test.org");
        assert_eq!(loaded.listeners.len(), 1);
        assert_eq!(loaded.operators[0].name, "admin");
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_parse_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[server").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_find_operator() {
        let mut config = config_with_listener();
        config.operators.push(OperatorConfig {
            name: "alice".to_string(),
            mask: "*!*@*".to_string(),
            password: "x".to_string(),
        });
        assert!(config.find_operator("alice").is_some());
        assert!(config.find_operator("bob").is_none());
    }
}
