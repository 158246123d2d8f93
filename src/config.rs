//! Line-oriented `key value` config file loader, expressed as a typed
//! struct instead of a runtime string lookup table.

use std::fmt;
use std::fs;
use std::net::SocketAddrV4;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(String, #[source] std::io::Error),

    #[error("missing required config key '{0}'")]
    MissingKey(&'static str),

    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Shard,
    Replica,
}

impl FromStr for NodeType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shard" => Ok(NodeType::Shard),
            "replica" => Ok(NodeType::Replica),
            _ => Err(()),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Shard => write!(f, "shard"),
            NodeType::Replica => write!(f, "replica"),
        }
    }
}

/// A fully-parsed server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub id: i32,
    pub node_type: NodeType,
    pub host: SocketAddrV4,
    pub shard_leaders: Vec<SocketAddrV4>,
    pub raft_replicas: Vec<SocketAddrV4>,
    pub raft_heartbeat_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            id: 0,
            node_type: NodeType::Shard,
            host: "127.0.0.1:18777".parse().unwrap(),
            shard_leaders: vec![
                "127.0.0.1:8777".parse().unwrap(),
                "127.0.0.1:8877".parse().unwrap(),
                "127.0.0.1:8977".parse().unwrap(),
            ],
            raft_replicas: vec![
                "127.0.0.1:9777".parse().unwrap(),
                "127.0.0.1:9778".parse().unwrap(),
            ],
            raft_heartbeat_ms: 150,
        }
    }
}

impl Config {
    /// Loads a config file of `key value` lines, `#`-prefixed comments and
    /// blank lines ignored. Unset keys fall back to [`Config::default`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|err| ConfigError::Read(path.display().to_string(), err))?;

        let mut raw = std::collections::HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once(' ') {
                raw.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let defaults = Config::default();
        let id = match raw.get("id") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "id", value: v.clone() })?,
            None => defaults.id,
        };
        let node_type = match raw.get("type") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "type", value: v.clone() })?,
            None => defaults.node_type,
        };
        let host = match raw.get("host") {
            Some(v) => parse_addr(v, "host")?,
            None => defaults.host,
        };
        let shard_leaders = match raw.get("shard_leaders") {
            Some(v) => parse_addr_list(v, "shard_leaders")?,
            None => defaults.shard_leaders,
        };
        let raft_replicas = match raw.get("raft_replicas") {
            Some(v) => parse_addr_list(v, "raft_replicas")?,
            None => defaults.raft_replicas,
        };
        let raft_heartbeat_ms = match raw.get("raft_heartbeat_ms") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "raft_heartbeat_ms",
                value: v.clone(),
            })?,
            None => defaults.raft_heartbeat_ms,
        };

        Ok(Config {
            id,
            node_type,
            host,
            shard_leaders,
            raft_replicas,
            raft_heartbeat_ms,
        })
    }
}

fn parse_addr(value: &str, key: &'static str) -> Result<SocketAddrV4> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value: value.to_string() })
}

fn parse_addr_list(value: &str, key: &'static str) -> Result<Vec<SocketAddrV4>> {
    value.split_whitespace().map(|v| parse_addr(v, key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = Config::default();
        assert_eq!(config.id, 0);
        assert_eq!(config.node_type, NodeType::Shard);
        assert_eq!(config.shard_leaders.len(), 3);
    }

    #[test]
    fn loads_overrides_and_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# a comment").unwrap();
        writeln!(file, "id 2").unwrap();
        writeln!(file, "type replica").unwrap();
        writeln!(file, "host 10.0.0.1:9000").unwrap();
        writeln!(file, "raft_heartbeat_ms 500").unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.id, 2);
        assert_eq!(config.node_type, NodeType::Replica);
        assert_eq!(config.host, "10.0.0.1:9000".parse().unwrap());
        assert_eq!(config.raft_heartbeat_ms, 500);
        assert_eq!(config.shard_leaders, Config::default().shard_leaders);
    }
}
