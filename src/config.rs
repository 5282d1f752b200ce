//! Node configuration.
//!
//! A [`NodeConfig`] can be built in code with [`NodeConfigBuilder`],
//! deserialized with serde, or read from `STOPWAIT_*` environment
//! variables:
//!
//! | Variable | Field | Example |
//! |---|---|---|
//! | `STOPWAIT_ADDRESS` | `address` | `7` |
//! | `STOPWAIT_MAC` | `mac` | `02:00:00:00:00:07` |
//! | `STOPWAIT_TIMEOUT_MS` | `retransmit_timeout_ms` | `1000` |
//! | `STOPWAIT_BIND_ADDR` | `bind_addr` | `0.0.0.0:40007` |
//! | `STOPWAIT_PEERS` | `segment_peers` | `10.0.0.2:40002,10.0.0.3:40003` |

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{DEFAULT_RETRANSMIT_TIMEOUT, MacAddr, NetAddr, StopWaitError, StopWaitResult};

const ENV_ADDRESS: &str = "STOPWAIT_ADDRESS";
const ENV_MAC: &str = "STOPWAIT_MAC";
const ENV_TIMEOUT_MS: &str = "STOPWAIT_TIMEOUT_MS";
const ENV_BIND_ADDR: &str = "STOPWAIT_BIND_ADDR";
const ENV_PEERS: &str = "STOPWAIT_PEERS";

/// Configuration for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network address of this node.
    pub address: NetAddr,

    /// Delivery address of this node.
    pub mac: MacAddr,

    /// Fixed retransmission timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub retransmit_timeout_ms: u64,

    /// UDP socket address emulating this node's attachment to the segment.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// UDP socket addresses of the other stations on the segment.
    #[serde(default)]
    pub segment_peers: Vec<SocketAddr>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_RETRANSMIT_TIMEOUT.as_millis() as u64
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: NetAddr(1),
            mac: MacAddr::new([0x02, 0, 0, 0, 0, 0x01]),
            retransmit_timeout_ms: default_timeout_ms(),
            bind_addr: default_bind_addr(),
            segment_peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Retransmission timeout as a [`Duration`].
    pub fn retransmit_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmit_timeout_ms)
    }

    /// Check the configuration for values the protocol cannot run with.
    pub fn validate(&self) -> StopWaitResult<()> {
        if self.retransmit_timeout_ms == 0 {
            return Err(StopWaitError::Config(
                "retransmit timeout must be greater than zero".into(),
            ));
        }
        if self.mac.is_broadcast() {
            return Err(StopWaitError::Config(
                "node MAC address cannot be the broadcast address".into(),
            ));
        }
        Ok(())
    }

    /// Read the configuration from `STOPWAIT_*` environment variables.
    ///
    /// `STOPWAIT_ADDRESS` and `STOPWAIT_MAC` are required; the rest fall
    /// back to defaults.
    pub fn from_env() -> StopWaitResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> StopWaitResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| StopWaitError::Config(format!("{key} is not set")))
        };

        let address = parse_var(ENV_ADDRESS, &required(ENV_ADDRESS)?).map(NetAddr)?;
        let mac = parse_var(ENV_MAC, &required(ENV_MAC)?)?;

        let mut config = NodeConfig {
            address,
            mac,
            ..NodeConfig::default()
        };

        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            config.retransmit_timeout_ms = parse_var(ENV_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = parse_var(ENV_BIND_ADDR, &value)?;
        }
        if let Some(value) = lookup(ENV_PEERS) {
            config.segment_peers = value
                .split(',')
                .map(str::trim)
                .filter(|peer| !peer.is_empty())
                .map(|peer| parse_var(ENV_PEERS, peer))
                .collect::<StopWaitResult<_>>()?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T>(key: &str, value: &str) -> StopWaitResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| StopWaitError::Config(format!("{key}={value:?}: {e}")))
}

/// Builder for a [`NodeConfig`].
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the network address.
    pub fn address(mut self, address: NetAddr) -> Self {
        self.config.address = address;
        self
    }

    /// Set the delivery address.
    pub fn mac(mut self, mac: MacAddr) -> Self {
        self.config.mac = mac;
        self
    }

    /// Set the retransmission timeout.
    pub fn retransmit_timeout(mut self, timeout: Duration) -> Self {
        self.config.retransmit_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the UDP bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Add a station to the emulated segment.
    pub fn segment_peer(mut self, addr: SocketAddr) -> Self {
        self.config.segment_peers.push(addr);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> NodeConfig {
        self.config
    }
}
