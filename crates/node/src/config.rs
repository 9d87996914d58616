//! Node configuration.
//!
//! Plain serde structs with a default for every field, so a configuration
//! source only needs to name what it changes. Durations are written in
//! human-readable form (`"15m"`, `"30s"`).

use std::{path::PathBuf, time::Duration};

use eyre::{WrapErr, bail, ensure};
use libp2p::{Multiaddr, multiaddr::Protocol};
use meshpath_circuit::Policy;
use meshpath_net_exchange::{ExchangeConfig, PeerReachable};
use meshpath_observability::LogConfig;
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub policy: PolicyConfig,

    /// What this node advertises about itself.
    #[serde(default)]
    pub local: LocalRecordConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Circuit selection policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Only exit through peers in this country (two-letter code). Unset or
    /// empty means any country.
    #[serde(default)]
    pub exit_country: Option<String>,

    #[serde(default = "default_rotation_interval", with = "humantime_duration")]
    pub circuit_rotation_interval: Duration,

    #[serde(default = "default_hop_count")]
    pub hop_count: usize,

    #[serde(default = "default_minimum_peer_count")]
    pub minimum_peer_count: usize,
}

/// Self-reported metadata sent to every peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalRecordConfig {
    /// Two-letter country code, or empty when unknown.
    #[serde(default)]
    pub country_code: String,

    #[serde(default)]
    pub bandwidth_score: f64,

    /// Offer to act as a circuit exit.
    #[serde(default)]
    pub exit_capable: bool,

    /// MaxMind country database used to fill in `country_code` when it is
    /// left empty. A database that cannot be opened only disables the lookup.
    #[serde(default)]
    pub geoip_database_path: Option<PathBuf>,
}

/// Exchange and peer bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_exchange_timeout", with = "humantime_duration")]
    pub exchange_timeout: Duration,

    #[serde(default = "default_max_concurrent_exchanges")]
    pub max_concurrent_exchanges: usize,

    #[serde(default = "default_peer_table_log_interval", with = "humantime_duration")]
    pub peer_table_log_interval: Duration,

    /// Peers to exchange with at startup, as multiaddrs ending in `/p2p/<id>`.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            exit_country: None,
            circuit_rotation_interval: default_rotation_interval(),
            hop_count: default_hop_count(),
            minimum_peer_count: default_minimum_peer_count(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: default_exchange_timeout(),
            max_concurrent_exchanges: default_max_concurrent_exchanges(),
            peer_table_log_interval: default_peer_table_log_interval(),
            bootstrap_peers: Vec::new(),
        }
    }
}

fn default_rotation_interval() -> Duration {
    DEFAULT_ROTATION_INTERVAL
}

fn default_hop_count() -> usize {
    DEFAULT_HOP_COUNT
}

fn default_minimum_peer_count() -> usize {
    DEFAULT_MINIMUM_PEER_COUNT
}

fn default_exchange_timeout() -> Duration {
    DEFAULT_EXCHANGE_TIMEOUT
}

fn default_max_concurrent_exchanges() -> usize {
    DEFAULT_MAX_CONCURRENT_EXCHANGES
}

fn default_peer_table_log_interval() -> Duration {
    DEFAULT_PEER_TABLE_LOG_INTERVAL
}

impl NodeConfig {
    /// Check every value the node cannot run with.
    pub fn validate(&self) -> eyre::Result<()> {
        let policy = &self.policy;
        ensure!(policy.hop_count > 0, "hop_count must be at least 1");
        ensure!(
            !policy.circuit_rotation_interval.is_zero(),
            "circuit_rotation_interval must be non-zero"
        );
        if let Some(country) = policy.exit_country.as_deref().filter(|c| !c.is_empty()) {
            validate_country_code(country).wrap_err("invalid exit_country")?;
        }

        let local = &self.local;
        if !local.country_code.is_empty() {
            validate_country_code(&local.country_code).wrap_err("invalid local country_code")?;
        }
        ensure!(
            local.bandwidth_score.is_finite() && local.bandwidth_score >= 0.0,
            "bandwidth_score must be a non-negative number, got {}",
            local.bandwidth_score
        );

        let network = &self.network;
        ensure!(
            !network.exchange_timeout.is_zero(),
            "exchange_timeout must be non-zero"
        );
        ensure!(
            network.max_concurrent_exchanges > 0,
            "max_concurrent_exchanges must be at least 1"
        );
        ensure!(
            !network.peer_table_log_interval.is_zero(),
            "peer_table_log_interval must be non-zero"
        );
        self.bootstrap_peers()?;

        Ok(())
    }

    pub fn policy(&self) -> Policy {
        Policy {
            exit_country: self.policy.exit_country.clone().filter(|c| !c.is_empty()),
            hop_count: self.policy.hop_count,
            rotation_interval: self.policy.circuit_rotation_interval,
            minimum_peer_count: self.policy.minimum_peer_count,
        }
    }

    pub fn exchange(&self) -> ExchangeConfig {
        ExchangeConfig::default()
            .with_timeout(self.network.exchange_timeout)
            .with_max_concurrent(self.network.max_concurrent_exchanges)
    }

    /// Parse the bootstrap peers into reachability events.
    pub fn bootstrap_peers(&self) -> eyre::Result<Vec<PeerReachable>> {
        self.network
            .bootstrap_peers
            .iter()
            .map(|s| -> eyre::Result<PeerReachable> {
                let address: Multiaddr = s
                    .parse()
                    .wrap_err_with(|| format!("invalid bootstrap peer address {s:?}"))?;
                let Some(peer_id) = address.iter().find_map(|p| match p {
                    Protocol::P2p(peer_id) => Some(peer_id),
                    _ => None,
                }) else {
                    bail!("bootstrap peer address {s:?} has no /p2p/ component");
                };
                Ok(PeerReachable::new(peer_id).with_address(address))
            })
            .collect()
    }
}

fn validate_country_code(code: &str) -> eyre::Result<()> {
    ensure!(
        code.len() == COUNTRY_CODE_LEN && code.bytes().all(|b| b.is_ascii_uppercase()),
        "expected a two-letter upper-case country code, got {code:?}"
    );
    Ok(())
}

/// Serde adapter writing a [`Duration`] as a humantime string.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*duration))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        humantime::parse_duration(&s).map_err(D::Error::custom)
    }
}
