//! Defaults for the node configuration.
//!
//! Circuit and exchange defaults live with their crates and are re-exported
//! here so every default can be found in one place.

use std::time::Duration;

pub use meshpath_circuit::{
    DEFAULT_HOP_COUNT, DEFAULT_MINIMUM_PEER_COUNT, DEFAULT_ROTATION_INTERVAL,
};
pub use meshpath_net_exchange::{DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_MAX_CONCURRENT_EXCHANGES};

/// Default interval between peer table dumps at debug level.
pub const DEFAULT_PEER_TABLE_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Capacity of the reachable-peer event channel handed to the substrate.
pub const REACHABLE_EVENTS_CAPACITY: usize = 256;

/// Length of an ISO 3166-1 alpha-2 country code.
pub const COUNTRY_CODE_LEN: usize = 2;
