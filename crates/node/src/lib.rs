//! Meshpath node core.
//!
//! Exchanges self-reported metadata with every reachable peer and keeps a
//! randomly selected multi-hop circuit through them, rotated on a timer.
//!
//! An embedding binary owns the libp2p swarm, the [`TaskManager`] and the
//! process lifecycle:
//!
//! ```ignore
//! let tasks = TaskManager::current();
//! let control = swarm.behaviour().stream.new_control();
//! let (substrate, mut address_hints) = StreamSubstrate::new(local_peer_id, control);
//! let node = Node::new(substrate, config, &listen_addrs, tasks.executor())?;
//! let reachable = node.start()?;
//! // in the swarm loop:
//! //   address_hints.recv() => swarm.add_peer_address(peer_id, address)
//! //   new connection       => reachable.send(PeerReachable::new(peer_id)).await?
//! ```
//!
//! [`TaskManager`]: meshpath_tasks::TaskManager

pub mod address;
pub mod config;
pub mod constants;
pub mod geoip;
mod node;
mod record;

pub use config::{LocalRecordConfig, NetworkConfig, NodeConfig, PolicyConfig};
pub use geoip::{CountryLookup, GeoIp};
pub use node::Node;
pub use record::local_record;
