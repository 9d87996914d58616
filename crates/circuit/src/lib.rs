//! Circuit selection and rotation.
//!
//! A [`Circuit`] is an ordered list of intermediate peers followed by one exit
//! peer, chosen at random from the peer store under a [`Policy`].
//! [`select_circuit`] is the selection itself; [`CircuitManager`] publishes
//! its results and rebuilds them on a timer.
//!
//! Only the path is chosen here. Relaying traffic over it is left to the
//! embedding layer.

mod circuit;
mod error;
mod manager;
mod policy;
mod selector;

pub use circuit::Circuit;
pub use error::CircuitError;
pub use manager::CircuitManager;
pub use policy::{DEFAULT_HOP_COUNT, DEFAULT_MINIMUM_PEER_COUNT, DEFAULT_ROTATION_INTERVAL, Policy};
pub use selector::select_circuit;
