//! Test utilities shared by meshpath crates.
//!
//! - [`MemoryNetwork`] / [`MemorySubstrate`]: an in-process peer-to-peer
//!   layer for driving exchanges without sockets.
//! - [`record`], [`exit_record`], [`peers`]: record fixtures.
//! - [`init_tracing`]: log output captured by the test harness.

mod fixtures;
mod memory;

pub use fixtures::{exit_record, peers, record};
pub use memory::{MemoryNetwork, MemoryStream, MemorySubstrate, memory_pipe};

/// Install a fmt subscriber writing through the test harness.
///
/// Honours `RUST_LOG`. Safe to call from every test; only the first call
/// installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
