//! Picking the address a node advertises.

use std::net::IpAddr;

use libp2p::{Multiaddr, multiaddr::Protocol};

/// The IP component of `addr`, if it has one.
pub fn ip_of(addr: &Multiaddr) -> Option<IpAddr> {
    addr.iter().find_map(|p| match p {
        Protocol::Ip4(ip) => Some(IpAddr::V4(ip)),
        Protocol::Ip6(ip) => Some(IpAddr::V6(ip)),
        _ => None,
    })
}

/// Best address to advertise out of `addrs`.
///
/// Prefers the first routable IPv4 address (not loopback, not unspecified),
/// falling back to the first address given.
pub fn best_address<'a, I>(addrs: I) -> Option<&'a Multiaddr>
where
    I: IntoIterator<Item = &'a Multiaddr>,
{
    let mut first = None;
    for addr in addrs {
        first.get_or_insert(addr);
        if let Some(IpAddr::V4(ip)) = ip_of(addr)
            && !ip.is_loopback()
            && !ip.is_unspecified()
        {
            return Some(addr);
        }
    }
    first
}
