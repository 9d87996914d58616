use libp2p::{Multiaddr, PeerId};
use meshpath_net_peer_store::PeerRecord;
use tracing::debug;

use crate::{
    address::{best_address, ip_of},
    config::LocalRecordConfig,
    geoip::CountryLookup,
};

/// The record this node advertises, built from its identity, its listen
/// addresses and the configured metadata.
///
/// A configured country code wins. Without one, `countries` resolves the
/// country of the advertised address.
pub fn local_record(
    peer_id: PeerId,
    config: &LocalRecordConfig,
    listen_addrs: &[Multiaddr],
    countries: Option<&dyn CountryLookup>,
) -> PeerRecord {
    let best = best_address(listen_addrs);
    let address = best.map(ToString::to_string).unwrap_or_default();

    let mut country_code = config.country_code.clone();
    if country_code.is_empty()
        && let Some(lookup) = countries
        && let Some(ip) = best.and_then(ip_of)
    {
        country_code = lookup.country_code(ip).unwrap_or_default();
        debug!(%ip, %country_code, "resolved local country");
    }

    PeerRecord::from(peer_id)
        .with_address(address)
        .with_country_code(country_code)
        .with_bandwidth_score(config.bandwidth_score)
        .with_exit_capable(config.exit_capable)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, net::IpAddr};

    use super::*;

    struct StaticLookup(HashMap<IpAddr, &'static str>);

    impl CountryLookup for StaticLookup {
        fn country_code(&self, ip: IpAddr) -> Option<String> {
            self.0.get(&ip).map(|c| c.to_string())
        }
    }

    fn lookup() -> StaticLookup {
        StaticLookup(HashMap::from([("203.0.113.7".parse().unwrap(), "JP")]))
    }

    #[test]
    fn test_local_record() {
        let peer = PeerId::random();
        let config = LocalRecordConfig {
            country_code: "SE".into(),
            bandwidth_score: 80.0,
            exit_capable: true,
            ..Default::default()
        };
        let addrs: Vec<Multiaddr> = vec![
            "/ip4/127.0.0.1/tcp/4001".parse().unwrap(),
            "/ip4/203.0.113.7/tcp/4001".parse().unwrap(),
        ];

        let record = local_record(peer, &config, &addrs, Some(&lookup()));
        assert!(record.is_for(&peer));
        assert_eq!(record.address, "/ip4/203.0.113.7/tcp/4001");
        assert_eq!(record.country_code, "SE");
        assert_eq!(record.bandwidth_score, 80.0);
        assert!(record.is_exit_capable);
    }

    #[test]
    fn test_no_listen_addresses() {
        let record = local_record(
            PeerId::random(),
            &LocalRecordConfig::default(),
            &[],
            Some(&lookup()),
        );
        assert!(record.address.is_empty());
        assert!(record.country_code.is_empty());
        assert!(!record.is_exit_capable);
    }

    #[test]
    fn test_country_resolved_from_advertised_address() {
        let config = LocalRecordConfig::default();
        let addrs: Vec<Multiaddr> = vec!["/ip4/203.0.113.7/tcp/4001".parse().unwrap()];

        let record = local_record(PeerId::random(), &config, &addrs, Some(&lookup()));
        assert_eq!(record.country_code, "JP");

        let record = local_record(PeerId::random(), &config, &addrs, None);
        assert!(record.country_code.is_empty());

        // Unknown addresses leave the country empty.
        let addrs: Vec<Multiaddr> = vec!["/ip4/198.51.100.1/tcp/4001".parse().unwrap()];
        let record = local_record(PeerId::random(), &config, &addrs, Some(&lookup()));
        assert!(record.country_code.is_empty());
    }
}
