//! Resolving the local country code from the advertised IP address.

use std::{fmt, net::IpAddr, path::Path};

use eyre::WrapErr;
use maxminddb::{Reader, geoip2};
use tracing::{debug, info};

use crate::constants::COUNTRY_CODE_LEN;

/// Maps an IP address to a two-letter country code.
pub trait CountryLookup: Send + Sync {
    /// The country `ip` is located in, or `None` when unknown.
    fn country_code(&self, ip: IpAddr) -> Option<String>;
}

/// [`CountryLookup`] over a MaxMind GeoIP2/GeoLite2 country database.
pub struct GeoIp {
    reader: Reader<Vec<u8>>,
}

impl GeoIp {
    /// Load the database at `path` into memory.
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path)
            .wrap_err_with(|| format!("failed to open GeoIP database at {}", path.display()))?;
        info!(path = %path.display(), "GeoIP database loaded");
        Ok(Self { reader })
    }
}

impl fmt::Debug for GeoIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoIp")
            .field("database_type", &self.reader.metadata.database_type)
            .finish()
    }
}

impl CountryLookup for GeoIp {
    fn country_code(&self, ip: IpAddr) -> Option<String> {
        let record = match self.reader.lookup::<geoip2::Country<'_>>(ip) {
            Ok(record) => record,
            Err(e) => {
                debug!(%ip, error = %e, "GeoIP lookup failed");
                return None;
            }
        };

        record
            .country
            .and_then(|country| country.iso_code)
            .filter(|code| code.len() == COUNTRY_CODE_LEN)
            .map(str::to_ascii_uppercase)
    }
}
