use std::time::Duration;

/// Default number of intermediate hops.
pub const DEFAULT_HOP_COUNT: usize = 2;

/// Default time between circuit rebuilds.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default number of known peers required before a build is attempted.
pub const DEFAULT_MINIMUM_PEER_COUNT: usize = 3;

/// Constraints on circuit selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Only exit through peers reporting this country code. An empty code
    /// sets no filter.
    pub exit_country: Option<String>,
    /// Number of intermediate hops before the exit.
    pub hop_count: usize,
    pub rotation_interval: Duration,
    pub minimum_peer_count: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            exit_country: None,
            hop_count: DEFAULT_HOP_COUNT,
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            minimum_peer_count: DEFAULT_MINIMUM_PEER_COUNT,
        }
    }
}

impl Policy {
    /// Restrict exits to `country`. An empty code clears the filter.
    pub fn with_exit_country(mut self, country: impl Into<String>) -> Self {
        self.exit_country = Some(country.into()).filter(|c| !c.is_empty());
        self
    }

    pub fn with_hop_count(mut self, hop_count: usize) -> Self {
        self.hop_count = hop_count;
        self
    }

    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    pub fn with_minimum_peer_count(mut self, count: usize) -> Self {
        self.minimum_peer_count = count;
        self
    }

    /// The country exits are restricted to, if any.
    pub fn exit_country(&self) -> Option<&str> {
        self.exit_country.as_deref().filter(|c| !c.is_empty())
    }

    /// Remote peers needed for a build: the configured minimum, and never
    /// fewer than the hops plus the exit.
    pub fn required_peers(&self) -> usize {
        self.minimum_peer_count.max(self.hop_count.saturating_add(1))
    }
}
