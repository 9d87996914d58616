use std::time::Duration;

/// Default bound on one exchange, from stream open to final write.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of exchanges allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_EXCHANGES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT_EXCHANGES,
        }
    }
}

impl ExchangeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }
}
