/// Why a circuit could not be built.
///
/// None of these are fatal; the previously published circuit stays active and
/// the next rotation tick tries again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CircuitError {
    #[error("not enough peers: have {available}, need {required}")]
    InsufficientPeers { available: usize, required: usize },
    #[error("not enough intermediate hops: have {available}, need {required}")]
    InsufficientHops { available: usize, required: usize },
    #[error("no exit-capable peer in {country:?}")]
    NoSuitableExit { country: Option<String> },
}

impl CircuitError {
    /// Stable reason code for logs and metrics.
    pub fn reason(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            CircuitError::InsufficientPeers { available: 1, required: 3 }.reason(),
            "insufficient_peers"
        );
        assert_eq!(
            CircuitError::InsufficientHops { available: 1, required: 2 }.reason(),
            "insufficient_hops"
        );
        assert_eq!(
            CircuitError::NoSuitableExit { country: Some("FR".into()) }.reason(),
            "no_suitable_exit"
        );
    }
}
