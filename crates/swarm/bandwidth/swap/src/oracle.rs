//! Honey to wei conversion.

use std::time::{Duration, Instant};

use auto_impl::auto_impl;
use parking_lot::Mutex;
use tracing::debug;

/// How long a fixed rate is trusted before [`FixedRateOracle::refresh`] runs.
pub const DEFAULT_ORACLE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("cannot price negative amount {0}")]
    NegativeAmount(i64),

    #[error("price of {0} honey overflows")]
    Overflow(i64),
}

/// Converts honey into the on-chain currency.
#[auto_impl(&, Arc)]
pub trait PriceOracle: Send + Sync {
    fn get_price(&self, honey: i64) -> Result<i64, OracleError>;
}

/// Oracle with a configured fixed exchange rate.
#[derive(Debug)]
pub struct FixedRateOracle {
    rate: i64,
    ttl: Duration,
    refreshed_at: Mutex<Instant>,
}

impl FixedRateOracle {
    pub fn new(rate: i64) -> Self {
        Self {
            rate,
            ttl: DEFAULT_ORACLE_TTL,
            refreshed_at: Mutex::new(Instant::now()),
        }
    }

    pub fn rate(&self) -> i64 {
        self.rate
    }

    /// Re-read the rate. The rate is fixed, so only the timestamp moves.
    pub fn refresh(&self) {
        *self.refreshed_at.lock() = Instant::now();
        debug!(rate = self.rate, "Oracle rate refreshed");
    }

    fn refresh_if_expired(&self) {
        let expired = self.refreshed_at.lock().elapsed() >= self.ttl;
        if expired {
            self.refresh();
        }
    }
}

impl Default for FixedRateOracle {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PriceOracle for FixedRateOracle {
    fn get_price(&self, honey: i64) -> Result<i64, OracleError> {
        if honey < 0 {
            return Err(OracleError::NegativeAmount(honey));
        }
        self.refresh_if_expired();
        honey
            .checked_mul(self.rate)
            .ok_or(OracleError::Overflow(honey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn test_fixed_rate() {
        let oracle = FixedRateOracle::new(3);
        assert_eq!(oracle.get_price(0).unwrap(), 0);
        assert_eq!(oracle.get_price(1000).unwrap(), 3000);
    }

    #[test]
    fn test_rejects_negative_and_overflow() {
        let oracle = FixedRateOracle::new(2);
        assert_matches!(oracle.get_price(-1), Err(OracleError::NegativeAmount(-1)));
        assert_matches!(oracle.get_price(i64::MAX), Err(OracleError::Overflow(_)));
    }

    #[test]
    fn test_expired_rate_is_refreshed() {
        let oracle = FixedRateOracle {
            ttl: Duration::ZERO,
            ..FixedRateOracle::new(1)
        };
        let before = *oracle.refreshed_at.lock();
        oracle.get_price(1).unwrap();
        assert!(*oracle.refreshed_at.lock() >= before);
    }

    #[test]
    fn test_shared_oracle() {
        let oracle: Arc<dyn PriceOracle> = Arc::new(FixedRateOracle::default());
        assert_eq!(oracle.get_price(7).unwrap(), 7);
    }
}
