//! SWAP metrics.

use metrics::Counter;

/// Cheque exchange counters of the engine.
#[derive(Clone, Debug)]
pub struct SwapMetrics {
    /// Cheques issued to peers
    pub(crate) emitted: Counter,
    /// Cheques accepted from peers
    pub(crate) received: Counter,
    /// Cheques refused
    pub(crate) rejected: Counter,
}

impl Default for SwapMetrics {
    fn default() -> Self {
        Self {
            emitted: metrics::counter!("swap.cheques.emitted"),
            received: metrics::counter!("swap.cheques.received"),
            rejected: metrics::counter!("swap.cheques.rejected"),
        }
    }
}

/// Cash-out counters.
#[derive(Clone, Debug)]
pub struct CashoutMetrics {
    /// Cash-outs that paid in full
    pub(crate) cashed: Counter,
    /// Cash-outs the chequebook could not fully cover
    pub(crate) bounced: Counter,
    /// Cash-outs that failed or ended in an unknown state
    pub(crate) errors: Counter,
}

impl Default for CashoutMetrics {
    fn default() -> Self {
        Self {
            cashed: metrics::counter!("swap.cheques.cashed"),
            bounced: metrics::counter!("swap.cheques.cashed.bounced"),
            errors: metrics::counter!("swap.cheques.cashed.errors"),
        }
    }
}
