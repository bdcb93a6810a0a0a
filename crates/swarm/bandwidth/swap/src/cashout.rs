//! Cashing received cheques on-chain.
//!
//! Every cash-out goes through the [`TxScheduler`] under the request type
//! [`cashout_type_id`], so it survives restarts and never races other
//! transactions of the node. The outcome is read from the receipt
//! notification, counted, and forwarded to an optional
//! [`CashoutResultHandler`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use alloy_primitives::Address;
use auto_impl::auto_impl;
use eyre::eyre;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, warn};
use vertex_observability::{Action, SwapLogger};
use vertex_swarm_bandwidth_chain::{
    ChainBackend, Receipt, ReceiptNotification, RequestState, RequestTypeId, SendRequest,
    StateChangedNotification, TxRequestHandlers, TxScheduler,
};
use vertex_swarm_bandwidth_chequebook::Cheque;
use vertex_swarm_bandwidth_contracts::{CASH_CHEQUE_GAS_LIMIT, CashChequeResult, SimpleSwap};
use vertex_swarm_bandwidth_primitives::Uint256;

use crate::SwapError;
use crate::metrics::CashoutMetrics;

/// Handler name of cash-out requests.
pub const CASHOUT_HANDLER: &str = "CashoutProcessor";

/// Request type of cash-out requests.
pub const CASHOUT_REQUEST_TYPE: &str = "CashoutRequest";

pub fn cashout_type_id() -> RequestTypeId {
    RequestTypeId::new(CASHOUT_HANDLER, CASHOUT_REQUEST_TYPE)
}

/// When received cheques are cashed automatically.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CashoutStrategy {
    /// Only on explicit request.
    Never,
    /// When the payout exceeds twice the transaction cost.
    #[default]
    Profitable,
    /// Every received cheque.
    Always,
}

/// Payload of a scheduled cash-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashoutRequest {
    pub cheque: Cheque,
    /// Receives the payout.
    pub destination: Address,
}

/// Receives the outcome of confirmed cash-outs.
#[auto_impl(&, Arc, Box)]
pub trait CashoutResultHandler: Send + Sync {
    fn handle_cashout_result(&self, request: &CashoutRequest, result: &CashChequeResult);
}

/// Cashes cheques through the transaction scheduler.
pub struct CashoutProcessor {
    backend: Arc<dyn ChainBackend>,
    scheduler: TxScheduler,
    strategy: RwLock<CashoutStrategy>,
    result_handler: RwLock<Option<Arc<dyn CashoutResultHandler>>>,
    metrics: CashoutMetrics,
    logger: SwapLogger,
}

impl std::fmt::Debug for CashoutProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CashoutProcessor")
            .field("strategy", &*self.strategy.read())
            .finish_non_exhaustive()
    }
}

impl CashoutProcessor {
    pub fn new(scheduler: TxScheduler, strategy: CashoutStrategy, logger: SwapLogger) -> Self {
        Self {
            backend: scheduler.backend().clone(),
            scheduler,
            strategy: RwLock::new(strategy),
            result_handler: RwLock::new(None),
            metrics: CashoutMetrics::default(),
            logger,
        }
    }

    pub fn strategy(&self) -> CashoutStrategy {
        *self.strategy.read()
    }

    pub fn set_strategy(&self, strategy: CashoutStrategy) {
        *self.strategy.write() = strategy;
    }

    pub fn set_result_handler(&self, handler: Arc<dyn CashoutResultHandler>) {
        *self.result_handler.write() = Some(handler);
    }

    /// Register the cash-out handlers with the scheduler.
    ///
    /// The handlers hold a weak reference; a notification that arrives after
    /// the processor is dropped fails and stays queued.
    pub async fn register(self: &Arc<Self>) -> Result<(), SwapError> {
        let weak = Arc::downgrade(self);

        let send = {
            let weak = weak.clone();
            move |request: SendRequest| {
                let weak = weak.clone();
                async move {
                    let processor = upgrade(&weak)?;
                    let cashout: CashoutRequest = request.decode_data()?;
                    let span = processor.logger.span(Action::CashCheque);
                    let hash = SimpleSwap::at(cashout.cheque.contract(), request.backend.clone())
                        .cash_cheque_beneficiary_start(
                            &request.opts,
                            cashout.destination,
                            cashout.cheque.cumulative_payout(),
                            cashout.cheque.signature.clone(),
                        )
                        .instrument(span)
                        .await?;
                    Ok::<_, eyre::Report>(hash)
                }
            }
        };

        let receipt = {
            let weak = weak.clone();
            move |notification: ReceiptNotification| {
                let weak = weak.clone();
                async move {
                    let processor = upgrade(&weak)?;
                    processor.on_receipt(notification.id, &notification.receipt)
                }
            }
        };

        let state_changed = move |notification: StateChangedNotification| {
            let weak = weak.clone();
            async move {
                let processor = upgrade(&weak)?;
                processor.on_state_changed(notification.id, notification.new);
                Ok::<_, eyre::Report>(())
            }
        };

        let handlers = TxRequestHandlers::new()
            .with_send(send)
            .with_notify_receipt(receipt)
            .with_notify_state_changed(state_changed);
        self.scheduler
            .set_handlers(cashout_type_id(), handlers)
            .await?;
        Ok(())
    }

    fn on_receipt(&self, id: u64, receipt: &Receipt) -> eyre::Result<()> {
        let _action = self.logger.set_action(Action::CashCheque);
        let request: CashoutRequest = self.scheduler.extra_data(id)?;
        let chequebook = SimpleSwap::at(request.cheque.contract(), self.backend.clone());

        match chequebook.cash_cheque_beneficiary_result(receipt) {
            Ok(result) => {
                if result.bounced {
                    self.metrics.bounced.increment(1);
                    warn!(
                        id,
                        chequebook = %request.cheque.contract(),
                        payout = %result.total_payout,
                        "Cheque bounced"
                    );
                } else {
                    self.metrics.cashed.increment(1);
                    info!(
                        id,
                        chequebook = %request.cheque.contract(),
                        payout = %result.total_payout,
                        "Cheque cashed"
                    );
                }
                let handler = self.result_handler.read().clone();
                if let Some(handler) = handler {
                    handler.handle_cashout_result(&request, &result);
                }
            }
            Err(e) => {
                self.metrics.errors.increment(1);
                warn!(id, error = %e, "Cash-out failed");
            }
        }
        Ok(())
    }

    fn on_state_changed(&self, id: u64, state: RequestState) {
        match state {
            RequestState::StatusUnknown => {
                self.metrics.errors.increment(1);
                warn!(id, "Cash-out transaction status unknown");
            }
            RequestState::Cancelled => warn!(id, "Cash-out cancelled"),
            _ => debug!(id, %state, "Cash-out state changed"),
        }
    }

    /// Expected payout of cashing `cheque` now, and the transaction cost.
    pub async fn estimate_payout(&self, cheque: &Cheque) -> Result<(Uint256, Uint256), SwapError> {
        let chequebook = SimpleSwap::at(cheque.contract(), self.backend.clone());
        let paid_out = chequebook.paid_out(cheque.beneficiary()).await?;
        let expected = cheque.cumulative_payout().saturating_sub(paid_out);

        let gas_price = self.backend.suggest_gas_price().await?;
        let cost = Uint256::from(gas_price).checked_mul(Uint256::from_u64(CASH_CHEQUE_GAS_LIMIT))?;
        Ok((expected, cost))
    }

    /// Cash `cheque` if the strategy allows it. Returns the request id when
    /// a cash-out was scheduled.
    pub async fn submit_cheque(
        &self,
        cheque: &Cheque,
        destination: Address,
    ) -> Result<Option<u64>, SwapError> {
        match self.strategy() {
            CashoutStrategy::Never => return Ok(None),
            CashoutStrategy::Always => {}
            CashoutStrategy::Profitable => {
                let (expected, cost) = self.estimate_payout(cheque).await?;
                if expected <= cost.checked_mul(Uint256::from_u64(2))? {
                    debug!(%expected, %cost, "Cash-out not profitable");
                    return Ok(None);
                }
            }
        }
        self.cash_cheque(cheque, destination).await.map(Some)
    }

    /// Schedule a cash-out regardless of the strategy.
    pub async fn cash_cheque(&self, cheque: &Cheque, destination: Address) -> Result<u64, SwapError> {
        let request = CashoutRequest {
            cheque: cheque.clone(),
            destination,
        };
        let id = self
            .scheduler
            .schedule_request(&cashout_type_id(), &request)
            .await?;
        debug!(
            id,
            chequebook = %cheque.contract(),
            payout = %cheque.cumulative_payout(),
            "Cash-out scheduled"
        );
        Ok(id)
    }

    /// Schedule a cash-out and wait up to `timeout` for its result.
    pub async fn cash_cheque_direct(
        &self,
        cheque: &Cheque,
        destination: Address,
        timeout: Duration,
    ) -> Result<CashChequeResult, SwapError> {
        let id = self.cash_cheque(cheque, destination).await?;
        let receipt = self.scheduler.wait_for_request(id, timeout).await?;
        let chequebook = SimpleSwap::at(cheque.contract(), self.backend.clone());
        Ok(chequebook.cash_cheque_beneficiary_result(&receipt)?)
    }
}

fn upgrade(weak: &Weak<CashoutProcessor>) -> eyre::Result<Arc<CashoutProcessor>> {
    weak.upgrade().ok_or_else(|| eyre!("cashout processor dropped"))
}
