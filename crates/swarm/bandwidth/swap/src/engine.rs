//! The SWAP accounting engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};
use vertex_observability::{Action, SwapLogger};
use vertex_storage::{StateStore, StateStoreExt, StoreBatch};
use vertex_swarm_bandwidth_chain::{
    ChainBackend, Receipt, RequestTypeId, SchedulerTimeouts, SendRequest, TxRequestHandlers,
    TxScheduler,
};
use vertex_swarm_bandwidth_chequebook::{Cheque, ChequeError, ChequeParams};
use vertex_swarm_bandwidth_contracts::{
    CashChequeResult, ContractError, SimpleSwap, SimpleSwapFactory,
};
use vertex_swarm_bandwidth_primitives::{BoundedIntError, PeerId, Uint256};

use crate::SwapError;
use crate::args::SwapParams;
use crate::cashout::{CashoutProcessor, CashoutResultHandler, CashoutStrategy};
use crate::constants::*;
use crate::metrics::SwapMetrics;
use crate::oracle::{FixedRateOracle, PriceOracle};
use crate::peer::{
    PeerState, SwapPeer, balance_key, pending_cheque_key, received_cheque_key, sent_cheque_key,
};
use crate::protocol::{OutboundMessage, ProtocolState, SwapMessage};

const SWAP_HANDLER: &str = "Swap";

fn deploy_type_id() -> RequestTypeId {
    RequestTypeId::new(SWAP_HANDLER, "DeployChequebook")
}

fn withdraw_type_id() -> RequestTypeId {
    RequestTypeId::new(SWAP_HANDLER, "Withdraw")
}

/// Payload of a chequebook deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeployRequest {
    issuer: Address,
    deposit: Uint256,
    hard_deposit_timeout: u64,
}

/// Payload of a withdrawal from the own chequebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WithdrawRequest {
    chequebook: Address,
    amount: Uint256,
}

/// Assembles a [`Swap`].
pub struct SwapBuilder {
    store: Arc<dyn StateStore>,
    backend: Arc<dyn ChainBackend>,
    signer: Arc<PrivateKeySigner>,
    factory: Address,
    params: SwapParams,
    oracle: Arc<dyn PriceOracle>,
    timeouts: SchedulerTimeouts,
}

impl SwapBuilder {
    pub fn new(
        store: Arc<dyn StateStore>,
        backend: Arc<dyn ChainBackend>,
        signer: Arc<PrivateKeySigner>,
        factory: Address,
    ) -> Self {
        Self {
            store,
            backend,
            signer,
            factory,
            params: SwapParams::default(),
            oracle: Arc::new(FixedRateOracle::default()),
            timeouts: SchedulerTimeouts::default(),
        }
    }

    pub fn params(mut self, params: SwapParams) -> Self {
        self.params = params;
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn PriceOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn scheduler_timeouts(mut self, timeouts: SchedulerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build the engine. Messages for peers are sent on `outbound`.
    pub fn build(self, outbound: mpsc::UnboundedSender<OutboundMessage>) -> Swap {
        let owner = self.signer.address();
        let logger = SwapLogger::new(owner);
        let scheduler = TxScheduler::with_timeouts(
            self.store.clone(),
            self.backend.clone(),
            self.signer.clone(),
            SCHEDULER_PREFIX,
            self.timeouts,
        );
        let cashout = Arc::new(CashoutProcessor::new(
            scheduler.clone(),
            self.params.cashout,
            logger.clone(),
        ));

        Swap {
            store: self.store,
            factory: SimpleSwapFactory::at(self.factory, self.backend.clone()),
            backend: self.backend,
            signer: self.signer,
            owner,
            params: self.params,
            oracle: self.oracle,
            scheduler,
            cashout,
            chequebook: RwLock::new(None),
            peers: RwLock::new(HashMap::new()),
            outbound,
            started: AtomicBool::new(false),
            metrics: SwapMetrics::default(),
            logger,
        }
    }
}

/// Pairwise balances with connected peers, settled with cheques.
///
/// A positive balance means the peer owes us. Once we owe a peer
/// `payment_threshold` honey, a cheque covering the debt is issued; a peer
/// owing us `disconnect_threshold` cannot run up more debt. Every balance
/// change and the cheque it triggers are written in one batch.
pub struct Swap {
    store: Arc<dyn StateStore>,
    backend: Arc<dyn ChainBackend>,
    signer: Arc<PrivateKeySigner>,
    owner: Address,
    factory: SimpleSwapFactory,
    params: SwapParams,
    oracle: Arc<dyn PriceOracle>,
    scheduler: TxScheduler,
    cashout: Arc<CashoutProcessor>,
    chequebook: RwLock<Option<SimpleSwap>>,
    peers: RwLock<HashMap<PeerId, Arc<SwapPeer>>>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    started: AtomicBool,
    metrics: SwapMetrics,
    logger: SwapLogger,
}

impl std::fmt::Debug for Swap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swap")
            .field("owner", &self.owner)
            .field("chequebook", &self.chequebook_address())
            .field("peers", &self.peers.read().len())
            .finish_non_exhaustive()
    }
}

impl Swap {
    /// The node's account.
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn params(&self) -> &SwapParams {
        &self.params
    }

    pub fn scheduler(&self) -> &TxScheduler {
        &self.scheduler
    }

    pub fn cashout(&self) -> &Arc<CashoutProcessor> {
        &self.cashout
    }

    pub(crate) fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn chequebook(&self) -> Option<SimpleSwap> {
        self.chequebook.read().clone()
    }

    pub fn chequebook_address(&self) -> Option<Address> {
        self.chequebook.read().as_ref().map(SimpleSwap::address)
    }

    pub fn set_cashout_strategy(&self, strategy: CashoutStrategy) {
        self.cashout.set_strategy(strategy);
    }

    pub fn set_cashout_result_handler(&self, handler: Arc<dyn CashoutResultHandler>) {
        self.cashout.set_result_handler(handler);
    }

    /// Check the chain, register the transaction handlers, start the
    /// scheduler and set up the chequebook.
    ///
    /// Uses `chequebook` if given, else the one used before, else deploys a
    /// new one funded with `deposit`.
    pub async fn start(
        &self,
        chequebook: Option<Address>,
        deposit: Uint256,
    ) -> Result<(), SwapError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SwapError::AlreadyStarted);
        }
        let span = self.logger.span(Action::Startup);

        async {
            self.check_chain().await?;
            self.factory.verify_self().await?;
            self.register_handlers().await?;
            self.scheduler.start();
            self.start_chequebook(chequebook, deposit).await?;
            info!(chequebook = ?self.chequebook_address(), "Swap started");
            Ok::<_, SwapError>(())
        }
        .instrument(span)
        .await
    }

    /// Halt the scheduler, then close the store.
    pub async fn stop(&self) -> Result<(), SwapError> {
        self.scheduler.stop().await;
        self.store.close()?;
        info!("Swap stopped");
        Ok(())
    }

    async fn check_chain(&self) -> Result<(), SwapError> {
        let actual = self.backend.chain_id().await?;
        match self.store.get_opt::<u64>(CONNECTED_BLOCKCHAIN_KEY)? {
            Some(stored) if stored != actual => Err(SwapError::ChainMismatch { stored, actual }),
            Some(_) => Ok(()),
            None => {
                self.store.put(CONNECTED_BLOCKCHAIN_KEY, &actual)?;
                Ok(())
            }
        }
    }

    async fn register_handlers(&self) -> Result<(), SwapError> {
        self.cashout.register().await?;

        let factory = self.factory.clone();
        let deploy = TxRequestHandlers::new().with_send(move |request: SendRequest| {
            let factory = factory.clone();
            async move {
                let deploy: DeployRequest = request.decode_data()?;
                let opts = request.opts.clone().with_value(deploy.deposit.value());
                let hash = factory
                    .deploy_simple_swap_start(
                        &opts,
                        deploy.issuer,
                        Duration::from_secs(deploy.hard_deposit_timeout),
                    )
                    .await?;
                Ok::<_, eyre::Report>(hash)
            }
        });
        self.scheduler.set_handlers(deploy_type_id(), deploy).await?;

        let withdraw = TxRequestHandlers::new().with_send(|request: SendRequest| async move {
            let withdraw: WithdrawRequest = request.decode_data()?;
            let hash = SimpleSwap::at(withdraw.chequebook, request.backend.clone())
                .withdraw(&request.opts, withdraw.amount)
                .await?;
            Ok::<_, eyre::Report>(hash)
        });
        self.scheduler.set_handlers(withdraw_type_id(), withdraw).await?;
        Ok(())
    }

    /// How long to wait for a scheduled request of our own.
    fn request_timeout(&self) -> Duration {
        self.scheduler.timeouts().receipt_timeout.saturating_mul(2)
    }

    /// Adopt, reuse or deploy the chequebook.
    pub async fn start_chequebook(
        &self,
        chequebook: Option<Address>,
        deposit: Uint256,
    ) -> Result<Address, SwapError> {
        let stored: Option<Address> = self.store.get_opt(CONNECTED_CHEQUEBOOK_KEY)?;

        let contract = match (stored, chequebook) {
            (Some(stored), Some(provided)) if stored != provided => {
                return Err(SwapError::ChequebookMismatch { stored, provided });
            }
            (_, Some(provided)) => {
                self.factory.verify_contract(provided).await?;
                let contract = SimpleSwap::at(provided, self.backend.clone());
                contract.validate_code().await?;
                info!(chequebook = %provided, "Using chequebook");
                contract
            }
            (Some(stored), None) => {
                let contract = SimpleSwap::at(stored, self.backend.clone());
                contract.validate_code().await?;
                info!(chequebook = %stored, "Using stored chequebook");
                contract
            }
            (None, None) => self.deploy_chequebook(deposit).await?,
        };

        let address = contract.address();
        if stored != Some(address) {
            self.store.put(CONNECTED_CHEQUEBOOK_KEY, &address)?;
        }
        *self.chequebook.write() = Some(contract);
        Ok(address)
    }

    async fn deploy_chequebook(&self, deposit: Uint256) -> Result<SimpleSwap, SwapError> {
        let span = self.logger.span(Action::DeployChequebook);
        async {
            info!(%deposit, factory = %self.factory.address(), "Deploying chequebook");
            let request = DeployRequest {
                issuer: self.owner,
                deposit,
                hard_deposit_timeout: self.params.hard_deposit_timeout.as_secs(),
            };
            let id = self
                .scheduler
                .schedule_request(&deploy_type_id(), &request)
                .await?;
            let receipt = self
                .scheduler
                .wait_for_request(id, self.request_timeout())
                .await?;
            let contract = self.factory.deployed_from_receipt(&receipt)?;
            info!(chequebook = %contract.address(), "Chequebook deployed");
            Ok::<_, SwapError>(contract)
        }
        .instrument(span)
        .await
    }

    fn own_chequebook(&self) -> Result<SimpleSwap, SwapError> {
        self.chequebook().ok_or(SwapError::NoChequebook)
    }

    /// Register a connected peer whose chequebook is `contract` and whose
    /// account is `beneficiary`.
    pub async fn add_peer(
        &self,
        peer: PeerId,
        beneficiary: Address,
        contract: Address,
    ) -> Result<Arc<SwapPeer>, SwapError> {
        let logger = self.logger.with_peer(peer);
        self.factory
            .verify_contract(contract)
            .instrument(logger.span(Action::PeerConnect))
            .await?;

        let state = PeerState::load(self.store.as_ref(), &peer)?;
        let _action = logger.set_action(Action::PeerConnect);
        info!(%beneficiary, %contract, balance = state.balance, "Swap peer added");

        let swap_peer = Arc::new(SwapPeer::new(peer, beneficiary, contract, logger, state));
        self.peers.write().insert(peer, swap_peer.clone());
        Ok(swap_peer)
    }

    /// Drop the runtime state of `peer`. Persisted state is kept.
    pub fn remove_peer(&self, peer: &PeerId) -> Option<Arc<SwapPeer>> {
        let removed = self.peers.write().remove(peer);
        if removed.is_some() {
            debug!(%peer, "Swap peer removed");
        }
        removed
    }

    pub fn peer(&self, peer: &PeerId) -> Result<Arc<SwapPeer>, SwapError> {
        self.peers
            .read()
            .get(peer)
            .cloned()
            .ok_or(SwapError::UnknownPeer(*peer))
    }

    pub(crate) fn connected_peers(&self) -> Vec<Arc<SwapPeer>> {
        self.peers.read().values().cloned().collect()
    }

    fn send(&self, peer: &PeerId, message: SwapMessage) -> Result<(), SwapError> {
        debug!(%peer, message = message.name(), "Sending swap message");
        self.outbound
            .send(OutboundMessage {
                peer: *peer,
                message,
            })
            .map_err(|_| SwapError::ChannelClosed)
    }

    /// Account `amount` honey with `peer`: positive when the peer consumed
    /// a priced service from us, negative when we consumed one.
    pub fn add(&self, amount: i64, peer: &PeerId) -> Result<(), SwapError> {
        let swap_peer = self.peer(peer)?;
        let _action = swap_peer.logger.set_action(Action::UpdateBalance);
        let mut state = swap_peer.state.lock();

        if amount > 0 && state.balance >= self.params.disconnect_threshold {
            warn!(balance = state.balance, amount, "Peer is over the disconnect threshold");
            return Err(SwapError::BalanceThresholdExceeded {
                peer: *peer,
                balance: state.balance,
                threshold: self.params.disconnect_threshold,
            });
        }

        let balance = state
            .balance
            .checked_add(amount)
            .ok_or(SwapError::BalanceOverflow(*peer))?;

        let mut batch = StoreBatch::new();
        batch.put(balance_key(peer), &balance)?;

        let cheque = if balance <= -self.params.payment_threshold && state.pending.is_none() {
            let cheque = self.create_cheque(&swap_peer, &state, balance)?;
            batch.put(pending_cheque_key(peer), &cheque)?;
            Some(cheque)
        } else {
            None
        };

        self.store.write_batch(batch)?;
        state.balance = balance;
        debug!(amount, balance, "Balance updated");

        if let Some(cheque) = cheque {
            let _action = swap_peer.logger.set_action(Action::SendCheque);
            state.pending = Some(cheque.clone());
            state.protocol = ProtocolState::ChequeEmitted;
            self.metrics.emitted.increment(1);
            info!(
                honey = cheque.honey,
                cumulative_payout = %cheque.cumulative_payout(),
                "Cheque issued"
            );
            self.send(peer, SwapMessage::EmitCheque { cheque })?;
        }
        Ok(())
    }

    /// Sign a cheque settling a debt of `-balance` honey.
    fn create_cheque(
        &self,
        peer: &SwapPeer,
        state: &PeerState,
        balance: i64,
    ) -> Result<Cheque, SwapError> {
        let contract = self.chequebook_address().ok_or(SwapError::NoChequebook)?;
        let honey = balance
            .checked_neg()
            .ok_or(SwapError::BalanceOverflow(peer.id()))?;
        let amount = self.price(honey)?;

        let last = state
            .last_sent
            .as_ref()
            .map(Cheque::cumulative_payout)
            .unwrap_or_default();
        let params = ChequeParams::new(contract, peer.beneficiary(), last.checked_add(amount)?);
        let honey = u64::try_from(honey).map_err(|_| BoundedIntError::Underflow)?;
        Ok(Cheque::issue(params, honey, &self.signer)?)
    }

    /// Price of `honey` in wei.
    fn price(&self, honey: i64) -> Result<Uint256, SwapError> {
        let wei = self.oracle.get_price(honey)?;
        let wei = u64::try_from(wei).map_err(|_| BoundedIntError::Underflow)?;
        Ok(Uint256::from_u64(wei))
    }

    /// Handle a message received from `peer`.
    pub async fn handle_message(
        &self,
        peer: &PeerId,
        message: SwapMessage,
    ) -> Result<(), SwapError> {
        let swap_peer = self.peer(peer)?;
        debug!(%peer, message = message.name(), "Swap message received");

        match message {
            SwapMessage::EmitCheque { cheque } => {
                match self.receive_cheque(&swap_peer, &cheque) {
                    Ok(true) => {}
                    Ok(false) => return Ok(()),
                    Err(e) => {
                        if e.is_cheque_rejection() {
                            self.metrics.rejected.increment(1);
                            warn!(%peer, error = %e, "Cheque rejected");
                            self.send(
                                peer,
                                SwapMessage::Error {
                                    reason: e.to_string(),
                                },
                            )?;
                        }
                        return Err(e);
                    }
                }

                let destination = self.chequebook_address().unwrap_or(self.owner);
                if let Err(e) = self
                    .cashout
                    .submit_cheque(&cheque, destination)
                    .instrument(swap_peer.logger.span(Action::CashCheque))
                    .await
                {
                    warn!(%peer, error = %e, "Failed to submit cheque for cash-out");
                }
                Ok(())
            }
            SwapMessage::ConfirmCheque { cheque } => self.confirm_cheque(&swap_peer, &cheque),
            SwapMessage::ChequeRequest => self.resend_cheque(&swap_peer),
            SwapMessage::Error { reason } => {
                warn!(%peer, %reason, "Peer reported an error");
                Ok(())
            }
        }
    }

    /// Accept `cheque` and confirm it. Returns false for a resend of the
    /// accepted cheque whose confirmation could not be sent, which is
    /// confirmed again without touching the balance.
    fn receive_cheque(&self, peer: &SwapPeer, cheque: &Cheque) -> Result<bool, SwapError> {
        let _action = peer.logger.set_action(Action::ReceiveCheque);
        let mut state = peer.state.lock();

        if state.protocol == ProtocolState::ChequeReceived
            && state.last_received.as_ref() == Some(cheque)
        {
            debug!("Confirming a cheque received before");
            self.send_confirmation(peer, &mut state, cheque)?;
            return Ok(false);
        }

        cheque.verify_properties(peer.contract(), peer.beneficiary(), self.owner)?;
        let honey = i64::try_from(cheque.honey).map_err(|_| BoundedIntError::Overflow)?;
        let expected = self.price(honey)?;
        cheque.verify_against_last(state.last_received.as_ref(), expected)?;

        let balance = state
            .balance
            .checked_sub(honey)
            .ok_or(SwapError::BalanceOverflow(peer.id()))?;
        if balance < -self.params.cheque_debt_tolerance {
            return Err(ChequeError::ChequeWouldCauseDebt {
                honey: cheque.honey,
            }
            .into());
        }

        let mut batch = StoreBatch::new();
        batch.put(received_cheque_key(&peer.id()), cheque)?;
        batch.put(balance_key(&peer.id()), &balance)?;
        self.store.write_batch(batch)?;

        state.balance = balance;
        state.last_received = Some(cheque.clone());
        state.protocol = ProtocolState::ChequeReceived;
        self.metrics.received.increment(1);
        info!(
            honey = cheque.honey,
            cumulative_payout = %cheque.cumulative_payout(),
            balance,
            "Cheque received"
        );

        self.send_confirmation(peer, &mut state, cheque)?;
        Ok(true)
    }

    /// `ChequeReceived` lasts until the confirmation is handed to the transport.
    fn send_confirmation(
        &self,
        peer: &SwapPeer,
        state: &mut PeerState,
        cheque: &Cheque,
    ) -> Result<(), SwapError> {
        self.send(
            &peer.id(),
            SwapMessage::ConfirmCheque {
                cheque: cheque.clone(),
            },
        )?;
        state.protocol = ProtocolState::Idle;
        Ok(())
    }

    fn confirm_cheque(&self, peer: &SwapPeer, cheque: &Cheque) -> Result<(), SwapError> {
        let _action = peer.logger.set_action(Action::ConfirmCheque);
        let mut state = peer.state.lock();

        if state.pending.as_ref() != Some(cheque) {
            warn!("Confirmation does not match the pending cheque");
            return Err(SwapError::UnexpectedConfirmation(peer.id()));
        }

        let honey = i64::try_from(cheque.honey).map_err(|_| BoundedIntError::Overflow)?;
        let balance = state
            .balance
            .checked_add(honey)
            .ok_or(SwapError::BalanceOverflow(peer.id()))?;

        let mut batch = StoreBatch::new();
        batch.put(sent_cheque_key(&peer.id()), cheque)?;
        batch.put(balance_key(&peer.id()), &balance)?;
        batch.delete(pending_cheque_key(&peer.id()));
        self.store.write_batch(batch)?;

        state.balance = balance;
        state.last_sent = state.pending.take();
        state.protocol = ProtocolState::Idle;
        info!(
            cumulative_payout = %cheque.cumulative_payout(),
            balance,
            "Cheque confirmed"
        );
        Ok(())
    }

    /// Answer a cheque request: resend the pending cheque, or issue one if
    /// the debt calls for it.
    fn resend_cheque(&self, peer: &SwapPeer) -> Result<(), SwapError> {
        let pending = peer.state.lock().pending.clone();
        match pending {
            Some(cheque) => {
                let _action = peer.logger.set_action(Action::SendCheque);
                debug!(cumulative_payout = %cheque.cumulative_payout(), "Resending pending cheque");
                self.send(&peer.id(), SwapMessage::EmitCheque { cheque })
            }
            None => self.add(0, &peer.id()),
        }
    }

    /// Last cheque received from `peer`.
    fn received_cheque(&self, peer: &PeerId) -> Result<Cheque, SwapError> {
        let cheque = match self.peers.read().get(peer) {
            Some(swap_peer) => swap_peer.last_received_cheque(),
            None => self.store.get_opt(&received_cheque_key(peer))?,
        };
        cheque.ok_or(SwapError::NoReceivedCheque(*peer))
    }

    /// Schedule a cash-out of the last cheque received from `peer`,
    /// whatever the strategy. Returns the scheduler request id.
    pub async fn cash_cheque(&self, peer: &PeerId) -> Result<u64, SwapError> {
        let cheque = self.received_cheque(peer)?;
        let destination = self.chequebook_address().unwrap_or(self.owner);
        self.cashout
            .cash_cheque(&cheque, destination)
            .instrument(self.logger.with_peer(peer).span(Action::CashCheque))
            .await
    }

    /// Cash the last cheque received from `peer` and wait for the result.
    pub async fn cash_cheque_direct(&self, peer: &PeerId) -> Result<CashChequeResult, SwapError> {
        let cheque = self.received_cheque(peer)?;
        let destination = self.chequebook_address().unwrap_or(self.owner);
        self.cashout
            .cash_cheque_direct(&cheque, destination, DEFAULT_TRANSACTION_TIMEOUT)
            .instrument(self.logger.with_peer(peer).span(Action::CashCheque))
            .await
    }

    /// Withdraw `amount` from the own chequebook to the owner.
    pub async fn withdraw(&self, amount: Uint256) -> Result<Receipt, SwapError> {
        let chequebook = self.own_chequebook()?;
        let available = chequebook.liquid_balance().await?;
        if amount > available {
            return Err(SwapError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let request = WithdrawRequest {
            chequebook: chequebook.address(),
            amount,
        };
        let id = self
            .scheduler
            .schedule_request(&withdraw_type_id(), &request)
            .await?;
        let receipt = self
            .scheduler
            .wait_for_request(id, self.request_timeout())
            .await?;
        if !receipt.status {
            return Err(ContractError::TransactionReverted(receipt.transaction_hash).into());
        }
        info!(%amount, "Withdrawn from chequebook");
        Ok(receipt)
    }
}
