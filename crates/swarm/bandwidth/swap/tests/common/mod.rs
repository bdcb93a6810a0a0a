//! Two SWAP nodes on one simulated chain.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use tokio::sync::mpsc;
use vertex_storage::{MemoryStateStore, StateStore};
use vertex_swarm_bandwidth_chain::SchedulerTimeouts;
use vertex_swarm_bandwidth_primitives::{PeerId, Uint256};
use vertex_swarm_bandwidth_swap::{
    CashoutStrategy, FixedRateOracle, OutboundMessage, PriceOracle, Swap, SwapBuilder, SwapError,
    SwapMessage, SwapParams,
};
use vertex_swarm_test_utils::{SimulatedBackend, beneficiary_signer, owner_signer};

pub const NODE_A: PeerId = B256::repeat_byte(0xaa);
pub const NODE_B: PeerId = B256::repeat_byte(0xbb);

pub fn timeouts() -> SchedulerTimeouts {
    SchedulerTimeouts {
        receipt_timeout: Duration::from_secs(5),
        retry_delay: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
    }
}

pub fn params(payment_threshold: i64, disconnect_threshold: i64) -> SwapParams {
    SwapParams {
        payment_threshold,
        disconnect_threshold,
        cashout: CashoutStrategy::Never,
        ..SwapParams::default()
    }
}

pub struct Chain {
    pub backend: Arc<SimulatedBackend>,
    pub factory: Address,
}

impl Chain {
    pub fn new() -> Self {
        let backend = Arc::new(SimulatedBackend::new(5));
        let factory = backend.deploy_factory();
        backend.fund(owner_signer().address(), U256::from(10_000_000));
        backend.fund(beneficiary_signer().address(), U256::from(10_000_000));
        Self { backend, factory }
    }
}

pub struct Node {
    pub id: PeerId,
    pub swap: Arc<Swap>,
    pub store: Arc<dyn StateStore>,
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Node {
    pub fn build(chain: &Chain, signer: PrivateKeySigner, id: PeerId, params: SwapParams) -> Self {
        Self::build_with(
            chain,
            Arc::new(MemoryStateStore::new()),
            signer,
            id,
            params,
            Arc::new(FixedRateOracle::default()),
        )
    }

    pub fn build_with(
        chain: &Chain,
        store: Arc<dyn StateStore>,
        signer: PrivateKeySigner,
        id: PeerId,
        params: SwapParams,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        let (tx, outbound) = mpsc::unbounded_channel();
        let swap = SwapBuilder::new(
            store.clone(),
            chain.backend.clone(),
            Arc::new(signer),
            chain.factory,
        )
        .params(params)
        .oracle(oracle)
        .scheduler_timeouts(timeouts())
        .build(tx);

        Self {
            id,
            swap: Arc::new(swap),
            store,
            outbound,
        }
    }

    pub async fn start(&self, deposit: u64) -> Address {
        self.swap
            .start(None, Uint256::from_u64(deposit))
            .await
            .unwrap();
        self.chequebook()
    }

    pub fn chequebook(&self) -> Address {
        self.swap.chequebook_address().unwrap()
    }

    /// The next message the node sent, if any.
    pub fn try_next(&mut self) -> Option<OutboundMessage> {
        self.outbound.try_recv().ok()
    }

    pub fn next_message(&mut self, to: PeerId) -> SwapMessage {
        let outbound = self.try_next().unwrap();
        assert_eq!(outbound.peer, to);
        outbound.message
    }
}

/// Let `a` and `b` know each other.
pub async fn connect(a: &Node, b: &Node) {
    a.swap
        .add_peer(b.id, b.swap.owner(), b.chequebook())
        .await
        .unwrap();
    b.swap
        .add_peer(a.id, a.swap.owner(), a.chequebook())
        .await
        .unwrap();
}

/// Node A signs with the owner key, node B with the beneficiary key.
pub async fn pair(chain: &Chain, a: SwapParams, b: SwapParams, deposit_a: u64) -> (Node, Node) {
    let a = Node::build(chain, owner_signer(), NODE_A, a);
    let b = Node::build(chain, beneficiary_signer(), NODE_B, b);
    a.start(deposit_a).await;
    b.start(0).await;
    connect(&a, &b).await;
    (a, b)
}

/// Hand the next message of `from` to `to`.
pub async fn deliver(from: &mut Node, to: &Node) -> Result<(), SwapError> {
    let message = from.next_message(to.id);
    to.swap.handle_message(&from.id, message).await
}

/// `debtor` owes `creditor` `amount` honey, the cheque goes out and is
/// confirmed.
pub async fn settle(debtor: &mut Node, creditor: &mut Node, amount: i64) {
    creditor.swap.add(amount, &debtor.id).unwrap();
    debtor.swap.add(-amount, &creditor.id).unwrap();
    deliver(debtor, creditor).await.unwrap();
    deliver(creditor, debtor).await.unwrap();
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
