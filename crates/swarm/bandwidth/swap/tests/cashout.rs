//! Cashing received cheques: strategies, bounced cheques, result handlers
//! and counters.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::*;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use parking_lot::Mutex;
use vertex_storage::MemoryStateStore;
use vertex_swarm_bandwidth_contracts::CashChequeResult;
use vertex_swarm_bandwidth_primitives::Uint256;
use vertex_swarm_bandwidth_swap::{
    CashoutRequest, CashoutResultHandler, CashoutStrategy, FixedRateOracle, SwapError, SwapParams,
};
use vertex_swarm_test_utils::{beneficiary_signer, owner_signer};

#[derive(Default)]
struct Results(Mutex<Vec<(CashoutRequest, CashChequeResult)>>);

impl Results {
    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn get(&self, index: usize) -> (CashoutRequest, CashChequeResult) {
        self.0.lock()[index].clone()
    }
}

impl CashoutResultHandler for Results {
    fn handle_cashout_result(&self, request: &CashoutRequest, result: &CashChequeResult) {
        self.0.lock().push((request.clone(), result.clone()));
    }
}

fn with_strategy(mut params: SwapParams, cashout: CashoutStrategy) -> SwapParams {
    params.cashout = cashout;
    params
}

fn counters(snapshotter: &Snapshotter) -> HashMap<String, u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(value) => Some((key.key().name().to_string(), value)),
            _ => None,
        })
        .collect()
}

/// Node A deploys with `deposit`, node B collects results of its cash-outs.
async fn cashing_pair(
    chain: &Chain,
    a: SwapParams,
    b: SwapParams,
    deposit: u64,
) -> (Node, Node, Arc<Results>) {
    let (a, b) = pair(chain, a, b, deposit).await;
    let results = Arc::new(Results::default());
    b.swap.set_cashout_result_handler(results.clone());
    (a, b, results)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bounced_cheque() {
    let chain = Chain::new();
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let mut a = Node::build(&chain, owner_signer(), NODE_A, params(42, 20_000));
    let mut b = metrics::with_local_recorder(&recorder, || {
        Node::build(&chain, beneficiary_signer(), NODE_B, params(42, 20_000))
    });
    a.start(42).await;
    b.start(0).await;
    connect(&a, &b).await;
    let results = Arc::new(Results::default());
    b.swap.set_cashout_result_handler(results.clone());

    settle(&mut a, &mut b, 42).await;
    let cashed = b.swap.cash_cheque_direct(&a.id).await.unwrap();
    assert_eq!(cashed.total_payout, Uint256::from_u64(42));
    assert_eq!(cashed.cumulative_payout, Uint256::from_u64(42));
    assert_eq!(cashed.beneficiary, b.swap.owner());
    assert_eq!(cashed.recipient, b.chequebook());
    assert!(!cashed.bounced);

    // the chequebook is empty now
    settle(&mut a, &mut b, 10_000).await;
    let bounced = b.swap.cash_cheque_direct(&a.id).await.unwrap();
    assert_eq!(bounced.total_payout, Uint256::ZERO);
    assert_eq!(bounced.cumulative_payout, Uint256::from_u64(10_042));
    assert!(bounced.bounced);

    eventually(|| results.len() == 2).await;
    let counters = counters(&snapshotter);
    assert_eq!(counters.get("swap.cheques.received"), Some(&2));
    assert_eq!(counters.get("swap.cheques.cashed"), Some(&1));
    assert_eq!(counters.get("swap.cheques.cashed.bounced"), Some(&1));
    assert_eq!(counters.get("swap.cheques.cashed.errors").copied().unwrap_or(0), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_cheques_are_counted() {
    let chain = Chain::new();
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let mut a = Node::build(&chain, owner_signer(), NODE_A, params(1000, 20_000));
    let b = metrics::with_local_recorder(&recorder, || {
        Node::build_with(
            &chain,
            Arc::new(MemoryStateStore::new()),
            beneficiary_signer(),
            NODE_B,
            params(1000, 20_000),
            Arc::new(FixedRateOracle::new(3)),
        )
    });
    a.start(0).await;
    b.start(0).await;
    connect(&a, &b).await;

    b.swap.add(1000, &a.id).unwrap();
    a.swap.add(-1000, &b.id).unwrap();
    assert!(deliver(&mut a, &b).await.is_err());

    let counters = counters(&snapshotter);
    assert_eq!(counters.get("swap.cheques.rejected"), Some(&1));
    assert_eq!(counters.get("swap.cheques.received").copied().unwrap_or(0), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_always_cashes() {
    let chain = Chain::new();
    let (mut a, mut b, results) = cashing_pair(
        &chain,
        params(1000, 20_000),
        with_strategy(params(1000, 20_000), CashoutStrategy::Always),
        5000,
    )
    .await;

    settle(&mut a, &mut b, 1000).await;
    eventually(|| results.len() == 1).await;

    let (request, result) = results.get(0);
    assert_eq!(request.destination, b.chequebook());
    assert_eq!(request.cheque.contract(), a.chequebook());
    assert_eq!(result.total_payout, Uint256::from_u64(1000));
    assert!(!result.bounced);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_profitable_waits_for_worthwhile_cheques() {
    let chain = Chain::new();
    let (mut a, mut b, results) = cashing_pair(
        &chain,
        params(1000, 1_000_000),
        with_strategy(params(1000, 1_000_000), CashoutStrategy::Profitable),
        300_000,
    )
    .await;

    // gas price 1 puts the cost at 50_000
    settle(&mut a, &mut b, 1000).await;
    let cheque = b
        .swap
        .peer(&a.id)
        .unwrap()
        .last_received_cheque()
        .unwrap();
    let (expected, cost) = b.swap.cashout().estimate_payout(&cheque).await.unwrap();
    assert_eq!(expected, Uint256::from_u64(1000));
    assert_eq!(cost, Uint256::from_u64(50_000));

    settle(&mut a, &mut b, 200_000).await;
    eventually(|| results.len() == 1).await;

    // the first cheque was never cashed on its own
    let (request, result) = results.get(0);
    assert_eq!(request.cheque.cumulative_payout(), Uint256::from_u64(201_000));
    assert_eq!(result.total_payout, Uint256::from_u64(201_000));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_never_cashes_until_asked() {
    let chain = Chain::new();
    let (mut a, mut b, results) =
        cashing_pair(&chain, params(1000, 20_000), params(1000, 20_000), 5000).await;
    let deployed = chain.backend.sent_transactions();

    settle(&mut a, &mut b, 1000).await;
    assert_eq!(b.swap.cashout().strategy(), CashoutStrategy::Never);
    assert_eq!(chain.backend.sent_transactions(), deployed);

    let id = b.swap.cash_cheque(&a.id).await.unwrap();
    let receipt = b
        .swap
        .scheduler()
        .wait_for_request(id, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(receipt.status);
    eventually(|| results.len() == 1).await;

    // switching the strategy applies to the next cheque
    b.swap.set_cashout_strategy(CashoutStrategy::Always);
    settle(&mut a, &mut b, 1000).await;
    eventually(|| results.len() == 2).await;
    let (_, result) = results.get(1);
    assert_eq!(result.cumulative_payout, Uint256::from_u64(2000));
    assert_eq!(result.total_payout, Uint256::from_u64(1000));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cash_without_received_cheque() {
    let chain = Chain::new();
    let (a, b) = pair(&chain, params(1000, 20_000), params(1000, 20_000), 0).await;

    assert_matches!(
        b.swap.cash_cheque(&a.id).await,
        Err(SwapError::NoReceivedCheque(_))
    );
    assert_matches!(
        a.swap.cash_cheque_direct(&b.id).await,
        Err(SwapError::NoReceivedCheque(_))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cash_after_disconnect() {
    let chain = Chain::new();
    let (mut a, mut b) = pair(&chain, params(1000, 20_000), params(1000, 20_000), 5000).await;

    settle(&mut a, &mut b, 1500).await;
    b.swap.remove_peer(&a.id);

    // the received cheque is still in the store
    let result = b.swap.cash_cheque_direct(&a.id).await.unwrap();
    assert_eq!(result.total_payout, Uint256::from_u64(1500));
}
