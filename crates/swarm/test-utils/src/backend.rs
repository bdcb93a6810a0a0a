use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, B256, Bytes, LogData, U256, keccak256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;
use vertex_swarm_bandwidth_chain::{
    ChainBackend, ChainError, Receipt, ReceiptLog, TransactOpts, TxRequest,
};
use vertex_swarm_bandwidth_chequebook::{Cheque, ChequeParams};
use vertex_swarm_bandwidth_contracts::{
    ISimpleSwap, ISimpleSwapFactory, simple_swap_factory_runtime_code, simple_swap_runtime_code,
};

const GAS_PER_TX: u64 = 21_000;

/// Account that "deploys" simulated factories.
const FACTORY_DEPLOYER: Address = Address::repeat_byte(0xfa);

#[derive(Debug, Clone, Default)]
struct Chequebook {
    issuer: Address,
    balance: U256,
    total_hard_deposit: U256,
    paid_out: HashMap<Address, U256>,
    total_paid_out: U256,
}

impl Chequebook {
    fn liquid_balance(&self) -> U256 {
        self.balance.saturating_sub(self.total_hard_deposit)
    }
}

#[derive(Debug, Clone)]
struct PendingTx {
    hash: B256,
    from: Address,
    to: Address,
    data: Bytes,
    value: U256,
}

#[derive(Debug, Default)]
struct ChainState {
    block_number: u64,
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    factories: HashMap<Address, HashSet<Address>>,
    chequebooks: HashMap<Address, Chequebook>,
    pending: Vec<PendingTx>,
    receipts: HashMap<B256, Receipt>,
    sent: usize,
}

/// Outcome of executing one transaction.
type Execution = Result<Vec<LogEntry>, String>;

struct LogEntry {
    address: Address,
    data: LogData,
}

impl LogEntry {
    fn new(address: Address, data: LogData) -> Self {
        Self { address, data }
    }
}

/// An in-process chain.
///
/// Transactions are mined as they are sent, or on [`commit`](Self::commit)
/// when created with [`manual`](Self::manual). Factories and chequebooks
/// are emulated natively; other calls to accounts without code succeed and
/// do nothing.
#[derive(Debug)]
pub struct SimulatedBackend {
    chain_id: u64,
    auto_mine: bool,
    state: Mutex<ChainState>,
}

impl SimulatedBackend {
    /// A chain that mines every transaction when it is sent.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            auto_mine: true,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// A chain that only mines on [`commit`](Self::commit).
    pub fn manual(chain_id: u64) -> Self {
        Self {
            auto_mine: false,
            ..Self::new(chain_id)
        }
    }

    pub fn fund(&self, account: Address, amount: U256) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        let state = self.state.lock();
        state
            .chequebooks
            .get(&account)
            .map(|chequebook| chequebook.balance)
            .or_else(|| state.balances.get(&account).copied())
            .unwrap_or_default()
    }

    pub fn set_code(&self, account: Address, code: Bytes) {
        self.state.lock().code.insert(account, code);
    }

    /// Install a new factory and return its address.
    pub fn deploy_factory(&self) -> Address {
        let mut state = self.state.lock();
        let nonce = state.nonces.entry(FACTORY_DEPLOYER).or_default();
        let address = FACTORY_DEPLOYER.create(*nonce);
        *nonce += 1;
        if let Ok(code) = simple_swap_factory_runtime_code() {
            state.code.insert(address, code);
        }
        state.factories.insert(address, HashSet::new());
        address
    }

    /// Install a chequebook through `factory` without a transaction.
    pub fn deploy_chequebook(&self, factory: Address, issuer: Address, deposit: U256) -> Address {
        let mut state = self.state.lock();
        create_chequebook(&mut state, factory, issuer, deposit)
    }

    /// Add to a chequebook's balance.
    pub fn deposit(&self, chequebook: Address, amount: U256) {
        if let Some(chequebook) = self.state.lock().chequebooks.get_mut(&chequebook) {
            chequebook.balance = chequebook.balance.saturating_add(amount);
        }
    }

    pub fn set_hard_deposit(&self, chequebook: Address, amount: U256) {
        if let Some(chequebook) = self.state.lock().chequebooks.get_mut(&chequebook) {
            chequebook.total_hard_deposit = amount;
        }
    }

    /// Mine every pending transaction, returning how many were mined.
    pub fn commit(&self) -> usize {
        let mut state = self.state.lock();
        mine(&mut state)
    }

    pub fn pending_transactions(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of transactions ever sent.
    pub fn sent_transactions(&self) -> usize {
        self.state.lock().sent
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }
}

fn create_chequebook(
    state: &mut ChainState,
    factory: Address,
    issuer: Address,
    deposit: U256,
) -> Address {
    let nonce = state.nonces.entry(factory).or_default();
    let address = factory.create(*nonce);
    *nonce += 1;

    if let Ok(code) = simple_swap_runtime_code() {
        state.code.insert(address, code);
    }
    state.chequebooks.insert(
        address,
        Chequebook {
            issuer,
            balance: deposit,
            ..Default::default()
        },
    );
    state.factories.entry(factory).or_default().insert(address);
    address
}

fn mine(state: &mut ChainState) -> usize {
    let pending = std::mem::take(&mut state.pending);
    if pending.is_empty() {
        return 0;
    }

    state.block_number += 1;
    let count = pending.len();
    for tx in pending {
        let outcome = execute(state, &tx);
        let (status, logs) = match outcome {
            Ok(logs) => (true, logs),
            Err(reason) => {
                trace!(hash = %tx.hash, %reason, "Simulated transaction reverted");
                (false, Vec::new())
            }
        };

        let receipt = Receipt {
            transaction_hash: tx.hash,
            block_number: state.block_number,
            status,
            gas_used: GAS_PER_TX,
            contract_address: None,
            logs: logs
                .into_iter()
                .map(|log| ReceiptLog {
                    address: log.address,
                    topics: log.data.topics().to_vec(),
                    data: log.data.data,
                })
                .collect(),
        };
        state.receipts.insert(tx.hash, receipt);
    }
    count
}

fn selector(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4).and_then(|s| s.try_into().ok())
}

fn decode<C: SolCall>(data: &[u8]) -> Result<C, String> {
    C::abi_decode(data).map_err(|e| e.to_string())
}

fn execute(state: &mut ChainState, tx: &PendingTx) -> Execution {
    let available = state.balances.get(&tx.from).copied().unwrap_or_default();
    if available < tx.value {
        return Err("insufficient funds".into());
    }

    let logs = if state.factories.contains_key(&tx.to) {
        execute_factory(state, tx)?
    } else if state.chequebooks.contains_key(&tx.to) {
        execute_chequebook(state, tx)?
    } else if state.code.contains_key(&tx.to) {
        return Err("unsupported contract".into());
    } else {
        let balance = state.balances.entry(tx.to).or_default();
        *balance = balance.saturating_add(tx.value);
        Vec::new()
    };

    if let Some(balance) = state.balances.get_mut(&tx.from) {
        *balance = balance.saturating_sub(tx.value);
    }
    Ok(logs)
}

fn execute_factory(state: &mut ChainState, tx: &PendingTx) -> Execution {
    if selector(&tx.data) != Some(ISimpleSwapFactory::deploySimpleSwapCall::SELECTOR) {
        return Err("unknown factory function".into());
    }
    let call = decode::<ISimpleSwapFactory::deploySimpleSwapCall>(&tx.data)?;
    let contract = create_chequebook(state, tx.to, call.issuer, tx.value);

    let event = ISimpleSwapFactory::SimpleSwapDeployed {
        contractAddress: contract,
    };
    Ok(vec![LogEntry::new(tx.to, event.encode_log_data())])
}

fn execute_chequebook(state: &mut ChainState, tx: &PendingTx) -> Execution {
    let address = tx.to;
    let mut chequebook = state
        .chequebooks
        .get(&address)
        .cloned()
        .ok_or_else(|| "no chequebook".to_string())?;
    chequebook.balance = chequebook.balance.saturating_add(tx.value);

    let mut logs = Vec::new();
    match selector(&tx.data) {
        Some(ISimpleSwap::cashChequeBeneficiaryCall::SELECTOR) => {
            let call = decode::<ISimpleSwap::cashChequeBeneficiaryCall>(&tx.data)?;
            let beneficiary = tx.from;

            let cheque = Cheque {
                params: ChequeParams::new(address, beneficiary, call.cumulativePayout.into()),
                honey: 0,
                signature: call.issuerSig,
            };
            cheque
                .verify_sig(chequebook.issuer)
                .map_err(|e| e.to_string())?;

            let paid_out = chequebook.paid_out.get(&beneficiary).copied().unwrap_or_default();
            if call.cumulativePayout <= paid_out {
                return Err("nothing to cash".into());
            }
            let requested = call.cumulativePayout - paid_out;
            let total_payout = requested.min(chequebook.liquid_balance());

            chequebook.paid_out.insert(beneficiary, paid_out + total_payout);
            chequebook.total_paid_out = chequebook.total_paid_out.saturating_add(total_payout);
            chequebook.balance -= total_payout;
            let recipient = state.balances.entry(call.recipient).or_default();
            *recipient = recipient.saturating_add(total_payout);

            let cashed = ISimpleSwap::ChequeCashed {
                beneficiary,
                recipient: call.recipient,
                caller: tx.from,
                totalPayout: total_payout,
                cumulativePayout: call.cumulativePayout,
                callerPayout: U256::ZERO,
            };
            logs.push(LogEntry::new(address, cashed.encode_log_data()));
            if total_payout < requested {
                logs.push(LogEntry::new(
                    address,
                    ISimpleSwap::ChequeBounced {}.encode_log_data(),
                ));
            }
        }
        Some(ISimpleSwap::withdrawCall::SELECTOR) => {
            let call = decode::<ISimpleSwap::withdrawCall>(&tx.data)?;
            if tx.from != chequebook.issuer {
                return Err("not issuer".into());
            }
            if call.amount > chequebook.liquid_balance() {
                return Err("liquidBalance not sufficient".into());
            }
            chequebook.balance -= call.amount;
            let issuer = state.balances.entry(chequebook.issuer).or_default();
            *issuer = issuer.saturating_add(call.amount);
            logs.push(LogEntry::new(
                address,
                ISimpleSwap::Withdraw {
                    amount: call.amount,
                }
                .encode_log_data(),
            ));
        }
        _ => return Err("unknown chequebook function".into()),
    }

    state.chequebooks.insert(address, chequebook);
    Ok(logs)
}

fn call_chequebook(chequebook: &Chequebook, data: &[u8]) -> Result<Vec<u8>, ChainError> {
    let reverted = |e: String| ChainError::Reverted(e);
    let output = match selector(data) {
        Some(ISimpleSwap::issuerCall::SELECTOR) => chequebook.issuer.abi_encode(),
        Some(ISimpleSwap::paidOutCall::SELECTOR) => {
            let call = decode::<ISimpleSwap::paidOutCall>(data).map_err(reverted)?;
            chequebook
                .paid_out
                .get(&call.beneficiary)
                .copied()
                .unwrap_or_default()
                .abi_encode()
        }
        Some(ISimpleSwap::totalPaidOutCall::SELECTOR) => chequebook.total_paid_out.abi_encode(),
        Some(ISimpleSwap::liquidBalanceCall::SELECTOR) => chequebook.liquid_balance().abi_encode(),
        Some(ISimpleSwap::totalHardDepositCall::SELECTOR) => {
            chequebook.total_hard_deposit.abi_encode()
        }
        _ => return Err(ChainError::Reverted("unknown chequebook function".into())),
    };
    Ok(output)
}

#[async_trait]
impl ChainBackend for SimulatedBackend {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self.state.lock().code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, request: &TxRequest) -> Result<Bytes, ChainError> {
        let state = self.state.lock();

        if let Some(deployed) = state.factories.get(&request.to) {
            if selector(&request.data) != Some(ISimpleSwapFactory::deployedContractsCall::SELECTOR) {
                return Err(ChainError::Reverted("unknown factory function".into()));
            }
            let call = decode::<ISimpleSwapFactory::deployedContractsCall>(&request.data)
                .map_err(ChainError::Reverted)?;
            return Ok(deployed.contains(&call.0).abi_encode().into());
        }

        if let Some(chequebook) = state.chequebooks.get(&request.to) {
            return call_chequebook(chequebook, &request.data).map(Into::into);
        }

        if state.code.contains_key(&request.to) {
            return Err(ChainError::Reverted("unsupported contract".into()));
        }
        Ok(Bytes::new())
    }

    async fn suggest_gas_price(&self) -> Result<U256, ChainError> {
        Ok(U256::from(1))
    }

    async fn send_transaction(
        &self,
        request: TxRequest,
        opts: &TransactOpts,
    ) -> Result<B256, ChainError> {
        let mut state = self.state.lock();
        let from = opts.from();

        let available = state.balances.get(&from).copied().unwrap_or_default();
        if available < opts.value {
            return Err(ChainError::InvalidTransaction("insufficient funds".into()));
        }

        let nonce = state.nonces.entry(from).or_default();
        let hash = keccak256(
            [
                from.as_slice(),
                &nonce.to_be_bytes(),
                request.to.as_slice(),
                request.data.as_ref(),
            ]
            .concat(),
        );
        *nonce += 1;

        state.sent += 1;
        state.pending.push(PendingTx {
            hash,
            from,
            to: request.to,
            data: request.data,
            value: opts.value,
        });
        trace!(%hash, %from, "Simulated transaction sent");

        if self.auto_mine {
            mine(&mut state);
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, ChainError> {
        Ok(self.state.lock().receipts.get(&hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{beneficiary_signer, owner_signer};
    use std::sync::Arc;
    use vertex_swarm_bandwidth_primitives::Uint256;

    fn opts(signer: alloy_signer_local::PrivateKeySigner) -> TransactOpts {
        TransactOpts::new(Arc::new(signer))
    }

    #[tokio::test]
    async fn test_manual_mining() {
        let backend = SimulatedBackend::manual(5);
        let hash = backend
            .send_transaction(
                TxRequest::new(Address::repeat_byte(1), Bytes::new()),
                &opts(owner_signer()),
            )
            .await
            .unwrap();

        assert_eq!(backend.transaction_receipt(hash).await.unwrap(), None);
        assert_eq!(backend.commit(), 1);
        let receipt = backend.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.block_number, 1);
        assert_eq!(backend.sent_transactions(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let backend = SimulatedBackend::new(5);
        let result = backend
            .send_transaction(
                TxRequest::new(Address::repeat_byte(1), Bytes::new()),
                &opts(owner_signer()).with_value(U256::from(1)),
            )
            .await;
        assert!(matches!(result, Err(ChainError::InvalidTransaction(_))));
    }

    #[tokio::test]
    async fn test_cash_partially_covered_cheque_bounces() {
        let backend = SimulatedBackend::new(5);
        let factory = backend.deploy_factory();
        let issuer = owner_signer();
        let beneficiary = beneficiary_signer();
        let chequebook = backend.deploy_chequebook(factory, issuer.address(), U256::from(10));

        let cheque = Cheque::issue(
            ChequeParams::new(chequebook, beneficiary.address(), Uint256::from_u64(15)),
            15,
            &issuer,
        )
        .unwrap();
        let call = ISimpleSwap::cashChequeBeneficiaryCall {
            recipient: beneficiary.address(),
            cumulativePayout: U256::from(15),
            issuerSig: cheque.signature,
        };
        let hash = backend
            .send_transaction(
                TxRequest::new(chequebook, call.abi_encode()),
                &opts(beneficiary.clone()),
            )
            .await
            .unwrap();

        let receipt = backend.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.logs.len(), 2);
        assert_eq!(backend.balance_of(beneficiary.address()), U256::from(10));
        assert_eq!(backend.balance_of(chequebook), U256::ZERO);
    }

    #[tokio::test]
    async fn test_cheque_from_wrong_signer_reverts() {
        let backend = SimulatedBackend::new(5);
        let factory = backend.deploy_factory();
        let beneficiary = beneficiary_signer();
        let chequebook =
            backend.deploy_chequebook(factory, owner_signer().address(), U256::from(10));

        let forged = Cheque::issue(
            ChequeParams::new(chequebook, beneficiary.address(), Uint256::from_u64(5)),
            5,
            &beneficiary,
        )
        .unwrap();
        let call = ISimpleSwap::cashChequeBeneficiaryCall {
            recipient: beneficiary.address(),
            cumulativePayout: U256::from(5),
            issuerSig: forged.signature,
        };
        let hash = backend
            .send_transaction(TxRequest::new(chequebook, call.abi_encode()), &opts(beneficiary))
            .await
            .unwrap();

        let receipt = backend.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.status);
        assert_eq!(backend.balance_of(chequebook), U256::from(10));
    }
}
