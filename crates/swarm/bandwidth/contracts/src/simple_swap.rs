use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::{SolCall, SolEvent};
use tracing::debug;
use vertex_swarm_bandwidth_chain::{ChainBackend, Receipt, TransactOpts, TxRequest};
use vertex_swarm_bandwidth_primitives::Uint256;

use crate::abi::{ISimpleSwap, SIMPLE_SWAP_ABI};
use crate::{CASH_CHEQUE_GAS_LIMIT, ContractError};

const SIMPLE_SWAP_RUNTIME_HEX: &str = include_str!("../res/simple_swap_runtime.hex");

/// Runtime bytecode every chequebook deployed by the factory carries.
pub fn simple_swap_runtime_code() -> Result<Bytes, ContractError> {
    hex::decode(SIMPLE_SWAP_RUNTIME_HEX.trim())
        .map(Bytes::from)
        .map_err(|e| ContractError::Decode(e.to_string()))
}

/// What a peer needs to talk to a chequebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractParams {
    pub address: Address,
    pub code: Bytes,
    pub abi: &'static [&'static str],
}

/// Outcome of a `cashChequeBeneficiary` transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashChequeResult {
    pub beneficiary: Address,
    pub recipient: Address,
    pub caller: Address,
    /// Amount actually paid by this transaction.
    pub total_payout: Uint256,
    pub cumulative_payout: Uint256,
    pub caller_payout: Uint256,
    /// The chequebook could not cover the full amount.
    pub bounced: bool,
}

/// A deployed SimpleSwap chequebook.
#[derive(Clone)]
pub struct SimpleSwap {
    address: Address,
    backend: Arc<dyn ChainBackend>,
}

impl std::fmt::Debug for SimpleSwap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleSwap")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl SimpleSwap {
    pub fn at(address: Address, backend: Arc<dyn ChainBackend>) -> Self {
        Self { address, backend }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn contract_params(&self) -> Result<ContractParams, ContractError> {
        Ok(ContractParams {
            address: self.address,
            code: simple_swap_runtime_code()?,
            abi: SIMPLE_SWAP_ABI,
        })
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return, ContractError> {
        let output = self
            .backend
            .call(&TxRequest::new(self.address, call.abi_encode()))
            .await?;
        C::abi_decode_returns(&output).map_err(|e| ContractError::Decode(e.to_string()))
    }

    pub async fn issuer(&self) -> Result<Address, ContractError> {
        self.call(ISimpleSwap::issuerCall {}).await
    }

    /// Total already paid out to `beneficiary`.
    pub async fn paid_out(&self, beneficiary: Address) -> Result<Uint256, ContractError> {
        self.call(ISimpleSwap::paidOutCall { beneficiary })
            .await
            .map(Uint256::from)
    }

    pub async fn total_paid_out(&self) -> Result<Uint256, ContractError> {
        self.call(ISimpleSwap::totalPaidOutCall {})
            .await
            .map(Uint256::from)
    }

    /// Balance not reserved by hard deposits.
    pub async fn liquid_balance(&self) -> Result<Uint256, ContractError> {
        self.call(ISimpleSwap::liquidBalanceCall {})
            .await
            .map(Uint256::from)
    }

    pub async fn total_hard_deposit(&self) -> Result<Uint256, ContractError> {
        self.call(ISimpleSwap::totalHardDepositCall {})
            .await
            .map(Uint256::from)
    }

    /// Transaction cashing a cheque for `recipient`.
    pub fn cash_cheque_beneficiary_request(
        &self,
        recipient: Address,
        cumulative_payout: Uint256,
        signature: Bytes,
    ) -> TxRequest {
        let call = ISimpleSwap::cashChequeBeneficiaryCall {
            recipient,
            cumulativePayout: cumulative_payout.value(),
            issuerSig: signature,
        };
        TxRequest::new(self.address, call.abi_encode())
    }

    /// Send a `cashChequeBeneficiary` transaction without waiting for it.
    pub async fn cash_cheque_beneficiary_start(
        &self,
        opts: &TransactOpts,
        recipient: Address,
        cumulative_payout: Uint256,
        signature: Bytes,
    ) -> Result<B256, ContractError> {
        let request = self.cash_cheque_beneficiary_request(recipient, cumulative_payout, signature);
        let opts = opts.clone().with_gas_limit(CASH_CHEQUE_GAS_LIMIT);
        let hash = self.backend.send_transaction(request, &opts).await?;
        debug!(contract = %self.address, %recipient, %hash, "Cash cheque transaction sent");
        Ok(hash)
    }

    /// Read the result of a mined `cashChequeBeneficiary` transaction.
    pub fn cash_cheque_beneficiary_result(
        &self,
        receipt: &Receipt,
    ) -> Result<CashChequeResult, ContractError> {
        if !receipt.status {
            return Err(ContractError::TransactionReverted(receipt.transaction_hash));
        }

        let mut cashed = None;
        let mut bounced = false;
        for log in receipt.logs.iter().filter(|log| log.address == self.address) {
            match log.topics.first() {
                Some(topic) if *topic == ISimpleSwap::ChequeCashed::SIGNATURE_HASH => {
                    let event = ISimpleSwap::ChequeCashed::decode_log_data(&log.log_data())
                        .map_err(|e| ContractError::Decode(e.to_string()))?;
                    cashed = Some(event);
                }
                Some(topic) if *topic == ISimpleSwap::ChequeBounced::SIGNATURE_HASH => {
                    bounced = true;
                }
                _ => {}
            }
        }

        let event = cashed.ok_or(ContractError::MissingEvent {
            tx: receipt.transaction_hash,
            event: "ChequeCashed",
        })?;

        Ok(CashChequeResult {
            beneficiary: event.beneficiary,
            recipient: event.recipient,
            caller: event.caller,
            total_payout: event.totalPayout.into(),
            cumulative_payout: event.cumulativePayout.into(),
            caller_payout: event.callerPayout.into(),
            bounced,
        })
    }

    pub fn withdraw_request(&self, amount: Uint256) -> TxRequest {
        let call = ISimpleSwap::withdrawCall {
            amount: amount.value(),
        };
        TxRequest::new(self.address, call.abi_encode())
    }

    /// Send a withdrawal of `amount` to the issuer.
    pub async fn withdraw(
        &self,
        opts: &TransactOpts,
        amount: Uint256,
    ) -> Result<B256, ContractError> {
        let hash = self
            .backend
            .send_transaction(self.withdraw_request(amount), opts)
            .await?;
        debug!(contract = %self.address, %amount, %hash, "Withdraw transaction sent");
        Ok(hash)
    }

    /// Check that the code at the address is the SimpleSwap runtime code.
    pub async fn validate_code(&self) -> Result<(), ContractError> {
        let code = self.backend.code_at(self.address).await?;
        if code != simple_swap_runtime_code()? {
            return Err(ContractError::InvalidContractCode(self.address));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_code_decodes() {
        let code = simple_swap_runtime_code().unwrap();
        assert_eq!(code.len(), SIMPLE_SWAP_RUNTIME_HEX.trim().len() / 2);
        // PUSH1 0x80 PUSH1 0x40 MSTORE
        assert_eq!(&code[..5], &[0x60, 0x80, 0x60, 0x40, 0x52]);
    }
}
