use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, LogData, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from a [`ChainBackend`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The node returned an error or could not be reached.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A call or transaction reverted.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The transaction was rejected before inclusion.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// No receipt before the deadline.
    #[error("timed out waiting for receipt of {0}")]
    Timeout(B256),

    /// The waiting side shut down.
    #[error("cancelled")]
    Cancelled,
}

/// Target and calldata of a call or transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
}

impl TxRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
        }
    }
}

/// Transaction options.
///
/// Sender, signer and nonce are fixed at construction; the remaining fields
/// may be adjusted by whoever builds the transaction.
#[derive(Debug, Clone)]
pub struct TransactOpts {
    from: Address,
    signer: Arc<PrivateKeySigner>,
    nonce: Option<u64>,
    /// Gas limit, estimated by the backend when unset.
    pub gas_limit: Option<u64>,
    /// Gas price, suggested by the backend when unset.
    pub gas_price: Option<U256>,
    /// Wei sent along.
    pub value: U256,
}

impl TransactOpts {
    pub fn new(signer: Arc<PrivateKeySigner>) -> Self {
        Self {
            from: signer.address(),
            signer,
            nonce: None,
            gas_limit: None,
            gas_price: None,
            value: U256::ZERO,
        }
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Always `None`: the backend assigns the pending nonce.
    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A log entry of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl ReceiptLog {
    /// Topics and data in the form the ABI event decoders take.
    pub fn log_data(&self) -> LogData {
        LogData::new_unchecked(self.topics.clone(), self.data.clone())
    }
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// `true` if execution succeeded.
    pub status: bool,
    pub gas_used: u64,
    /// Set for contract creations.
    pub contract_address: Option<Address>,
    pub logs: Vec<ReceiptLog>,
}

/// Access to an Ethereum node.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Runtime bytecode at `address`; empty for accounts without code.
    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError>;

    /// Execute a read-only call against the latest state.
    async fn call(&self, request: &TxRequest) -> Result<Bytes, ChainError>;

    async fn suggest_gas_price(&self) -> Result<U256, ChainError>;

    /// Sign and broadcast a transaction, returning its hash.
    async fn send_transaction(
        &self,
        request: TxRequest,
        opts: &TransactOpts,
    ) -> Result<B256, ChainError>;

    /// `None` while the transaction is not mined.
    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, ChainError>;
}
