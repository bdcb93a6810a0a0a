use alloy_primitives::{Address, B256};
use vertex_swarm_bandwidth_chain::ChainError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// The factory does not list the address among its deployments.
    #[error("contract {0} was not deployed by the factory")]
    NotDeployedByFactory(Address),

    /// The code at the factory address is not the expected factory.
    #[error("code at factory {0} does not match")]
    FactoryCodeMismatch(Address),

    #[error("no known factory for network {0}")]
    UnknownNetwork(u64),

    /// The code at a chequebook address is not the SimpleSwap runtime code.
    #[error("code at {0} is not a SimpleSwap chequebook")]
    InvalidContractCode(Address),

    /// A mined receipt lacks the event the transaction must emit.
    #[error("receipt of {tx} has no {event} event")]
    MissingEvent { tx: B256, event: &'static str },

    /// The transaction was mined but reverted.
    #[error("transaction {0} reverted")]
    TransactionReverted(B256),

    #[error("failed to decode contract data: {0}")]
    Decode(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}
