//! SWAP errors.

use alloy_primitives::Address;
use vertex_storage::StoreError;
use vertex_swarm_bandwidth_chain::{ChainError, SchedulerError};
use vertex_swarm_bandwidth_chequebook::ChequeError;
use vertex_swarm_bandwidth_contracts::ContractError;
use vertex_swarm_bandwidth_primitives::{BoundedIntError, PeerId, Uint256};

use crate::args::ConfigError;
use crate::oracle::OracleError;

/// Errors that can occur during swap operations.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    /// The peer was never added, or has been removed.
    #[error("peer {0} is not a swap peer")]
    UnknownPeer(PeerId),

    /// The peer owes too much for another priced operation.
    #[error("balance {balance} with peer {peer} is at the disconnect threshold {threshold}")]
    BalanceThresholdExceeded {
        peer: PeerId,
        balance: i64,
        threshold: i64,
    },

    /// The balance update does not fit.
    #[error("balance with peer {0} overflows")]
    BalanceOverflow(PeerId),

    /// The store was used with another chain before.
    #[error("store was used with chain {stored}, backend is chain {actual}")]
    ChainMismatch { stored: u64, actual: u64 },

    /// A different chequebook than the one in the store was requested.
    #[error("chequebook {provided} requested, but {stored} was used before")]
    ChequebookMismatch { stored: Address, provided: Address },

    /// No chequebook has been started.
    #[error("no chequebook")]
    NoChequebook,

    #[error("swap already started")]
    AlreadyStarted,

    /// A confirmation arrived that does not match the pending cheque.
    #[error("unexpected confirmation from peer {0}")]
    UnexpectedConfirmation(PeerId),

    #[error("no cheque received from peer {0}")]
    NoReceivedCheque(PeerId),

    #[error("cannot withdraw {requested}, only {available} available")]
    InsufficientFunds {
        requested: Uint256,
        available: Uint256,
    },

    /// Outbound messages can no longer be delivered.
    #[error("outbound channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Cheque(#[from] ChequeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Amount(#[from] BoundedIntError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SwapError {
    /// Whether the error is a rejected cheque that should be reported to the
    /// issuing peer.
    pub fn is_cheque_rejection(&self) -> bool {
        matches!(self, Self::Cheque(_))
    }
}
