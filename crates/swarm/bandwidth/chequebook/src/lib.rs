//! Cheques for SWAP settlement.
//!
//! A cheque promises its beneficiary a cumulative payout from the issuer's
//! chequebook. Cheques travel off-chain as JSON and can be cashed on-chain at
//! any time; the chequebook pays the difference between the cheque and what
//! it already paid out.
//!
//! # Signing
//!
//! The signed message is the 72-byte encoding
//!
//! ```text
//! contract (20) || beneficiary (20) || cumulative payout (32, big-endian)
//! ```
//!
//! hashed with Keccak-256 and wrapped in the `personal_sign` prefix. The
//! recovery byte of the 65-byte signature is 27 or 28.

pub mod cheque;

pub use cheque::{Cheque, ChequeParams, SIGNATURE_LEN, SIGNED_MESSAGE_LEN};

pub use alloy_primitives::{Address, Bytes};
use vertex_swarm_bandwidth_primitives::{BoundedIntError, Uint256};

/// Errors from cheque signing and verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChequeError {
    /// The signature is malformed or not from the expected signer.
    #[error("invalid cheque signature: {0}")]
    InvalidChequeSignature(String),

    /// The cheque does not raise the last cumulative payout.
    #[error("cheque cumulative payout {actual} does not exceed last {last}")]
    ChequeNotMonotone { last: Uint256, actual: Uint256 },

    /// Accepting the cheque would put this node too deep into debt.
    #[error("cheque of {honey} honey would cause debt beyond tolerance")]
    ChequeWouldCauseDebt { honey: u64 },

    #[error("cheque is for contract {actual}, expected {expected}")]
    ChequeWrongContract { expected: Address, actual: Address },

    #[error("cheque is for beneficiary {actual}, expected {expected}")]
    ChequeWrongBeneficiary { expected: Address, actual: Address },

    /// The cheque's increment does not match the amount owed.
    #[error("cheque amount {actual} does not match expected {expected}")]
    UnexpectedAmount { expected: Uint256, actual: Uint256 },

    #[error("failed to sign cheque: {0}")]
    Signing(String),

    #[error(transparent)]
    Amount(#[from] BoundedIntError),
}
