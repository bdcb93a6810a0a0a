//! Test fixtures for the SWAP crates.
//!
//! [`SimulatedBackend`] is an in-process chain that understands the SimpleSwap
//! factory and chequebook well enough to deploy, query, cash and withdraw.

mod backend;

pub use backend::SimulatedBackend;

use alloy_signer_local::PrivateKeySigner;

/// Key used by the cheque signing fixtures.
pub const OWNER_KEY: &str = "634fb5a872396d9693e5c9f9d7233cfa93f395c093371017ff44aa9ae6564cdd";

/// Key of the counterparty in the cheque signing fixtures.
pub const BENEFICIARY_KEY: &str = "6f05b0a29723ca69b1fc65d11752cee22c200cf3d2938e670547f7ae525be112";

pub fn owner_signer() -> PrivateKeySigner {
    signer_from_hex(OWNER_KEY)
}

pub fn beneficiary_signer() -> PrivateKeySigner {
    signer_from_hex(BENEFICIARY_KEY)
}

#[allow(clippy::expect_used)]
fn signer_from_hex(key: &str) -> PrivateKeySigner {
    key.parse().expect("fixture key is valid")
}
