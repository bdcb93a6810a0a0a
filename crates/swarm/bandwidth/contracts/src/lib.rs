//! Bindings for the SimpleSwap chequebook and its factory.
//!
//! The contracts themselves are external; this crate only knows their ABI,
//! the runtime bytecode of the chequebook and its factory, and the factory
//! deployments.

mod abi;
mod error;
mod factory;
mod simple_swap;

pub use abi::{ISimpleSwap, ISimpleSwapFactory, SIMPLE_SWAP_ABI};
pub use error::ContractError;
pub use factory::{SimpleSwapFactory, factory_address_for_network, simple_swap_factory_runtime_code};
pub use simple_swap::{CashChequeResult, ContractParams, SimpleSwap, simple_swap_runtime_code};

/// Gas limit for `cashChequeBeneficiary`, also used to estimate its cost.
pub const CASH_CHEQUE_GAS_LIMIT: u64 = 50_000;

/// Gas limit for `deploySimpleSwap`.
pub const DEPLOY_GAS_LIMIT: u64 = 2_000_000;
