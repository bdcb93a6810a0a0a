//! Default constants for SWAP accounting.

use std::time::Duration;

/// Price of a retrieve request, in honey.
pub const RETRIEVE_REQUEST_PRICE: i64 = 1;

/// Price of a delivered chunk, in honey.
pub const CHUNK_DELIVERY_PRICE: i64 = 1;

/// Debt at which a cheque is issued, in honey.
pub const DEFAULT_PAYMENT_THRESHOLD: i64 =
    2441 * RETRIEVE_REQUEST_PRICE + 10_000_000 * CHUNK_DELIVERY_PRICE;

/// Debt at which priced operations are refused, in honey.
pub const DEFAULT_DISCONNECT_THRESHOLD: i64 = 20 * DEFAULT_PAYMENT_THRESHOLD;

/// How far a received cheque may overpay before it is refused, in honey.
pub const DEFAULT_CHEQUE_DEBT_TOLERANCE: i64 = 10_000;

/// The only network SWAP runs on.
pub const SUPPORTED_NETWORK_ID: u64 = 5;

/// Default hard deposit timeout of a deployed chequebook.
pub const DEFAULT_HARD_DEPOSIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a direct cash-out waits for its receipt.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default node endpoint.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8545";

/// Prefix of the scheduler keys in the swap store.
pub const SCHEDULER_PREFIX: &str = "swap_txscheduler";

// store keys
pub(crate) const BALANCE_PREFIX: &str = "balance_";
pub(crate) const SENT_CHEQUE_PREFIX: &str = "sent_cheque_";
pub(crate) const RECEIVED_CHEQUE_PREFIX: &str = "received_cheque_";
pub(crate) const PENDING_CHEQUE_PREFIX: &str = "pending_cheque_";
pub(crate) const CONNECTED_CHEQUEBOOK_KEY: &str = "connected_chequebook";
pub(crate) const CONNECTED_BLOCKCHAIN_KEY: &str = "connected_blockchain";
