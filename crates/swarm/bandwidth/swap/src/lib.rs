//! SWAP - Chequebook-based settlement.
//!
//! Peers keep a signed balance with each other in honey. When we owe a peer
//! the payment threshold, we sign a cheque on our chequebook for the debt;
//! the peer verifies it, credits the balance and confirms. Received cheques
//! are cashed on-chain through the transaction scheduler.
//!
//! # Design
//!
//! 1. [`Swap::add`] accounts a priced operation and issues a cheque once the
//!    debt reaches the payment threshold
//! 2. The creditor handles [`SwapMessage::EmitCheque`]: it verifies the
//!    cheque, stores it and answers with [`SwapMessage::ConfirmCheque`]
//! 3. The [`CashoutProcessor`] cashes the cheque when the
//!    [`CashoutStrategy`] says so, or when asked with [`Swap::cash_cheque`]
//!
//! Messages to peers leave the engine on an unbounded channel of
//! [`OutboundMessage`]s; the transport feeds replies back through
//! [`Swap::handle_message`].

pub mod api;
pub mod args;
pub mod cashout;
pub mod constants;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod oracle;
pub mod peer;
pub mod protocol;

pub use api::{PeerCheques, SwapApi};
pub use args::{ConfigError, SwapArgs, SwapParams};
pub use cashout::{
    CashoutProcessor, CashoutRequest, CashoutResultHandler, CashoutStrategy, cashout_type_id,
};
pub use engine::{Swap, SwapBuilder};
pub use error::SwapError;
pub use oracle::{FixedRateOracle, OracleError, PriceOracle};
pub use peer::SwapPeer;
pub use protocol::{OutboundMessage, ProtocolState, SwapMessage};
