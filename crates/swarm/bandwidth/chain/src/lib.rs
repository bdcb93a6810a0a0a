//! Chain access for SWAP.
//!
//! - [`ChainBackend`] is the seam to an Ethereum node: calls, code lookups,
//!   transaction submission and receipt lookup.
//! - [`wait_mined`] polls for a receipt until it appears or the caller shuts
//!   down.
//! - [`PersistentQueue`] is a FIFO on top of a [`StateStore`](vertex_storage::StateStore).
//! - [`TxScheduler`] submits transactions from one account one at a time and
//!   delivers state-change and receipt notifications at least once, across
//!   restarts.

mod backend;
mod queue;
mod shutdown;
mod wait;

pub mod scheduler;

pub use backend::{ChainBackend, ChainError, Receipt, ReceiptLog, TransactOpts, TxRequest};
pub use queue::{PersistentQueue, QueueError, QueueTrigger};
pub use scheduler::{
    ReceiptNotification, RequestState, RequestTypeId, SchedulerError, SchedulerTimeouts,
    SendRequest, StateChangedNotification, TxNotification, TxRequestHandlers, TxRequestRecord,
    TxScheduler,
};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use wait::{wait_mined, wait_mined_with_timeout};

use std::time::Duration;

/// Interval between receipt lookups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
