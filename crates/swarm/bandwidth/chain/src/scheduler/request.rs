use std::fmt;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use vertex_storage::JsonValue;

use crate::Receipt;

/// Lifecycle state of a scheduled request.
///
/// `Queued -> Pending -> Confirmed | StatusUnknown`, or
/// `Queued -> StatusUnknown | Cancelled`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::IntoStaticStr,
)]
pub enum RequestState {
    /// Waiting to be sent.
    Queued,
    /// Broadcast, no receipt yet.
    Pending,
    /// A receipt was observed.
    Confirmed,
    /// The transaction may or may not have reached the network.
    StatusUnknown,
    /// No handler could send it.
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::StatusUnknown | Self::Cancelled
        )
    }

    /// Whether the state machine allows `self -> next`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Pending | Self::StatusUnknown | Self::Cancelled)
                | (Self::Pending, Self::Confirmed | Self::StatusUnknown)
        )
    }
}

/// Identifies who handles a request: the handler and the kind of request.
///
/// Store keys join both names with `_`, so neither may contain one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestTypeId {
    pub handler: String,
    pub request_type: String,
}

impl RequestTypeId {
    pub fn new(handler: impl Into<String>, request_type: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            request_type: request_type.into(),
        }
    }

    /// Whether both names are non-empty and free of the `_` separator.
    pub fn is_valid(&self) -> bool {
        [&self.handler, &self.request_type]
            .iter()
            .all(|name| !name.is_empty() && !name.contains('_'))
    }
}

impl fmt::Display for RequestTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.handler, self.request_type)
    }
}

/// Persisted request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequestRecord {
    pub id: u64,
    pub type_id: RequestTypeId,
    pub state: RequestState,
    /// Set once the request is `Pending`.
    pub tx_hash: Option<B256>,
}

impl JsonValue for TxRequestRecord {}

/// A notification delivered to the handlers of a request type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxNotification {
    StateChanged {
        old: RequestState,
        new: RequestState,
    },
    Receipt {
        receipt: Receipt,
    },
}

impl JsonValue for TxNotification {}

/// Entry of a notification sub-queue; the body is stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NotificationEntry {
    pub(crate) request_id: u64,
    pub(crate) kind: NotificationKind,
}

impl JsonValue for NotificationEntry {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum NotificationKind {
    StateChanged,
    Receipt,
}

impl TxNotification {
    pub(crate) fn kind(&self) -> NotificationKind {
        match self {
            Self::StateChanged { .. } => NotificationKind::StateChanged,
            Self::Receipt { .. } => NotificationKind::Receipt,
        }
    }
}
