use std::future::Future;
use std::sync::Arc;

use alloy_primitives::B256;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::{ChainBackend, Receipt, RequestState, ShutdownSignal, TransactOpts};

/// Input to a send handler.
pub struct SendRequest {
    /// Id of the request being sent.
    pub id: u64,
    /// Payload the request was scheduled with, as JSON.
    pub data: Vec<u8>,
    pub backend: Arc<dyn ChainBackend>,
    /// Options seeded from the scheduler's key.
    pub opts: TransactOpts,
    /// Fires when the scheduler stops.
    pub shutdown: ShutdownSignal,
}

impl SendRequest {
    /// Decode the payload.
    pub fn decode_data<T: DeserializeOwned>(&self) -> eyre::Result<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

/// Input to a receipt handler.
#[derive(Debug, Clone)]
pub struct ReceiptNotification {
    pub id: u64,
    pub receipt: Receipt,
    pub shutdown: ShutdownSignal,
}

/// Input to a state-change handler.
#[derive(Debug, Clone)]
pub struct StateChangedNotification {
    pub id: u64,
    pub old: RequestState,
    pub new: RequestState,
    pub shutdown: ShutdownSignal,
}

pub type SendFn = Arc<dyn Fn(SendRequest) -> BoxFuture<'static, eyre::Result<B256>> + Send + Sync>;
pub type NotifyReceiptFn =
    Arc<dyn Fn(ReceiptNotification) -> BoxFuture<'static, eyre::Result<()>> + Send + Sync>;
pub type NotifyStateChangedFn =
    Arc<dyn Fn(StateChangedNotification) -> BoxFuture<'static, eyre::Result<()>> + Send + Sync>;

/// Callbacks for one request type. Any of them may be absent.
///
/// - `send` builds and broadcasts the transaction for a request.
/// - `notify_receipt` receives the receipt of a confirmed request.
/// - `notify_state_changed` receives every state transition.
#[derive(Clone, Default)]
pub struct TxRequestHandlers {
    pub send: Option<SendFn>,
    pub notify_receipt: Option<NotifyReceiptFn>,
    pub notify_state_changed: Option<NotifyStateChangedFn>,
}

impl std::fmt::Debug for TxRequestHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxRequestHandlers")
            .field("send", &self.send.is_some())
            .field("notify_receipt", &self.notify_receipt.is_some())
            .field("notify_state_changed", &self.notify_state_changed.is_some())
            .finish()
    }
}

impl TxRequestHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_send<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SendRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<B256>> + Send + 'static,
    {
        self.send = Some(Arc::new(
            move |request: SendRequest| -> BoxFuture<'static, eyre::Result<B256>> {
                Box::pin(f(request))
            },
        ));
        self
    }

    pub fn with_notify_receipt<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ReceiptNotification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        self.notify_receipt = Some(Arc::new(
            move |notification: ReceiptNotification| -> BoxFuture<'static, eyre::Result<()>> {
                Box::pin(f(notification))
            },
        ));
        self
    }

    pub fn with_notify_state_changed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(StateChangedNotification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        self.notify_state_changed = Some(Arc::new(
            move |notification: StateChangedNotification| -> BoxFuture<'static, eyre::Result<()>> {
                Box::pin(f(notification))
            },
        ));
        self
    }
}
