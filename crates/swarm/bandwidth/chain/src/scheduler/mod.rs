//! Durable, serial transaction submission.
//!
//! Requests are queued in the state store and sent one at a time from the
//! scheduler's account. Every state transition is recorded together with a
//! notification for the request type's handlers, so a crash at any point
//! leaves the store describing what happened and what still has to be
//! delivered.
//!
//! Keys, all under the scheduler prefix:
//!
//! | key | value |
//! |---|---|
//! | `_request_id` | next request id |
//! | `_requests_<id>` | [`TxRequestRecord`] |
//! | `_requests_<id>_data` | caller payload (JSON) |
//! | `_active` | id of the request being sent or awaited |
//! | `_requestQueue_<ts>_<nonce>` | queued request id |
//! | `_notify_<type>_<ts>_<nonce>` | notification queue entry |
//! | `_notification_<type>_<ts>_<nonce>` | notification body |

mod handlers;
mod request;

pub use handlers::{
    NotifyReceiptFn, NotifyStateChangedFn, ReceiptNotification, SendFn, SendRequest,
    StateChangedNotification, TxRequestHandlers,
};
pub use request::{RequestState, RequestTypeId, TxNotification, TxRequestRecord};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use metrics::Counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vertex_storage::{StateStore, StateStoreExt, StoreBatch, StoreError};

use crate::{
    ChainBackend, ChainError, DEFAULT_POLL_INTERVAL, PersistentQueue, QueueError, QueueTrigger,
    Receipt, Shutdown, ShutdownSignal, TransactOpts, wait_mined_with_timeout,
};
use request::NotificationEntry;

/// How long a sent transaction may stay unmined before it is given up.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Delay before a failed notification is delivered again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTimeouts {
    pub receipt_timeout: Duration,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for SchedulerTimeouts {
    fn default() -> Self {
        Self {
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A handler or request type name is empty or contains `_`.
    #[error("invalid request type {0}")]
    InvalidTypeId(RequestTypeId),

    #[error("handlers already registered for {0}")]
    HandlersAlreadySet(RequestTypeId),

    #[error("no handler registered for {0}")]
    NoHandler(RequestTypeId),

    #[error("unknown request {0}")]
    UnknownRequest(u64),

    #[error("request {0} is pending without a transaction hash")]
    MissingTxHash(u64),

    /// The request ended without a receipt.
    #[error("request {id} ended as {state}")]
    RequestFailed { id: u64, state: RequestState },

    #[error("timed out waiting for request {0}")]
    Timeout(u64),

    #[error("failed to encode request data: {0}")]
    Encode(String),

    #[error("failed to decode request data: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("scheduler stopped")]
    Cancelled,
}

struct SchedulerMetrics {
    requests: Counter,
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self {
            requests: metrics::counter!("swap.txscheduler.requests"),
        }
    }
}

impl SchedulerMetrics {
    fn record_transition(&self, state: RequestState) {
        let state: &'static str = state.into();
        metrics::counter!("swap.txscheduler.transitions", "state" => state).increment(1);
    }
}

/// Handlers and notification queues by request type, guarded by the
/// scheduler lock.
#[derive(Default)]
struct Registry {
    handlers: HashMap<RequestTypeId, TxRequestHandlers>,
    notification_queues: HashMap<RequestTypeId, Arc<PersistentQueue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct Inner {
    store: Arc<dyn StateStore>,
    backend: Arc<dyn ChainBackend>,
    signer: Arc<PrivateKeySigner>,
    prefix: String,
    timeouts: SchedulerTimeouts,
    lock: Mutex<Registry>,
    request_queue: PersistentQueue,
    shutdown: Shutdown,
    started: watch::Sender<bool>,
    lifecycle: parking_lot::Mutex<Lifecycle>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    errors: mpsc::Sender<SchedulerError>,
    error_rx: parking_lot::Mutex<Option<mpsc::Receiver<SchedulerError>>>,
    metrics: SchedulerMetrics,
}

/// Sends transactions from one account strictly one after another.
///
/// Register handlers with [`set_handlers`](Self::set_handlers) before
/// [`start`](Self::start): a request whose type has no `send` handler when
/// it reaches the head of the queue is cancelled.
#[derive(Clone)]
pub struct TxScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TxScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxScheduler")
            .field("prefix", &self.inner.prefix)
            .field("address", &self.inner.signer.address())
            .finish_non_exhaustive()
    }
}

impl TxScheduler {
    pub fn new(
        store: Arc<dyn StateStore>,
        backend: Arc<dyn ChainBackend>,
        signer: Arc<PrivateKeySigner>,
        prefix: impl Into<String>,
    ) -> Self {
        Self::with_timeouts(store, backend, signer, prefix, SchedulerTimeouts::default())
    }

    pub fn with_timeouts(
        store: Arc<dyn StateStore>,
        backend: Arc<dyn ChainBackend>,
        signer: Arc<PrivateKeySigner>,
        prefix: impl Into<String>,
        timeouts: SchedulerTimeouts,
    ) -> Self {
        let prefix = prefix.into();
        let request_queue = PersistentQueue::new(store.clone(), format!("{prefix}_requestQueue_"));
        let (started, _) = watch::channel(false);
        let (errors, error_rx) = mpsc::channel(1);

        Self {
            inner: Arc::new(Inner {
                store,
                backend,
                signer,
                prefix,
                timeouts,
                lock: Mutex::new(Registry::default()),
                request_queue,
                shutdown: Shutdown::new(),
                started,
                lifecycle: parking_lot::Mutex::new(Lifecycle::Idle),
                tasks: parking_lot::Mutex::new(Vec::new()),
                errors,
                error_rx: parking_lot::Mutex::new(Some(error_rx)),
                metrics: SchedulerMetrics::default(),
            }),
        }
    }

    /// Account the scheduler sends from.
    pub fn address(&self) -> Address {
        self.inner.signer.address()
    }

    pub fn backend(&self) -> &Arc<dyn ChainBackend> {
        &self.inner.backend
    }

    pub fn timeouts(&self) -> SchedulerTimeouts {
        self.inner.timeouts
    }

    /// Fires when the scheduler stops.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.inner.shutdown.signal()
    }

    /// Spawn the main loop and the watchdog. A no-op unless the scheduler
    /// has never been started.
    pub fn start(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if *lifecycle != Lifecycle::Idle {
                return;
            }
            *lifecycle = Lifecycle::Running;
        }

        let main = {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                match inner.clone().run().await {
                    Ok(()) => debug!(prefix = %inner.prefix, "Scheduler loop finished"),
                    Err(e) => inner.fatal(e),
                }
            })
        };

        let watchdog = {
            let inner = self.inner.clone();
            let error_rx = self.inner.error_rx.lock().take();
            tokio::spawn(async move {
                let Some(mut error_rx) = error_rx else {
                    return;
                };
                let signal = inner.shutdown.signal();
                tokio::select! {
                    Some(e) = error_rx.recv() => {
                        error!(prefix = %inner.prefix, error = %e, "Scheduler failed, shutting down");
                        inner.shutdown.trigger();
                    }
                    _ = signal.cancelled() => {}
                }
            })
        };

        self.inner.tasks.lock().extend([main, watchdog]);
        self.inner.started.send_replace(true);
        info!(prefix = %self.inner.prefix, address = %self.address(), "Transaction scheduler started");
    }

    /// Cancel every task and wait for them. Idempotent.
    pub async fn stop(&self) {
        *self.inner.lifecycle.lock() = Lifecycle::Stopped;
        self.inner.shutdown.trigger();

        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task panicked");
            }
        }
    }

    /// Register the handlers of a request type and spawn its notification
    /// delivery. Fails if the type already has handlers.
    pub async fn set_handlers(
        &self,
        type_id: RequestTypeId,
        handlers: TxRequestHandlers,
    ) -> Result<(), SchedulerError> {
        if !type_id.is_valid() {
            return Err(SchedulerError::InvalidTypeId(type_id));
        }
        let queue = {
            let mut registry = self.inner.lock.lock().await;
            if registry.handlers.contains_key(&type_id) {
                return Err(SchedulerError::HandlersAlreadySet(type_id));
            }
            registry.handlers.insert(type_id.clone(), handlers.clone());
            self.inner.notification_queue(&mut registry, &type_id)
        };

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.deliver_notifications(type_id, queue, handlers).await });
        self.inner.tasks.lock().push(task);
        Ok(())
    }

    /// Queue a request of `type_id` carrying `data`, returning its id.
    pub async fn schedule_request<T: Serialize>(
        &self,
        type_id: &RequestTypeId,
        data: &T,
    ) -> Result<u64, SchedulerError> {
        if !type_id.is_valid() {
            return Err(SchedulerError::InvalidTypeId(type_id.clone()));
        }
        let data = serde_json::to_vec(data).map_err(|e| SchedulerError::Encode(e.to_string()))?;
        let inner = &self.inner;

        let registry = inner.lock.lock().await;
        let id = inner.store.get_opt::<u64>(&inner.key("request_id"))?.unwrap_or(1);

        let mut batch = StoreBatch::new();
        batch.put(inner.key("request_id"), &(id + 1))?;
        batch.put(
            inner.request_key(id),
            &TxRequestRecord {
                id,
                type_id: type_id.clone(),
                state: RequestState::Queued,
                tx_hash: None,
            },
        )?;
        batch.put_raw(inner.data_key(id), data);
        let (_, trigger) = inner.request_queue.enqueue(&mut batch, &id)?;
        inner.store.write_batch(batch)?;
        drop(registry);

        trigger.fire();
        inner.metrics.requests.increment(1);
        debug!(id, type_id = %type_id, "Request scheduled");
        Ok(id)
    }

    /// Payload passed to [`schedule_request`](Self::schedule_request).
    pub fn extra_data<T: DeserializeOwned>(&self, id: u64) -> Result<T, SchedulerError> {
        let raw = self
            .inner
            .store
            .get_raw(&self.inner.data_key(id))
            .map_err(|e| not_found_as_unknown(e, id))?;
        serde_json::from_slice(&raw).map_err(|e| SchedulerError::Decode(e.to_string()))
    }

    pub fn request(&self, id: u64) -> Result<TxRequestRecord, SchedulerError> {
        self.inner.load_record(id)
    }

    /// Persisted state of a request and its transaction hash, once sent.
    pub fn request_state(&self, id: u64) -> Result<(RequestState, Option<B256>), SchedulerError> {
        let record = self.inner.load_record(id)?;
        Ok((record.state, record.tx_hash))
    }

    /// Wait until request `id` is confirmed and return its receipt.
    ///
    /// Fails with [`SchedulerError::RequestFailed`] if it ends in any other
    /// state.
    pub async fn wait_for_request(
        &self,
        id: u64,
        timeout: Duration,
    ) -> Result<Receipt, SchedulerError> {
        tokio::time::timeout(timeout, self.poll_request(id, &self.shutdown_signal()))
            .await
            .map_err(|_| SchedulerError::Timeout(id))?
    }

    async fn poll_request(&self, id: u64, signal: &ShutdownSignal) -> Result<Receipt, SchedulerError> {
        loop {
            let record = self.inner.load_record(id)?;
            match (record.state, record.tx_hash) {
                (RequestState::Confirmed, Some(hash)) => {
                    if let Some(receipt) = self.inner.backend.transaction_receipt(hash).await? {
                        return Ok(receipt);
                    }
                }
                (RequestState::Confirmed, None) => return Err(SchedulerError::MissingTxHash(id)),
                (state, _) if state.is_terminal() => {
                    return Err(SchedulerError::RequestFailed { id, state });
                }
                _ => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(self.inner.timeouts.poll_interval) => {}
                _ = signal.cancelled() => return Err(SchedulerError::Cancelled),
            }
        }
    }

    /// Id of the request currently being sent or awaited.
    pub fn active_request(&self) -> Result<Option<u64>, SchedulerError> {
        Ok(self.inner.store.get_opt(&self.inner.key("active"))?)
    }
}

fn not_found_as_unknown(e: StoreError, id: u64) -> SchedulerError {
    if e.is_not_found() {
        SchedulerError::UnknownRequest(id)
    } else {
        SchedulerError::Store(e)
    }
}

impl Inner {
    fn key(&self, name: &str) -> String {
        format!("{}_{name}", self.prefix)
    }

    fn request_key(&self, id: u64) -> String {
        format!("{}_requests_{id}", self.prefix)
    }

    fn data_key(&self, id: u64) -> String {
        format!("{}_requests_{id}_data", self.prefix)
    }

    fn notification_key(&self, type_id: &RequestTypeId, queue_key: &str) -> String {
        format!("{}_notification_{type_id}_{queue_key}", self.prefix)
    }

    fn load_record(&self, id: u64) -> Result<TxRequestRecord, SchedulerError> {
        self.store
            .get(&self.request_key(id))
            .map_err(|e| not_found_as_unknown(e, id))
    }

    fn notification_queue(
        &self,
        registry: &mut Registry,
        type_id: &RequestTypeId,
    ) -> Arc<PersistentQueue> {
        registry
            .notification_queues
            .entry(type_id.clone())
            .or_insert_with(|| {
                Arc::new(PersistentQueue::new(
                    self.store.clone(),
                    format!("{}_notify_{type_id}_", self.prefix),
                ))
            })
            .clone()
    }

    /// Report a fatal error to the watchdog. Only the first one is kept.
    fn fatal(&self, e: SchedulerError) {
        if self.errors.try_send(e).is_err() {
            debug!(prefix = %self.prefix, "Scheduler error channel full");
        }
    }

    fn enqueue_notification(
        &self,
        registry: &mut Registry,
        batch: &mut StoreBatch,
        type_id: &RequestTypeId,
        request_id: u64,
        notification: &TxNotification,
    ) -> Result<QueueTrigger, SchedulerError> {
        let queue = self.notification_queue(registry, type_id);
        let entry = NotificationEntry {
            request_id,
            kind: notification.kind(),
        };
        let (key, trigger) = queue.enqueue(batch, &entry)?;
        batch.put(self.notification_key(type_id, &key), notification)?;
        Ok(trigger)
    }

    /// Move `record` to `new`, adding the record update and its
    /// notification to `batch`.
    fn transition(
        &self,
        registry: &mut Registry,
        batch: &mut StoreBatch,
        record: &mut TxRequestRecord,
        new: RequestState,
    ) -> Result<QueueTrigger, SchedulerError> {
        let old = record.state;
        if !old.can_transition_to(new) {
            warn!(id = record.id, %old, %new, "Unexpected request state transition");
        }
        record.state = new;
        batch.put(self.request_key(record.id), &*record)?;

        let trigger = self.enqueue_notification(
            registry,
            batch,
            &record.type_id,
            record.id,
            &TxNotification::StateChanged { old, new },
        )?;

        self.metrics.record_transition(new);
        debug!(id = record.id, %old, %new, "Request state changed");
        Ok(trigger)
    }

    async fn run(self: Arc<Self>) -> Result<(), SchedulerError> {
        let signal = self.shutdown.signal();
        self.process_active_request(&signal).await?;

        loop {
            let (key, id, mut registry) =
                match self.request_queue.next::<u64, _>(&signal, &self.lock).await {
                    Ok(next) => next,
                    Err(QueueError::Cancelled) => return Ok(()),
                    Err(e) => return Err(e.into()),
                };

            let mut record = match self.load_record(id) {
                Ok(record) => record,
                Err(SchedulerError::UnknownRequest(_)) => {
                    warn!(id, "Queued request has no record, dropping");
                    let mut batch = StoreBatch::new();
                    self.request_queue.delete(&mut batch, &key);
                    self.store.write_batch(batch)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let send = registry
                .handlers
                .get(&record.type_id)
                .and_then(|handlers| handlers.send.clone());

            let Some(send) = send else {
                debug!(id, type_id = %record.type_id, "No send handler, cancelling request");
                let mut batch = StoreBatch::new();
                self.request_queue.delete(&mut batch, &key);
                let trigger =
                    self.transition(&mut registry, &mut batch, &mut record, RequestState::Cancelled)?;
                self.store.write_batch(batch)?;
                drop(registry);
                trigger.fire();
                continue;
            };

            let data = self.store.get_raw(&self.data_key(id))?;
            let mut batch = StoreBatch::new();
            batch.put(self.key("active"), &id)?;
            self.request_queue.delete(&mut batch, &key);
            self.store.write_batch(batch)?;
            drop(registry);

            let result = send(SendRequest {
                id,
                data,
                backend: self.backend.clone(),
                opts: TransactOpts::new(self.signer.clone()),
                shutdown: signal.clone(),
            })
            .await;

            let mut registry = self.lock.lock().await;
            let mut batch = StoreBatch::new();
            let trigger = match result {
                Ok(hash) => {
                    debug!(id, %hash, "Request sent");
                    record.tx_hash = Some(hash);
                    self.transition(&mut registry, &mut batch, &mut record, RequestState::Pending)?
                }
                Err(e) => {
                    warn!(id, error = %e, "Failed to send request");
                    batch.delete(self.key("active"));
                    self.transition(
                        &mut registry,
                        &mut batch,
                        &mut record,
                        RequestState::StatusUnknown,
                    )?
                }
            };
            self.store.write_batch(batch)?;
            drop(registry);
            trigger.fire();

            if record.state == RequestState::Pending {
                self.wait_for_active_transaction(record, &signal).await?;
            }
        }
    }

    /// Resume whatever was active when the previous run stopped.
    async fn process_active_request(&self, signal: &ShutdownSignal) -> Result<(), SchedulerError> {
        let Some(id) = self.store.get_opt::<u64>(&self.key("active"))? else {
            return Ok(());
        };

        let mut registry = self.lock.lock().await;
        let mut record = match self.load_record(id) {
            Ok(record) => record,
            Err(SchedulerError::UnknownRequest(_)) => {
                warn!(id, "Active request has no record, clearing");
                self.store.delete(&self.key("active"))?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match record.state {
            RequestState::Pending => {
                drop(registry);
                info!(id, "Resuming wait for pending request");
                self.wait_for_active_transaction(record, signal).await
            }
            RequestState::Queued => {
                // the transaction may already be on the network
                warn!(id, "Active request was interrupted before it was sent");
                let mut batch = StoreBatch::new();
                batch.delete(self.key("active"));
                let trigger = self.transition(
                    &mut registry,
                    &mut batch,
                    &mut record,
                    RequestState::StatusUnknown,
                )?;
                self.store.write_batch(batch)?;
                drop(registry);
                trigger.fire();
                Ok(())
            }
            state => {
                warn!(id, %state, "Active request already finished, clearing");
                self.store.delete(&self.key("active"))?;
                Ok(())
            }
        }
    }

    async fn wait_for_active_transaction(
        &self,
        mut record: TxRequestRecord,
        signal: &ShutdownSignal,
    ) -> Result<(), SchedulerError> {
        let id = record.id;
        let hash = record.tx_hash.ok_or(SchedulerError::MissingTxHash(id))?;

        let result = wait_mined_with_timeout(
            self.backend.as_ref(),
            hash,
            self.timeouts.poll_interval,
            self.timeouts.receipt_timeout,
            signal,
        )
        .await;

        let mut registry = self.lock.lock().await;
        let mut batch = StoreBatch::new();
        batch.delete(self.key("active"));

        let trigger = match result {
            Ok(receipt) => {
                debug!(id, %hash, block = receipt.block_number, "Request confirmed");
                self.transition(&mut registry, &mut batch, &mut record, RequestState::Confirmed)?;
                let type_id = record.type_id.clone();
                self.enqueue_notification(
                    &mut registry,
                    &mut batch,
                    &type_id,
                    id,
                    &TxNotification::Receipt { receipt },
                )?
            }
            Err(ChainError::Cancelled) => return Ok(()),
            Err(e) => {
                warn!(id, %hash, error = %e, "No receipt for request");
                self.transition(
                    &mut registry,
                    &mut batch,
                    &mut record,
                    RequestState::StatusUnknown,
                )?
            }
        };

        self.store.write_batch(batch)?;
        drop(registry);
        trigger.fire();
        Ok(())
    }

    async fn deliver_notifications(
        self: Arc<Self>,
        type_id: RequestTypeId,
        queue: Arc<PersistentQueue>,
        handlers: TxRequestHandlers,
    ) {
        let signal = self.shutdown.signal();

        let mut started = self.started.subscribe();
        tokio::select! {
            ok = async { started.wait_for(|started| *started).await.is_ok() } => {
                if !ok {
                    return;
                }
            }
            _ = signal.cancelled() => return,
        }

        loop {
            let (key, entry, registry) =
                match queue.next::<NotificationEntry, _>(&signal, &self.lock).await {
                    Ok(next) => next,
                    Err(QueueError::Cancelled) => return,
                    Err(e) => return self.fatal(e.into()),
                };
            let body_key = self.notification_key(&type_id, &key);
            let body = self.store.get_opt::<TxNotification>(&body_key);
            drop(registry);

            let notification = match body {
                Ok(Some(notification)) => Some(notification),
                Ok(None) => {
                    warn!(type_id = %type_id, request = entry.request_id, "Notification body missing");
                    None
                }
                Err(e) => return self.fatal(e.into()),
            };

            if let Some(notification) = notification {
                loop {
                    match deliver(&handlers, entry.request_id, &notification, &signal).await {
                        Ok(()) => break,
                        Err(e) => {
                            warn!(
                                type_id = %type_id,
                                request = entry.request_id,
                                kind = ?entry.kind,
                                error = %e,
                                "Notification handler failed, retrying",
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(self.timeouts.retry_delay) => {}
                                _ = signal.cancelled() => return,
                            }
                        }
                    }
                }
            }

            let _registry = self.lock.lock().await;
            let mut batch = StoreBatch::new();
            queue.delete(&mut batch, &key);
            batch.delete(body_key);
            if let Err(e) = self.store.write_batch(batch) {
                return self.fatal(e.into());
            }
        }
    }
}

async fn deliver(
    handlers: &TxRequestHandlers,
    id: u64,
    notification: &TxNotification,
    signal: &ShutdownSignal,
) -> eyre::Result<()> {
    match notification {
        TxNotification::StateChanged { old, new } => match &handlers.notify_state_changed {
            Some(notify) => {
                notify(StateChangedNotification {
                    id,
                    old: *old,
                    new: *new,
                    shutdown: signal.clone(),
                })
                .await
            }
            None => Ok(()),
        },
        TxNotification::Receipt { receipt } => match &handlers.notify_receipt {
            Some(notify) => {
                notify(ReceiptNotification {
                    id,
                    receipt: receipt.clone(),
                    shutdown: signal.clone(),
                })
                .await
            }
            None => Ok(()),
        },
    }
}
