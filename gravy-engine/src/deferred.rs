//! Deferred execution mode (§4.6): an invocation that should not run on
//! the caller's request thread is handed to a queue instead, and a
//! background worker picks it up later. The teacher's would-be analogue
//! is a message broker; since this workspace has none, the in-process
//! `tokio::sync::mpsc` implementation below stands in for it. `DeferredQueue`
//! is a trait so a real broker client could implement it without touching
//! callers.

use async_trait::async_trait;
use shared::errors::ApiError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};
use uuid::Uuid;

#[async_trait]
pub trait DeferredQueue: Send + Sync {
    async fn publish(&self, invocation_id: Uuid) -> Result<(), ApiError>;
}

/// A bounded in-process channel. Bounded rather than unbounded so a
/// stalled worker applies backpressure to callers instead of growing
/// memory without limit.
pub struct InProcessDeferredQueue {
    sender: mpsc::Sender<Uuid>,
}

impl InProcessDeferredQueue {
    /// Returns the queue handle plus the receiver a worker task should
    /// drive with `run_worker`. Kept separate so construction doesn't
    /// force a particular executor shape on the caller.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Uuid>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeferredQueue for InProcessDeferredQueue {
    async fn publish(&self, invocation_id: Uuid) -> Result<(), ApiError> {
        self.sender
            .send(invocation_id)
            .await
            .map_err(|_| ApiError::InternalError { message: "deferred queue worker has shut down".to_string() })
    }
}

/// Runs until the queue's sender half is dropped, invoking `handle` for
/// each invocation id it receives. A panic inside `handle` would take
/// the whole process down with it, so callers should make `handle`
/// itself infallible (log-and-continue on error) the way it's written
/// in `engine::InvocationEngine::run_deferred`.
pub async fn run_worker<F, Fut>(mut receiver: mpsc::Receiver<Uuid>, handle: Arc<F>)
where
    F: Fn(Uuid) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), ApiError>> + Send,
{
    while let Some(invocation_id) = receiver.recv().await {
        let handle = Arc::clone(&handle);
        if let Err(e) = handle(invocation_id).await {
            match &e {
                ApiError::DatabaseError(_) | ApiError::InternalError { .. } => {
                    error!(%invocation_id, error = %e, "deferred invocation worker failed");
                }
                _ => warn!(%invocation_id, error = %e, "deferred invocation finished with a problem state"),
            }
        }
    }
}
