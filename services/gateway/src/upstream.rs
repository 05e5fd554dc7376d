//! Request/response channel between the gateway and the auth core
//!
//! Every call carries a deadline. The core side runs [`serve`], which pulls
//! frames off the channel and answers each one from its own task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use warden_auth_core::Dispatcher;
use warden_db::AccountRepository;
use warden_types::{ErrorKind, RpcError};

/// Reply to one frame; failures travel as raw JSON and are coerced on receipt
pub type Reply = Result<Value, Value>;

/// One request in flight
#[derive(Debug)]
pub struct Frame {
    pub pattern: String,
    pub payload: Value,
    pub reply: oneshot::Sender<Reply>,
}

/// Something that answers `pattern` + payload requests
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn call(&self, pattern: &str, payload: Value) -> Result<Value, RpcError>;
}

/// [`Upstream`] over a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelUpstream {
    tx: mpsc::Sender<Frame>,
    timeout: Duration,
}

impl ChannelUpstream {
    pub fn new(tx: mpsc::Sender<Frame>, timeout: Duration) -> Self {
        Self { tx, timeout }
    }

    /// Create a client plus the receiving end to hand to [`serve`]
    pub fn channel(buffer: usize, timeout: Duration) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx, timeout), rx)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn unavailable() -> RpcError {
    RpcError::new(ErrorKind::Internal, "upstream unavailable")
}

#[async_trait]
impl Upstream for ChannelUpstream {
    async fn call(&self, pattern: &str, payload: Value) -> Result<Value, RpcError> {
        let exchange = async {
            let (reply, rx) = oneshot::channel();
            let frame = Frame {
                pattern: pattern.to_string(),
                payload,
                reply,
            };
            self.tx.send(frame).await.map_err(|_| unavailable())?;
            rx.await.map_err(|_| unavailable())
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => {
                tracing::warn!(pattern, timeout_ms = self.timeout.as_millis() as u64, "Upstream call timed out");
                Err(RpcError::new(ErrorKind::UpstreamTimeout, "upstream timed out"))
            }
            Ok(Err(err)) => {
                tracing::error!(pattern, "Upstream channel closed");
                Err(err)
            }
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(raw))) => Err(RpcError::coerce(&raw)),
        }
    }
}

/// Answer frames from `rx` with `dispatcher` until every sender is dropped.
pub async fn serve<R>(dispatcher: Arc<Dispatcher<R>>, mut rx: mpsc::Receiver<Frame>)
where
    R: AccountRepository + 'static,
{
    while let Some(frame) = rx.recv().await {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let reply = dispatcher
                .dispatch(&frame.pattern, frame.payload)
                .await
                .map_err(|err| {
                    serde_json::to_value(&err).unwrap_or_else(
                        |_| json!({ "statusCode": 500, "message": "internal error" }),
                    )
                });
            // The caller may already have given up.
            let _ = frame.reply.send(reply);
        });
    }
    tracing::info!("Upstream channel closed; serve loop exiting");
}
