//! Reconnect policy for server-streaming calls.
//!
//! A stream that fails with a transient status is reopened after a fixed
//! delay; any other failure is delivered to the consumer and ends the stream.
//! Dropping the returned stream cancels any pending reconnect.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Status};

pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// Status codes that trigger a reconnect.
pub const TRANSIENT_CODES: [Code; 8] = [
    Code::Unknown,
    Code::DeadlineExceeded,
    Code::ResourceExhausted,
    Code::FailedPrecondition,
    Code::Aborted,
    Code::Internal,
    Code::Unavailable,
    Code::DataLoss,
];

/// Lifecycle of a retrying stream. It starts in `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    Retrying,
    Completed,
    Failed,
}

type Observer = Arc<dyn Fn(StreamState) + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    pub delay:     Duration,
    pub transient: Vec<Code>,
    observer:      Option<Observer>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay:     DEFAULT_DELAY,
            transient: TRANSIENT_CODES.to_vec(),
            observer:  None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("delay", &self.delay)
            .field("transient", &self.transient)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl RetryPolicy {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Registers a callback invoked on every state transition.
    pub fn with_observer(mut self, observer: impl Fn(StreamState) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn is_transient(&self, code: Code) -> bool {
        self.transient.contains(&code)
    }

    fn transition(&self, state: StreamState) {
        tracing::trace!(?state, "stream state");
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }
}

/// The consumer side of a retried stream. Dropping it stops the driver task.
pub struct RetryingStream<T> {
    inner:  ReceiverStream<Result<T, Status>>,
    driver: JoinHandle<()>,
}

impl<T> Stream for RetryingStream<T> {
    type Item = Result<T, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> Drop for RetryingStream<T> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Drives `connect` under `policy`, reopening the upstream after transient
/// failures. Must be called from within a tokio runtime.
pub fn retrying<T, F>(connect: F, policy: RetryPolicy) -> RetryingStream<T>
where
    T: Send + 'static,
    F: Fn() -> BoxStream<'static, Result<T, Status>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(drive(connect, policy, tx));
    RetryingStream {
        inner: ReceiverStream::new(rx),
        driver,
    }
}

async fn drive<T, F>(connect: F, policy: RetryPolicy, tx: mpsc::Sender<Result<T, Status>>)
where
    T: Send + 'static,
    F: Fn() -> BoxStream<'static, Result<T, Status>> + Send + 'static,
{
    let mut reconnecting = false;
    loop {
        if reconnecting {
            policy.transition(StreamState::Connecting);
        }
        let mut upstream = connect();
        let mut streaming = false;

        let outcome = loop {
            tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("stream consumer went away");
                    return;
                }
                next = upstream.next() => match next {
                    Some(Ok(message)) => {
                        if !streaming {
                            streaming = true;
                            policy.transition(StreamState::Streaming);
                        }
                        if tx.send(Ok(message)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(status)) => break Some(status),
                    None => break None,
                },
            }
        };
        drop(upstream);

        match outcome {
            None => {
                policy.transition(StreamState::Completed);
                return;
            }
            Some(status) if policy.is_transient(status.code()) => {
                tracing::warn!(
                    code = ?status.code(),
                    message = status.message(),
                    delay = ?policy.delay,
                    "transient stream failure, reconnecting"
                );
                policy.transition(StreamState::Retrying);
                tokio::select! {
                    _ = tx.closed() => return,
                    _ = tokio::time::sleep(policy.delay) => {}
                }
                reconnecting = true;
            }
            Some(status) => {
                tracing::debug!(code = ?status.code(), "stream failed");
                policy.transition(StreamState::Failed);
                let _ = tx.send(Err(status)).await;
                return;
            }
        }
    }
}
