//! A request-coalescing loader.
//!
//! Every `load` issued before the current scheduling opportunity ends joins
//! one pending batch; the batch function then runs once with all keys, in
//! request order, and each caller receives the result at its own position.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::oneshot;
use tonic::{Code, Status};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("batch call failed with {code:?}: {message}")]
    Batch { code: Code, message: String },

    #[error("no result for key {0}")]
    MissingKey(String),

    #[error("loader went away before the batch resolved")]
    Cancelled,
}

impl From<&Status> for LoadError {
    fn from(status: &Status) -> Self {
        LoadError::Batch {
            code:    status.code(),
            message: status.message().to_string(),
        }
    }
}

impl From<LoadError> for Status {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::Batch { code, message } => Status::new(code, message),
            LoadError::MissingKey(_) => Status::not_found(error.to_string()),
            LoadError::Cancelled => Status::cancelled(error.to_string()),
        }
    }
}

/// Per-key outcomes of one batch, aligned with the keys it was given.
pub type BatchResult<V> = Result<Vec<Result<V, LoadError>>, Status>;

type BatchFn<K, V> = Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, BatchResult<V>> + Send + Sync>;

struct Pending<K, V> {
    keys:    Vec<K>,
    waiters: Vec<oneshot::Sender<Result<V, LoadError>>>,
}

type Queue<K, V> = Arc<Mutex<Option<Pending<K, V>>>>;

pub struct DataLoader<K, V> {
    batch_fn: BatchFn<K, V>,
    queue:    Queue<K, V>,
}

impl<K, V> DataLoader<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    pub fn new<F, Fut>(batch_fn: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchResult<V>> + Send + 'static,
    {
        Self {
            batch_fn: Arc::new(move |keys| batch_fn(keys).boxed()),
            queue:    Arc::new(Mutex::new(None)),
        }
    }

    pub async fn load(&self, key: K) -> Result<V, LoadError> {
        let (tx, rx) = oneshot::channel();
        if self.enqueue(key, tx) {
            self.schedule();
        }
        rx.await.unwrap_or(Err(LoadError::Cancelled))
    }

    /// Returns true when this key opened a new batch.
    fn enqueue(&self, key: K, waiter: oneshot::Sender<Result<V, LoadError>>) -> bool {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        match queue.as_mut() {
            Some(pending) => {
                pending.keys.push(key);
                pending.waiters.push(waiter);
                false
            }
            None => {
                *queue = Some(Pending {
                    keys:    vec![key],
                    waiters: vec![waiter],
                });
                true
            }
        }
    }

    fn schedule(&self) {
        let queue = Arc::clone(&self.queue);
        let batch_fn = Arc::clone(&self.batch_fn);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let Some(Pending { keys, waiters }) = take(&queue) else {
                return;
            };
            tracing::trace!(keys = keys.len(), "dispatching batch");

            match batch_fn(keys).await {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for (position, waiter) in waiters.into_iter().enumerate() {
                        let result = results
                            .next()
                            .unwrap_or_else(|| Err(LoadError::MissingKey(format!("#{position}"))));
                        let _ = waiter.send(result);
                    }
                }
                Err(status) => {
                    tracing::debug!(code = ?status.code(), "batch call failed");
                    for waiter in waiters {
                        let _ = waiter.send(Err(LoadError::from(&status)));
                    }
                }
            }
        });
    }
}

fn take<K, V>(queue: &Mutex<Option<Pending<K, V>>>) -> Option<Pending<K, V>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner).take()
}
