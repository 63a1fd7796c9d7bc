//! Asynchronous store operations executed on a serial worker.
//!
//! Every call is enqueued synchronously, before the returned future is first
//! polled, so completion order always equals call order regardless of how
//! the futures are awaited.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use zeroize::Zeroizing;

use crate::error::{KeychainError, KeychainResult};
use crate::gateway::SecureStoreGateway;
use crate::store::SecureStore;

const WORKER_NAME: &str = "keychainkit-serial";
const QUEUE_STOPPED: &str = "serial queue stopped before the operation completed";

type Job<G> = Box<dyn FnOnce(&SecureStore<G>) + Send + 'static>;

/// [`SecureStore`] operations run in submission order on a dedicated thread.
///
/// The worker owns the store. Dropping the façade closes the queue; work
/// already submitted still runs to completion.
///
/// ```rust
/// use keychainkit_core::{AsyncSecureStore, Configuration, MemoryKeychain, SecureStore};
///
/// # tokio_test::block_on(async {
/// let config = Configuration::builder().service("com.example.app").build()?;
/// let store = AsyncSecureStore::new(SecureStore::new(config, MemoryKeychain::new()))?;
///
/// let write = store.set_text("token", "s3cr3t");
/// let read = store.get_text("token");
/// write.await?;
/// assert_eq!(read.await?, "s3cr3t");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AsyncSecureStore<G> {
    sender: mpsc::UnboundedSender<Job<G>>,
}

impl<G> std::fmt::Debug for AsyncSecureStore<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSecureStore")
            .field("closed", &self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

impl<G: SecureStoreGateway + 'static> AsyncSecureStore<G> {
    /// Moves `store` onto a new serial worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Unknown`] if the worker thread cannot be
    /// spawned.
    pub fn new(store: SecureStore<G>) -> KeychainResult<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job<G>>();
        thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    job(&store);
                }
                log::trace!("serial queue drained: service={}", store.configuration().service());
            })
            .map_err(|err| KeychainError::Unknown(format!("failed to spawn {WORKER_NAME}: {err}")))?;
        Ok(Self { sender })
    }

    fn submit<T, F>(&self, operation: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&SecureStore<G>) -> KeychainResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job<G> = Box::new(move |store| {
            // The caller may have dropped the future; the operation still ran.
            let _ = tx.send(operation(store));
        });
        if self.sender.send(job).is_err() {
            log::warn!("{WORKER_NAME} is gone, operation dropped");
        }
        Pending { receiver: rx }
    }

    /// Queues [`SecureStore::set_bytes`].
    pub fn set_bytes(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Pending<()> {
        let key = key.into();
        let value = Zeroizing::new(value.into());
        self.submit(move |store| store.set_bytes(&key, &value))
    }

    /// Queues [`SecureStore::set_text`].
    pub fn set_text(&self, key: impl Into<String>, value: impl Into<String>) -> Pending<()> {
        let key = key.into();
        let value = Zeroizing::new(value.into());
        self.submit(move |store| store.set_text(&key, &value))
    }

    /// Queues [`SecureStore::get_bytes`].
    pub fn get_bytes(&self, key: impl Into<String>) -> Pending<Vec<u8>> {
        let key = key.into();
        self.submit(move |store| store.get_bytes(&key))
    }

    /// Queues [`SecureStore::get_text`].
    pub fn get_text(&self, key: impl Into<String>) -> Pending<String> {
        let key = key.into();
        self.submit(move |store| store.get_text(&key))
    }

    /// Queues [`SecureStore::delete`].
    pub fn delete(&self, key: impl Into<String>) -> Pending<()> {
        let key = key.into();
        self.submit(move |store| store.delete(&key))
    }

    /// Queues [`SecureStore::delete_all`].
    pub fn delete_all(&self) -> Pending<()> {
        self.submit(SecureStore::delete_all)
    }

    /// Queues [`SecureStore::has`].
    pub fn has(&self, key: impl Into<String>) -> Pending<bool> {
        let key = key.into();
        self.submit(move |store| store.has(&key))
    }

    /// Queues [`SecureStore::list_keys`].
    pub fn list_keys(&self) -> Pending<Vec<String>> {
        self.submit(SecureStore::list_keys)
    }
}

/// Completion of a queued operation.
///
/// The operation is already enqueued when this value is created; awaiting it
/// only observes the result.
#[derive(Debug)]
#[must_use = "the operation runs regardless, but its result is only observable by awaiting"]
pub struct Pending<T> {
    receiver: oneshot::Receiver<KeychainResult<T>>,
}

impl<T> Future for Pending<T> {
    type Output = KeychainResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| {
                received.unwrap_or_else(|_| Err(KeychainError::Unknown(QUEUE_STOPPED.to_string())))
            })
    }
}
