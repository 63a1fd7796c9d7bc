//! Foreign-language surface.
//!
//! Exposes a simplified store to host languages through `UniFFI`. The
//! options record always carries a concrete accessibility; leaving it unset
//! to defer to the store's own default is only possible through
//! [`crate::ConfigurationBuilder`].

use std::sync::Arc;

use crate::config::{Accessibility, Configuration};
use crate::error::KeychainError;
use crate::gateway::SecureStoreGateway;
use crate::memory::MemoryKeychain;
use crate::platform::Platform;
use crate::queue::AsyncSecureStore;
use crate::store::SecureStore;

/// Store settings accepted from host languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct StoreOptions {
    /// Service name. `None` uses the application identifier.
    #[uniffi(default = None)]
    pub service: Option<String>,
    /// Keychain access group shared between applications.
    #[uniffi(default = None)]
    pub access_group: Option<String>,
    /// Protection class for newly written items. Defaults to
    /// [`Accessibility::AfterFirstUnlock`].
    pub accessibility: Accessibility,
    /// Whether items synchronize through the user's cloud keychain.
    #[uniffi(default = false)]
    pub synchronizable: bool,
}

impl TryFrom<StoreOptions> for Configuration {
    type Error = KeychainError;

    fn try_from(options: StoreOptions) -> Result<Self, Self::Error> {
        let mut builder = Self::builder()
            .accessibility(options.accessibility)
            .synchronizable(options.synchronizable);
        if let Some(service) = options.service {
            builder = builder.service(service);
        }
        if let Some(access_group) = options.access_group {
            builder = builder.access_group(access_group);
        }
        Ok(builder.build()?)
    }
}

type SharedGateway = Arc<dyn SecureStoreGateway>;

/// Secure store handle for host languages.
///
/// Synchronous methods block the calling thread. The `*_async` variants run
/// on a serial worker owned by the handle. An async export submits its job
/// when its future is first polled, so queued work runs in the order the
/// host starts awaiting the calls; a host that needs call-time ordering
/// awaits each call before issuing the next or uses [`AsyncSecureStore`].
#[derive(uniffi::Object)]
pub struct KeychainStore {
    store: SecureStore<SharedGateway>,
    queue: AsyncSecureStore<SharedGateway>,
}

impl std::fmt::Debug for KeychainStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainStore")
            .field("service", &self.store.configuration().service())
            .finish_non_exhaustive()
    }
}

impl KeychainStore {
    /// Creates a handle over an arbitrary gateway.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Unknown`] if the options do not resolve to a
    /// valid configuration or the serial worker cannot be started.
    pub fn with_gateway(
        options: StoreOptions,
        gateway: SharedGateway,
        platform: Platform,
    ) -> Result<Self, KeychainError> {
        let config = Configuration::try_from(options)?;
        let queue = AsyncSecureStore::new(SecureStore::with_platform(
            config.clone(),
            Arc::clone(&gateway),
            platform,
        ))?;
        Ok(Self {
            store: SecureStore::with_platform(config, gateway, platform),
            queue,
        })
    }
}

#[cfg(target_vendor = "apple")]
#[uniffi::export]
impl KeychainStore {
    /// Opens the system keychain.
    ///
    /// # Errors
    ///
    /// See [`KeychainStore::with_gateway`].
    #[uniffi::constructor]
    pub fn new(options: StoreOptions) -> Result<Self, KeychainError> {
        Self::with_gateway(
            options,
            Arc::new(crate::platform::apple::AppleKeychain::new()),
            Platform::current(),
        )
    }
}

#[uniffi::export]
impl KeychainStore {
    /// Opens a process-local store that is discarded with the handle.
    /// Intended for previews and tests on hosts without a keychain.
    ///
    /// # Errors
    ///
    /// See [`KeychainStore::with_gateway`].
    #[uniffi::constructor]
    pub fn in_memory(options: StoreOptions) -> Result<Self, KeychainError> {
        Self::with_gateway(
            options,
            Arc::new(MemoryKeychain::new()),
            Platform::current(),
        )
    }

    /// Resolved service name.
    #[must_use]
    pub fn service(&self) -> String {
        self.store.configuration().service().to_owned()
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns the store failure, see [`SecureStore::set_text`].
    pub fn set_string(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.store.set_text(key, value)
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns the store failure, see [`SecureStore::set_bytes`].
    pub fn set_data(&self, key: &str, value: &[u8]) -> Result<(), KeychainError> {
        self.store.set_bytes(key, value)
    }

    /// Reads the text stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::ItemNotFound`] if nothing is stored.
    pub fn get_string(&self, key: &str) -> Result<String, KeychainError> {
        self.store.get_text(key)
    }

    /// Reads the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::ItemNotFound`] if nothing is stored.
    pub fn get_data(&self, key: &str) -> Result<Vec<u8>, KeychainError> {
        self.store.get_bytes(key)
    }

    /// Removes the item stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::ItemNotFound`] if nothing is stored.
    pub fn delete(&self, key: &str) -> Result<(), KeychainError> {
        self.store.delete(key)
    }

    /// Removes every item of this service.
    ///
    /// # Errors
    ///
    /// Returns the store failure, see [`SecureStore::delete_all`].
    pub fn delete_all(&self) -> Result<(), KeychainError> {
        self.store.delete_all()
    }

    /// Returns whether an item is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns any store failure other than "item not found".
    pub fn has_item(&self, key: &str) -> Result<bool, KeychainError> {
        self.store.has(key)
    }

    /// Keys of every item of this service.
    ///
    /// # Errors
    ///
    /// Returns the store failure, see [`SecureStore::list_keys`].
    pub fn all_keys(&self) -> Result<Vec<String>, KeychainError> {
        self.store.list_keys()
    }
}

/// Async exports. Each job is queued on first poll of its future.
#[uniffi::export(async_runtime = "tokio")]
impl KeychainStore {
    /// Queued [`KeychainStore::set_string`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn set_string_async(&self, key: String, value: String) -> Result<(), KeychainError> {
        self.queue.set_text(key, value).await
    }

    /// Queued [`KeychainStore::set_data`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn set_data_async(&self, key: String, value: Vec<u8>) -> Result<(), KeychainError> {
        self.queue.set_bytes(key, value).await
    }

    /// Queued [`KeychainStore::get_string`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn get_string_async(&self, key: String) -> Result<String, KeychainError> {
        self.queue.get_text(key).await
    }

    /// Queued [`KeychainStore::get_data`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn get_data_async(&self, key: String) -> Result<Vec<u8>, KeychainError> {
        self.queue.get_bytes(key).await
    }

    /// Queued [`KeychainStore::delete`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn delete_async(&self, key: String) -> Result<(), KeychainError> {
        self.queue.delete(key).await
    }

    /// Queued [`KeychainStore::delete_all`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn delete_all_async(&self) -> Result<(), KeychainError> {
        self.queue.delete_all().await
    }

    /// Queued [`KeychainStore::has_item`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn has_item_async(&self, key: String) -> Result<bool, KeychainError> {
        self.queue.has(key).await
    }

    /// Queued [`KeychainStore::all_keys`].
    ///
    /// # Errors
    ///
    /// Same as the synchronous form.
    pub async fn all_keys_async(&self) -> Result<Vec<String>, KeychainError> {
        self.queue.list_keys().await
    }
}
