//! Blocking façade over a secure store.

use crate::config::Configuration;
use crate::decode;
use crate::error::{KeychainError, KeychainResult};
use crate::gateway::SecureStoreGateway;
use crate::platform::Platform;
use crate::query::{attr, AttributeValue, QueryBuilder};

/// Get/set/delete/enumerate operations on named secrets.
///
/// Each operation builds one query from the immutable configuration,
/// submits it to the gateway and decodes the result. The only second call
/// is the update issued when an add reports a duplicate item.
///
/// # Example
///
/// ```rust
/// use keychainkit_core::{Configuration, MemoryKeychain, SecureStore};
///
/// let config = Configuration::builder().service("com.example.app").build()?;
/// let store = SecureStore::new(config, MemoryKeychain::new());
///
/// store.set_text("token", "s3cr3t")?;
/// assert_eq!(store.get_text("token")?, "s3cr3t");
/// assert_eq!(store.list_keys()?, vec!["token".to_string()]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct SecureStore<G> {
    config: Configuration,
    platform: Platform,
    gateway: G,
}

impl<G: SecureStoreGateway> SecureStore<G> {
    /// Creates a store building queries for the current platform.
    pub fn new(config: Configuration, gateway: G) -> Self {
        Self::with_platform(config, gateway, Platform::current())
    }

    /// Creates a store building queries for `platform`.
    pub const fn with_platform(config: Configuration, gateway: G, platform: Platform) -> Self {
        Self {
            config,
            platform,
            gateway,
        }
    }

    /// The configuration every query is derived from.
    pub const fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// The platform queries are shaped for.
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// The underlying gateway.
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Query builder for this store.
    pub const fn queries(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.config, self.platform)
    }

    /// Stores `value` under `key`, replacing any existing value.
    ///
    /// Tries an add first; if the store reports a duplicate, updates the
    /// existing item once. A failure of that update, including a second
    /// conflict, is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::AccessControlFailure`] if the configured
    /// access control is rejected, or the translated store status.
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> KeychainResult<()> {
        let queries = self.queries();
        let insert = queries.insert(key, value)?;
        if let Some(AttributeValue::AccessControl(control)) = insert.get(attr::ACCESS_CONTROL) {
            self.gateway.prepare_access_control(control)?;
        }
        log::debug!(
            "keychain add: service={} platform={:?}",
            self.config.service(),
            self.platform
        );
        match self.gateway.add(&insert).check() {
            Err(KeychainError::DuplicateItem) => {
                let update = queries.update(key, value)?;
                log::debug!(
                    "keychain update after duplicate add: service={}",
                    self.config.service()
                );
                self.gateway.update(&update.search, &update.changes).check()
            }
            other => other,
        }
    }

    /// Stores UTF-8 `value` under `key`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Same as [`SecureStore::set_bytes`].
    pub fn set_text(&self, key: &str, value: &str) -> KeychainResult<()> {
        self.set_bytes(key, value.as_bytes())
    }

    /// Reads the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::ItemNotFound`] if no item exists,
    /// [`KeychainError::InvalidData`] if the store returns something other
    /// than binary data, or the translated store status.
    pub fn get_bytes(&self, key: &str) -> KeychainResult<Vec<u8>> {
        log::trace!("keychain copy one: service={}", self.config.service());
        let (status, result) = self.gateway.copy_matching(&self.queries().fetch_one(key));
        decode::bytes(status, result)
    }

    /// Reads the UTF-8 text stored under `key`.
    ///
    /// # Errors
    ///
    /// Same as [`SecureStore::get_bytes`], plus [`KeychainError::InvalidData`]
    /// if the payload is not valid UTF-8.
    pub fn get_text(&self, key: &str) -> KeychainResult<String> {
        log::trace!("keychain copy one: service={}", self.config.service());
        let (status, result) = self.gateway.copy_matching(&self.queries().fetch_one(key));
        decode::text(status, result)
    }

    /// Removes the item stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::ItemNotFound`] if no item exists, or the
    /// translated store status.
    pub fn delete(&self, key: &str) -> KeychainResult<()> {
        log::debug!("keychain delete: service={}", self.config.service());
        self.gateway.delete(&self.queries().delete_one(key)).check()
    }

    /// Removes every item in this store's scope.
    ///
    /// # Errors
    ///
    /// Returns the translated store status, including
    /// [`KeychainError::ItemNotFound`] when the scope is already empty.
    pub fn delete_all(&self) -> KeychainResult<()> {
        log::debug!(
            "keychain delete all: service={} platform={:?}",
            self.config.service(),
            self.platform
        );
        self.gateway.delete(&self.queries().delete_all()).check()
    }

    /// Returns whether an item exists under `key`.
    ///
    /// # Errors
    ///
    /// Returns the translated store status for any failure other than
    /// "item not found", which yields `false`.
    pub fn has(&self, key: &str) -> KeychainResult<bool> {
        log::trace!("keychain exists: service={}", self.config.service());
        let (status, _) = self.gateway.copy_matching(&self.queries().exists(key));
        match status.check() {
            Ok(()) => Ok(true),
            Err(KeychainError::ItemNotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Lists the keys of every item in this store's scope.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::InvalidData`] if the store returns an
    /// unexpected shape, or the translated store status. An empty scope is
    /// not an error.
    pub fn list_keys(&self) -> KeychainResult<Vec<String>> {
        log::trace!(
            "keychain copy all: service={} platform={:?}",
            self.config.service(),
            self.platform
        );
        let (status, result) = self.gateway.copy_matching(&self.queries().fetch_all());
        decode::keys(status, result)
    }
}
