#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! Secure credential storage on top of the platform keychain.
//!
//! A [`SecureStore`] turns an immutable [`Configuration`] plus per-call
//! arguments into keychain queries, submits them through a
//! [`SecureStoreGateway`] and decodes the results into typed values or a
//! [`KeychainError`]. [`AsyncSecureStore`] runs the same operations in call
//! order on a serial worker, and [`KeychainStore`] exposes both to host
//! languages through `UniFFI`.
//!
//! ```rust
//! use keychainkit_core::{Accessibility, Configuration, KeychainError, MemoryKeychain, SecureStore};
//!
//! let config = Configuration::builder()
//!     .service("com.example.app")
//!     .accessibility(Accessibility::AfterFirstUnlockThisDeviceOnly)
//!     .build()?;
//! let store = SecureStore::new(config, MemoryKeychain::new());
//!
//! store.set_bytes("device-key", &[0x2a; 32])?;
//! assert!(store.has("device-key")?);
//! store.delete("device-key")?;
//! assert_eq!(store.get_bytes("device-key"), Err(KeychainError::ItemNotFound));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod access_control;
pub mod bridge;
pub mod config;
pub mod decode;
pub mod error;
pub mod gateway;
pub mod logger;
pub mod memory;
pub mod platform;
pub mod query;
pub mod queue;
pub mod status;
pub mod store;

pub use access_control::{AccessControl, AccessControlFlags};
pub use bridge::{KeychainStore, StoreOptions};
pub use config::{Accessibility, AuthContextRef, Configuration, ConfigurationBuilder};
pub use error::{ConfigError, KeychainError, KeychainResult};
pub use gateway::{RawResult, SecureStoreGateway};
pub use memory::MemoryKeychain;
#[cfg(target_vendor = "apple")]
pub use platform::apple::AppleKeychain;
pub use platform::Platform;
pub use query::{AttributeValue, Query, QueryBuilder, UpdateQuery};
pub use queue::{AsyncSecureStore, Pending};
pub use status::Status;
pub use store::SecureStore;

uniffi::setup_scaffolding!("keychainkit_core");
