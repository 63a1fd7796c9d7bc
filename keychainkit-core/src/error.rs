//! Error types.

use thiserror::Error;

/// Result type for secure store operations.
pub type KeychainResult<T, E = KeychainError> = std::result::Result<T, E>;

/// Errors surfaced by secure store operations.
///
/// The set is closed: every native status and every decode mismatch maps to
/// exactly one of these variants.
#[derive(Debug, Error, PartialEq, Eq, uniffi::Error)]
#[uniffi(flat_error)]
pub enum KeychainError {
    /// The store holds no item matching the query.
    #[error("item_not_found")]
    ItemNotFound,
    /// An item with the same identity already exists.
    #[error("duplicate_item")]
    DuplicateItem,
    /// The payload could not be decoded to the requested type.
    #[error("invalid_data: {0}")]
    InvalidData(String),
    /// The access-control object could not be constructed.
    #[error("access_control_failure: {0}")]
    AccessControlFailure(String),
    /// Any other native status or unexpected result shape.
    #[error("unknown: {0}")]
    Unknown(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for KeychainError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Unknown(error.reason)
    }
}

/// Errors raised while building a [`crate::Configuration`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The resolved service name is empty.
    #[error("service must not be empty")]
    EmptyService,
    /// No service was given and the application identifier could not be resolved.
    #[error("unable to resolve application identifier: {0}")]
    UnresolvedService(String),
    /// An extra attribute is not allowed or has an unsupported value.
    #[error("invalid extra attribute `{key}`: {reason}")]
    InvalidExtraAttribute {
        /// Attribute key as supplied.
        key: String,
        /// Why the attribute was rejected.
        reason: String,
    },
    /// The configuration document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<ConfigError> for KeychainError {
    fn from(error: ConfigError) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}
