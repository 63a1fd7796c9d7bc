//! The secure store the façade submits queries to.

use std::sync::Arc;

use crate::access_control::AccessControl;
use crate::error::KeychainResult;
use crate::query::Query;
use crate::status::Status;

/// Raw payload returned by [`SecureStoreGateway::copy_matching`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResult {
    /// Item payload (`r_Data` with a single match).
    Data(Vec<u8>),
    /// Item attributes (`r_Attributes` with a single match).
    Attributes(Query),
    /// One entry per match (`m_LimitAll`).
    Array(Vec<RawResult>),
    /// Anything the store returned that has no dedicated shape, by type name.
    Other(String),
}

impl RawResult {
    /// Short name of the shape, used in error messages.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            Self::Data(_) => "data".to_string(),
            Self::Attributes(_) => "attributes".to_string(),
            Self::Array(_) => "array".to_string(),
            Self::Other(type_name) => type_name.clone(),
        }
    }
}

/// Platform secure-credential store.
///
/// Implementations perform exactly one store call per method and report the
/// native status untranslated; translation happens in the façade.
///
/// Platform implementations:
/// - Apple: Keychain Services (`SecItemAdd`, `SecItemCopyMatching`,
///   `SecItemUpdate`, `SecItemDelete`), see `platform::apple`
/// - Tests and non-Apple hosts: [`crate::memory::MemoryKeychain`]
pub trait SecureStoreGateway: Send + Sync {
    /// Adds the item described by `query`.
    fn add(&self, query: &Query) -> Status;

    /// Looks up items matching `query`, returning the shape it asks for.
    fn copy_matching(&self, query: &Query) -> (Status, Option<RawResult>);

    /// Applies `changes` to the items matching `query`.
    fn update(&self, query: &Query, changes: &Query) -> Status;

    /// Deletes the items matching `query`.
    fn delete(&self, query: &Query) -> Status;

    /// Checks that the platform accepts `control` before an item carrying it
    /// is submitted. Stores without native access-control objects accept
    /// every combination that passed [`AccessControl::new`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::KeychainError::AccessControlFailure`] if the platform
    /// refuses to create the object.
    fn prepare_access_control(&self, _control: &AccessControl) -> KeychainResult<()> {
        Ok(())
    }
}

impl<T: SecureStoreGateway + ?Sized> SecureStoreGateway for Arc<T> {
    fn add(&self, query: &Query) -> Status {
        (**self).add(query)
    }

    fn copy_matching(&self, query: &Query) -> (Status, Option<RawResult>) {
        (**self).copy_matching(query)
    }

    fn update(&self, query: &Query, changes: &Query) -> Status {
        (**self).update(query, changes)
    }

    fn delete(&self, query: &Query) -> Status {
        (**self).delete(query)
    }

    fn prepare_access_control(&self, control: &AccessControl) -> KeychainResult<()> {
        (**self).prepare_access_control(control)
    }
}
