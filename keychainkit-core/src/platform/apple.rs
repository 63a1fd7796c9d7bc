//! Keychain Services gateway.
//!
//! Queries are translated attribute by attribute into a `CFDictionary`.
//! Attribute keys and enumerated values are the raw strings behind the
//! `kSec*` constants, which Keychain Services compares by value.

use std::ptr;

use core_foundation::array::CFArray;
use core_foundation::base::{CFType, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::bundle::CFBundle;
use core_foundation::data::CFData;
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_foundation_sys::base::{CFCopyTypeIDDescription, CFOptionFlags, CFTypeRef};
use core_foundation_sys::bundle::CFBundleGetIdentifier;
use security_framework::access_control::{ProtectionMode, SecAccessControl};
use security_framework_sys::keychain_item::{
    SecItemAdd, SecItemCopyMatching, SecItemDelete, SecItemUpdate,
};

use crate::access_control::AccessControl;
use crate::config::Accessibility;
use crate::error::{KeychainError, KeychainResult};
use crate::gateway::{RawResult, SecureStoreGateway};
use crate::query::{AttributeValue, Query};
use crate::status::Status;

/// [`SecureStoreGateway`] backed by the system keychain.
///
/// Each method issues exactly one `SecItem*` call. Items are scoped by the
/// caller's entitlements; a missing keychain-access-groups entitlement
/// surfaces as [`Status::MISSING_ENTITLEMENT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AppleKeychain;

impl AppleKeychain {
    /// Creates the gateway.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

const fn protection_mode(protection: Accessibility) -> ProtectionMode {
    match protection {
        Accessibility::WhenUnlocked => ProtectionMode::AccessibleWhenUnlocked,
        Accessibility::WhenUnlockedThisDeviceOnly => {
            ProtectionMode::AccessibleWhenUnlockedThisDeviceOnly
        }
        Accessibility::AfterFirstUnlock => ProtectionMode::AccessibleAfterFirstUnlock,
        Accessibility::AfterFirstUnlockThisDeviceOnly => {
            ProtectionMode::AccessibleAfterFirstUnlockThisDeviceOnly
        }
        Accessibility::WhenPasscodeSetThisDeviceOnly => {
            ProtectionMode::AccessibleWhenPasscodeSetThisDeviceOnly
        }
    }
}

/// Creates the native `SecAccessControl` for `control`.
fn native_access_control(control: &AccessControl) -> KeychainResult<SecAccessControl> {
    let flags = CFOptionFlags::try_from(control.flags().bits()).map_err(|_| {
        KeychainError::AccessControlFailure(format!(
            "flags {:?} exceed the native width",
            control.flags()
        ))
    })?;
    SecAccessControl::create_with_protection(Some(protection_mode(control.protection())), flags)
        .map_err(|error| {
            KeychainError::AccessControlFailure(format!(
                "system rejected {:?}: {error}",
                control.flags()
            ))
        })
}

fn to_cf(value: &AttributeValue) -> Option<CFType> {
    Some(match value {
        AttributeValue::String(text) => CFString::new(text).into_CFType(),
        AttributeValue::Data(bytes) => CFData::from_buffer(bytes).into_CFType(),
        AttributeValue::Bool(flag) => CFBoolean::from(*flag).into_CFType(),
        AttributeValue::Integer(number) => CFNumber::from(*number).into_CFType(),
        AttributeValue::AccessControl(control) => {
            native_access_control(control).ok()?.into_CFType()
        }
        AttributeValue::AuthContext(context) => {
            let raw: CFTypeRef = context.as_raw();
            if raw.is_null() {
                return None;
            }
            // SAFETY: the caller keeps the context alive while queries that
            // reference it are submitted; wrapping under the get rule retains it.
            unsafe { CFType::wrap_under_get_rule(raw) }
        }
    })
}

/// Translates `query`, or `None` if an attribute has no native form.
fn to_dictionary(query: &Query) -> Option<CFDictionary<CFString, CFType>> {
    let pairs = query
        .iter()
        .map(|(key, value)| Some((CFString::new(key), to_cf(value)?)))
        .collect::<Option<Vec<_>>>()?;
    Some(CFDictionary::from_CFType_pairs(&pairs))
}

fn type_name(value: &CFType) -> String {
    // SAFETY: returns a new string under the create rule.
    unsafe { CFString::wrap_under_create_rule(CFCopyTypeIDDescription(value.type_of())) }
        .to_string()
}

/// Attribute values with no [`AttributeValue`] form (dates, nested objects)
/// are dropped.
fn attribute_value(value: &CFType) -> Option<AttributeValue> {
    if let Some(text) = value.downcast::<CFString>() {
        Some(AttributeValue::String(text.to_string()))
    } else if let Some(data) = value.downcast::<CFData>() {
        Some(AttributeValue::Data(data.bytes().to_vec()))
    } else if let Some(flag) = value.downcast::<CFBoolean>() {
        Some(AttributeValue::Bool(flag.into()))
    } else {
        value
            .downcast::<CFNumber>()
            .and_then(|number| number.to_i64())
            .map(AttributeValue::Integer)
    }
}

fn from_cf(value: &CFType) -> RawResult {
    if let Some(data) = value.downcast::<CFData>() {
        return RawResult::Data(data.bytes().to_vec());
    }
    if let Some(dictionary) = value.downcast::<CFDictionary>() {
        let (keys, values) = dictionary.get_keys_and_values();
        let attributes = keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| {
                // SAFETY: entries are borrowed from `dictionary`, which is
                // alive; the get rule retains them.
                let (key, value) = unsafe {
                    (
                        CFType::wrap_under_get_rule(key),
                        CFType::wrap_under_get_rule(value),
                    )
                };
                let key = key.downcast::<CFString>()?.to_string();
                Some((key, attribute_value(&value)?))
            })
            .collect();
        return RawResult::Attributes(attributes);
    }
    if let Some(array) = value.downcast::<CFArray>() {
        let entries = array
            .iter()
            .map(|entry| {
                // SAFETY: borrowed from `array`, which is alive.
                from_cf(&unsafe { CFType::wrap_under_get_rule(*entry) })
            })
            .collect();
        return RawResult::Array(entries);
    }
    RawResult::Other(type_name(value))
}

impl SecureStoreGateway for AppleKeychain {
    fn add(&self, query: &Query) -> Status {
        let Some(attributes) = to_dictionary(query) else {
            return Status::PARAM;
        };
        // SAFETY: the dictionary outlives the call; no result is requested.
        Status(unsafe { SecItemAdd(attributes.as_concrete_TypeRef(), ptr::null_mut()) })
    }

    fn copy_matching(&self, query: &Query) -> (Status, Option<RawResult>) {
        let Some(search) = to_dictionary(query) else {
            return (Status::PARAM, None);
        };
        let mut result: CFTypeRef = ptr::null();
        // SAFETY: the dictionary outlives the call; `result` is returned
        // under the create rule.
        let status = Status(unsafe { SecItemCopyMatching(search.as_concrete_TypeRef(), &mut result) });
        if result.is_null() {
            return (status, None);
        }
        // SAFETY: non-null result returned under the create rule.
        let value = unsafe { CFType::wrap_under_create_rule(result) };
        (status, Some(from_cf(&value)))
    }

    fn update(&self, query: &Query, changes: &Query) -> Status {
        let (Some(search), Some(changes)) = (to_dictionary(query), to_dictionary(changes)) else {
            return Status::PARAM;
        };
        // SAFETY: both dictionaries outlive the call.
        Status(unsafe {
            SecItemUpdate(search.as_concrete_TypeRef(), changes.as_concrete_TypeRef())
        })
    }

    fn delete(&self, query: &Query) -> Status {
        let Some(search) = to_dictionary(query) else {
            return Status::PARAM;
        };
        // SAFETY: the dictionary outlives the call.
        Status(unsafe { SecItemDelete(search.as_concrete_TypeRef()) })
    }

    fn prepare_access_control(&self, control: &AccessControl) -> KeychainResult<()> {
        native_access_control(control).map(drop)
    }
}

/// Bundle identifier of the main bundle, if the process has one.
pub(crate) fn bundle_identifier() -> Option<String> {
    let bundle = CFBundle::main_bundle();
    // SAFETY: the identifier is borrowed from the main bundle (get rule).
    let identifier = unsafe { CFBundleGetIdentifier(bundle.as_concrete_TypeRef()) };
    if identifier.is_null() {
        return None;
    }
    // SAFETY: non-null string under the get rule.
    let identifier = unsafe { CFString::wrap_under_get_rule(identifier) }.to_string();
    (!identifier.is_empty()).then_some(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::AccessControlFlags;
    use crate::query::attr;

    #[test]
    fn test_dictionary_translation() {
        let mut query = Query::new();
        query.insert(attr::CLASS, attr::CLASS_GENERIC_PASSWORD);
        query.insert(attr::ACCOUNT, "k1");
        query.insert(attr::VALUE_DATA, b"v".as_slice());
        query.insert(attr::SYNCHRONIZABLE, true);
        let dictionary = to_dictionary(&query).expect("translatable");
        assert_eq!(dictionary.len(), 4);

        match from_cf(&dictionary.into_CFType()) {
            RawResult::Attributes(attributes) => assert_eq!(attributes, query),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_access_control_is_created_natively() {
        let control = AccessControl::new(
            Accessibility::WhenPasscodeSetThisDeviceOnly,
            AccessControlFlags::USER_PRESENCE,
        )
        .expect("valid access control");
        assert_eq!(AppleKeychain::new().prepare_access_control(&control), Ok(()));

        let mut query = Query::new();
        query.insert(attr::ACCESS_CONTROL, AttributeValue::AccessControl(control));
        assert!(to_dictionary(&query).is_some());
    }

    #[test]
    fn test_unknown_shapes_are_named() {
        let value = CFNumber::from(7_i64).into_CFType();
        assert!(matches!(from_cf(&value), RawResult::Other(_)));
    }
}
