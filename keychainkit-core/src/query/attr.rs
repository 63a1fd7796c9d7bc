//! Attribute keys and well-known values, spelled as the store expects them.
//!
//! The strings are the values of the corresponding `kSec*` constants, so a
//! [`crate::Query`] can be handed to Keychain Services without translation
//! and extra attributes can be supplied by their store names.

/// Item class (`kSecClass`).
pub const CLASS: &str = "class";
/// Generic password item class (`kSecClassGenericPassword`).
pub const CLASS_GENERIC_PASSWORD: &str = "genp";
/// Service the item is scoped to (`kSecAttrService`).
pub const SERVICE: &str = "svce";
/// Account identifier, i.e. the item key (`kSecAttrAccount`).
pub const ACCOUNT: &str = "acct";
/// Sharing scope (`kSecAttrAccessGroup`).
pub const ACCESS_GROUP: &str = "agrp";
/// Cross-device sync participation (`kSecAttrSynchronizable`).
pub const SYNCHRONIZABLE: &str = "sync";
/// Accessibility policy (`kSecAttrAccessible`).
pub const ACCESSIBLE: &str = "pdmn";
/// Access-control object (`kSecAttrAccessControl`).
pub const ACCESS_CONTROL: &str = "accc";
/// Authentication context handle (`kSecUseAuthenticationContext`).
pub const AUTHENTICATION_CONTEXT: &str = "u_AuthCtx";
/// Opt-in to the data-protection keychain on macOS (`kSecUseDataProtectionKeychain`).
pub const USE_DATA_PROTECTION_KEYCHAIN: &str = "nleg";
/// Item payload (`kSecValueData`).
pub const VALUE_DATA: &str = "v_Data";
/// Ask the store to return the payload (`kSecReturnData`).
pub const RETURN_DATA: &str = "r_Data";
/// Ask the store to return item attributes (`kSecReturnAttributes`).
pub const RETURN_ATTRIBUTES: &str = "r_Attributes";
/// Number of results to return (`kSecMatchLimit`).
pub const MATCH_LIMIT: &str = "m_Limit";
/// Match limit value: a single result (`kSecMatchLimitOne`).
pub const MATCH_LIMIT_ONE: &str = "m_LimitOne";
/// Match limit value: every result (`kSecMatchLimitAll`).
///
/// On macOS the same string is also set as a distinct boolean flag on
/// enumeration queries.
pub const MATCH_LIMIT_ALL: &str = "m_LimitAll";

/// Returns `true` for keys that steer the store (return shape, limits,
/// payload, auth context) rather than describe the item.
#[must_use]
pub fn is_control(key: &str) -> bool {
    key == USE_DATA_PROTECTION_KEYCHAIN
        || ["m_", "r_", "u_", "v_"]
            .iter()
            .any(|prefix| key.starts_with(prefix))
}
