use crate::access_control::AccessControl;
use crate::config::{Accessibility, Configuration};
use crate::error::KeychainResult;
use crate::platform::Platform;

use super::{attr, AttributeValue, Query};

/// Search criteria and attribute changes for an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateQuery {
    /// Identifies the item to update.
    pub search: Query,
    /// Attributes written to the matched item.
    pub changes: Query,
}

/// Builds per-operation queries from a [`Configuration`].
///
/// Every method is a pure function of the configuration, the platform and
/// its arguments. Only the insert/update clause can fail, when access
/// control is configured with an unsupported flag combination.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    config: &'a Configuration,
    platform: Platform,
}

impl<'a> QueryBuilder<'a> {
    /// Creates a builder for `platform`.
    #[must_use]
    pub const fn new(config: &'a Configuration, platform: Platform) -> Self {
        Self { config, platform }
    }

    /// Criteria shared by every operation.
    ///
    /// Layers are applied in order, later ones overriding earlier ones:
    /// extra attributes, item class, service, access group, sync flag,
    /// authentication context, then the per-call key and payload. The
    /// configured service therefore always wins over an extra attribute
    /// with the same key.
    #[must_use]
    pub fn base(&self, key: Option<&str>, data: Option<&[u8]>) -> Query {
        let config = self.config;
        let mut query: Query = config
            .extra_attributes()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        query.insert(attr::CLASS, attr::CLASS_GENERIC_PASSWORD);
        query.insert(attr::SERVICE, config.service());
        if let Some(access_group) = config.access_group() {
            query.insert(attr::ACCESS_GROUP, access_group);
        }
        if config.synchronizable() {
            query.insert(attr::SYNCHRONIZABLE, true);
        }
        if let Some(context) = config.authentication_context() {
            query.insert(attr::AUTHENTICATION_CONTEXT, AttributeValue::AuthContext(context));
        }
        if let Some(key) = key {
            query.insert(attr::ACCOUNT, key);
        }
        if let Some(data) = data {
            query.insert(attr::VALUE_DATA, data);
        }
        query
    }

    /// Enumerates the attributes of every item in scope.
    #[must_use]
    pub fn fetch_all(&self) -> Query {
        let mut query = self.base(None, None);
        query.insert(attr::RETURN_ATTRIBUTES, true);
        query.insert(attr::MATCH_LIMIT, attr::MATCH_LIMIT_ALL);
        if self.platform.is_macos_family() {
            query.insert(attr::MATCH_LIMIT_ALL, true);
        }
        query
    }

    /// Fetches the payload of a single item.
    #[must_use]
    pub fn fetch_one(&self, key: &str) -> Query {
        let mut query = self.base(Some(key), None);
        query.insert(attr::RETURN_DATA, true);
        query.insert(attr::MATCH_LIMIT, attr::MATCH_LIMIT_ONE);
        query
    }

    /// Checks for a single item without asking for its payload, so gated
    /// items are found without an authentication prompt.
    #[must_use]
    pub fn exists(&self, key: &str) -> Query {
        let mut query = self.base(Some(key), None);
        query.insert(attr::MATCH_LIMIT, attr::MATCH_LIMIT_ONE);
        query
    }

    /// Adds a new item.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KeychainError::AccessControlFailure`] if the configured
    /// access-control flags are rejected.
    pub fn insert(&self, key: &str, data: &[u8]) -> KeychainResult<Query> {
        let mut query = self.base(Some(key), Some(data));
        self.apply_protection(&mut query)?;
        Ok(query)
    }

    /// Overwrites the payload of an existing item.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KeychainError::AccessControlFailure`] if the configured
    /// access-control flags are rejected.
    pub fn update(&self, key: &str, data: &[u8]) -> KeychainResult<UpdateQuery> {
        let search = self.base(Some(key), None);
        let mut changes = Query::new();
        changes.insert(attr::VALUE_DATA, data);
        self.apply_protection(&mut changes)?;
        Ok(UpdateQuery { search, changes })
    }

    /// Removes a single item.
    #[must_use]
    pub fn delete_one(&self, key: &str) -> Query {
        self.base(Some(key), None)
    }

    /// Removes every item in scope.
    #[must_use]
    pub fn delete_all(&self) -> Query {
        let mut query = self.base(None, None);
        if !self.platform.is_macos_family() {
            query.insert(attr::MATCH_LIMIT, attr::MATCH_LIMIT_ALL);
        }
        query
    }

    /// Accessibility / access-control clause. The first matching rule wins.
    fn apply_protection(&self, query: &mut Query) -> KeychainResult<()> {
        let config = self.config;
        let protection = config.accessibility().unwrap_or(Accessibility::STORE_DEFAULT);

        // macOS without sync or data protection lands in the legacy
        // file-based keychain, which takes no accessibility attribute.
        let legacy_keychain = self.platform.is_macos_family()
            && !config.synchronizable()
            && !self.uses_data_protection_keychain();

        if let Some(flags) = config.access_control() {
            let control = AccessControl::new(protection, flags)?;
            query.insert(attr::ACCESS_CONTROL, AttributeValue::AccessControl(control));
        } else if !legacy_keychain {
            query.insert(attr::ACCESSIBLE, protection.wire_value());
        }
        Ok(())
    }

    fn uses_data_protection_keychain(&self) -> bool {
        self.config
            .extra_attributes()
            .get(attr::USE_DATA_PROTECTION_KEYCHAIN)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::access_control::AccessControlFlags;
    use crate::config::AuthContextRef;
    use crate::KeychainError;

    fn config() -> Configuration {
        Configuration::builder().service("svc").build().expect("config")
    }

    fn string<'q>(query: &'q Query, key: &str) -> Option<&'q str> {
        query.get(key).and_then(AttributeValue::as_str)
    }

    #[test]
    fn test_service_wins_over_extra_attribute() {
        let config = Configuration::builder()
            .service("svc")
            .extra_attribute(attr::SERVICE, "wrong")
            .extra_attribute(attr::CLASS, "inet")
            .build()
            .expect("config");
        let query = QueryBuilder::new(&config, Platform::Ios).base(None, None);
        assert_eq!(string(&query, attr::SERVICE), Some("svc"));
        assert_eq!(string(&query, attr::CLASS), Some(attr::CLASS_GENERIC_PASSWORD));
    }

    #[test]
    fn test_base_layers() {
        let context = AuthContextRef::from_id(NonZeroUsize::new(7).expect("non-zero"));
        let config = Configuration::builder()
            .service("svc")
            .access_group("TEAM.shared")
            .synchronizable(true)
            .authentication_context(context)
            .extra_attribute("labl", "label")
            .build()
            .expect("config");
        let query = QueryBuilder::new(&config, Platform::Ios).base(Some("k1"), Some(b"v".as_slice()));

        assert_eq!(string(&query, "labl"), Some("label"));
        assert_eq!(string(&query, attr::ACCESS_GROUP), Some("TEAM.shared"));
        assert_eq!(query.get(attr::SYNCHRONIZABLE), Some(&AttributeValue::Bool(true)));
        assert_eq!(
            query.get(attr::AUTHENTICATION_CONTEXT),
            Some(&AttributeValue::AuthContext(context))
        );
        assert_eq!(string(&query, attr::ACCOUNT), Some("k1"));
        assert_eq!(
            query.get(attr::VALUE_DATA).and_then(AttributeValue::as_data),
            Some(b"v".as_slice())
        );
    }

    #[test]
    fn test_base_omits_unset_layers() {
        let config = config();
        let query = QueryBuilder::new(&config, Platform::Ios).base(None, None);
        assert_eq!(query.len(), 2);
        for key in [
            attr::ACCESS_GROUP,
            attr::SYNCHRONIZABLE,
            attr::AUTHENTICATION_CONTEXT,
            attr::ACCOUNT,
            attr::VALUE_DATA,
        ] {
            assert!(!query.contains_key(key), "{key} should be absent");
        }
    }

    #[test]
    fn test_fetch_all_on_macos_sets_distinct_flag() {
        let config = config();
        let query = QueryBuilder::new(&config, Platform::MacOs).fetch_all();
        assert_eq!(query.get(attr::RETURN_ATTRIBUTES), Some(&AttributeValue::Bool(true)));
        assert_eq!(string(&query, attr::MATCH_LIMIT), Some(attr::MATCH_LIMIT_ALL));
        assert_eq!(query.get(attr::MATCH_LIMIT_ALL), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn test_fetch_all_on_ios_omits_distinct_flag() {
        let config = config();
        let query = QueryBuilder::new(&config, Platform::Ios).fetch_all();
        assert_eq!(string(&query, attr::MATCH_LIMIT), Some(attr::MATCH_LIMIT_ALL));
        assert!(!query.contains_key(attr::MATCH_LIMIT_ALL));
        assert!(!query.contains_key(attr::ACCOUNT));
    }

    #[test]
    fn test_fetch_one() {
        let config = config();
        let query = QueryBuilder::new(&config, Platform::Ios).fetch_one("k1");
        assert_eq!(string(&query, attr::ACCOUNT), Some("k1"));
        assert_eq!(query.get(attr::RETURN_DATA), Some(&AttributeValue::Bool(true)));
        assert_eq!(string(&query, attr::MATCH_LIMIT), Some(attr::MATCH_LIMIT_ONE));
        assert!(!query.contains_key(attr::VALUE_DATA));
    }

    #[test]
    fn test_exists_requests_no_payload() {
        let config = config();
        let query = QueryBuilder::new(&config, Platform::Ios).exists("k1");
        assert_eq!(string(&query, attr::ACCOUNT), Some("k1"));
        assert_eq!(string(&query, attr::MATCH_LIMIT), Some(attr::MATCH_LIMIT_ONE));
        assert!(!query.contains_key(attr::RETURN_DATA));
        assert!(!query.contains_key(attr::RETURN_ATTRIBUTES));
    }

    #[test]
    fn test_delete_all_limit_only_off_macos() {
        let config = config();
        let ios = QueryBuilder::new(&config, Platform::Ios).delete_all();
        assert_eq!(string(&ios, attr::MATCH_LIMIT), Some(attr::MATCH_LIMIT_ALL));

        let macos = QueryBuilder::new(&config, Platform::MacOs).delete_all();
        assert!(!macos.contains_key(attr::MATCH_LIMIT));
    }

    #[test]
    fn test_delete_one_carries_key_only() {
        let config = config();
        let query = QueryBuilder::new(&config, Platform::Ios).delete_one("k1");
        assert_eq!(string(&query, attr::ACCOUNT), Some("k1"));
        assert!(!query.contains_key(attr::VALUE_DATA));
        assert!(!query.contains_key(attr::MATCH_LIMIT));
    }

    #[test]
    fn test_insert_sets_accessibility_off_macos() {
        let config = Configuration::builder()
            .service("svc")
            .accessibility(Accessibility::WhenUnlockedThisDeviceOnly)
            .build()
            .expect("config");
        let query = QueryBuilder::new(&config, Platform::Ios)
            .insert("k1", b"v")
            .expect("insert");
        assert_eq!(string(&query, attr::ACCESSIBLE), Some("aku"));
        assert!(!query.contains_key(attr::ACCESS_CONTROL));
    }

    #[test]
    fn test_insert_unset_accessibility_uses_store_default() {
        let config = Configuration::builder()
            .service("svc")
            .accessibility(None)
            .build()
            .expect("config");
        let query = QueryBuilder::new(&config, Platform::Ios)
            .insert("k1", b"v")
            .expect("insert");
        assert_eq!(
            string(&query, attr::ACCESSIBLE),
            Some(Accessibility::STORE_DEFAULT.wire_value())
        );
    }

    #[test]
    fn test_insert_on_macos_omits_accessibility_for_legacy_keychain() {
        let config = config();
        let query = QueryBuilder::new(&config, Platform::MacOs)
            .insert("k1", b"v")
            .expect("insert");
        assert!(!query.contains_key(attr::ACCESSIBLE));
        assert!(!query.contains_key(attr::ACCESS_CONTROL));
    }

    #[test]
    fn test_insert_on_macos_keeps_accessibility_when_synchronizable() {
        let config = Configuration::builder()
            .service("svc")
            .synchronizable(true)
            .build()
            .expect("config");
        let query = QueryBuilder::new(&config, Platform::MacOs)
            .insert("k1", b"v")
            .expect("insert");
        assert_eq!(string(&query, attr::ACCESSIBLE), Some("ck"));
    }

    #[test]
    fn test_insert_on_macos_keeps_accessibility_with_data_protection() {
        let config = Configuration::builder()
            .service("svc")
            .extra_attribute(attr::USE_DATA_PROTECTION_KEYCHAIN, true)
            .build()
            .expect("config");
        let query = QueryBuilder::new(&config, Platform::MacOs)
            .insert("k1", b"v")
            .expect("insert");
        assert_eq!(string(&query, attr::ACCESSIBLE), Some("ck"));
    }

    #[test]
    fn test_insert_with_access_control() {
        let flags = AccessControlFlags::BIOMETRY_CURRENT_SET
            | AccessControlFlags::OR
            | AccessControlFlags::DEVICE_PASSCODE;
        let config = Configuration::builder()
            .service("svc")
            .accessibility(Accessibility::WhenPasscodeSetThisDeviceOnly)
            .access_control(flags)
            .build()
            .expect("config");

        for platform in [Platform::Ios, Platform::MacOs] {
            let query = QueryBuilder::new(&config, platform)
                .insert("k1", b"v")
                .expect("insert");
            match query.get(attr::ACCESS_CONTROL) {
                Some(AttributeValue::AccessControl(control)) => {
                    assert_eq!(control.flags(), flags);
                    assert_eq!(
                        control.protection(),
                        Accessibility::WhenPasscodeSetThisDeviceOnly
                    );
                }
                other => panic!("expected access control, got {other:?}"),
            }
            assert!(!query.contains_key(attr::ACCESSIBLE));
        }
    }

    #[test]
    fn test_invalid_access_control_never_falls_back() {
        let config = Configuration::builder()
            .service("svc")
            .access_control(AccessControlFlags::OR | AccessControlFlags::AND)
            .build()
            .expect("config");
        let builder = QueryBuilder::new(&config, Platform::Ios);
        assert!(matches!(
            builder.insert("k1", b"v"),
            Err(KeychainError::AccessControlFailure(_))
        ));
        assert!(matches!(
            builder.update("k1", b"v"),
            Err(KeychainError::AccessControlFailure(_))
        ));
    }

    #[test]
    fn test_update_splits_search_and_changes() {
        let config = config();
        let update = QueryBuilder::new(&config, Platform::Ios)
            .update("k1", b"new")
            .expect("update");
        assert_eq!(string(&update.search, attr::ACCOUNT), Some("k1"));
        assert!(!update.search.contains_key(attr::VALUE_DATA));
        assert_eq!(
            update.changes.get(attr::VALUE_DATA).and_then(AttributeValue::as_data),
            Some(b"new".as_slice())
        );
        assert_eq!(string(&update.changes, attr::ACCESSIBLE), Some("ck"));
    }
}
