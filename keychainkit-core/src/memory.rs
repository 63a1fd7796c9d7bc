//! In-memory secure store for tests and non-Apple hosts.
//!
//! This implementation is NOT secure for production use: items live in
//! process memory and are only zeroized on removal. The query journal is
//! off unless requested with [`MemoryKeychain::with_journal`], and never
//! records payloads. It reproduces the parts
//! of Keychain Services semantics the façade relies on, so the store can be
//! exercised end to end without a device.

use std::sync::{Mutex, MutexGuard, PoisonError};

use zeroize::Zeroizing;

use crate::gateway::{RawResult, SecureStoreGateway};
use crate::platform::Platform;
use crate::query::{attr, AttributeValue, Query};
use crate::status::Status;

/// Store operation, as recorded in the journal and targeted by fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`SecureStoreGateway::add`].
    Add,
    /// [`SecureStoreGateway::copy_matching`].
    CopyMatching,
    /// [`SecureStoreGateway::update`].
    Update,
    /// [`SecureStoreGateway::delete`].
    Delete,
}

/// A query submitted to the store, with any `v_Data` payload removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Which call was made.
    pub operation: Operation,
    /// The search or insert criteria.
    pub query: Query,
}

struct StoredItem {
    attributes: Query,
    data: Zeroizing<Vec<u8>>,
}

#[derive(Default)]
struct MemoryState {
    items: Vec<StoredItem>,
    faults: Vec<(Operation, Status)>,
    journal: Vec<JournalEntry>,
}

/// Thread-safe in-memory Keychain emulation.
///
/// # Semantics
///
/// - Items are identified by class, service, account, access group and sync
///   flag; adding a second item with the same identity reports
///   [`Status::DUPLICATE_ITEM`].
/// - A query matches an item when every descriptive attribute in the query
///   equals the item's. Without `sync` in the query only non-synchronizable
///   items match.
/// - No match reports [`Status::ITEM_NOT_FOUND`].
/// - `m_Limit` = `m_LimitAll` returns every match; on the macOS family the
///   distinct `m_LimitAll` flag is also required, and elsewhere that flag is
///   rejected with [`Status::PARAM`].
/// - Delete removes every match on the macOS family; elsewhere only with
///   `m_Limit` = `m_LimitAll`, otherwise the first match only.
pub struct MemoryKeychain {
    platform: Platform,
    journaling: bool,
    state: Mutex<MemoryState>,
}

impl MemoryKeychain {
    /// Creates an empty store with the semantics of the current platform.
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(Platform::current())
    }

    /// Creates an empty store with the semantics of `platform`.
    #[must_use]
    pub fn with_platform(platform: Platform) -> Self {
        Self {
            platform,
            journaling: false,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Records every submitted query for [`MemoryKeychain::journal`].
    #[must_use]
    pub const fn with_journal(mut self) -> Self {
        self.journaling = true;
        self
    }

    /// Makes the next call to `operation` report `status` without touching
    /// the items. Faults queue up in the order they are injected.
    pub fn fail_next(&self, operation: Operation, status: Status) {
        self.state().faults.push((operation, status));
    }

    /// Every query submitted so far, oldest first. Empty unless the store
    /// was created [`with_journal`](MemoryKeychain::with_journal).
    #[must_use]
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state().journal.clone()
    }

    /// Number of stored items across all services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    /// Returns `true` if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    /// Stored attributes of the first item whose account is `key`.
    #[must_use]
    pub fn attributes_of(&self, key: &str) -> Option<Query> {
        self.state()
            .items
            .iter()
            .find(|item| {
                item.attributes.get(attr::ACCOUNT).and_then(AttributeValue::as_str) == Some(key)
            })
            .map(|item| item.attributes.clone())
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call and pops a pending fault for it, if any.
    fn begin(
        &self,
        state: &mut MemoryState,
        operation: Operation,
        query: &Query,
    ) -> Option<Status> {
        if self.journaling {
            let mut query = query.clone();
            query.remove(attr::VALUE_DATA);
            state.journal.push(JournalEntry { operation, query });
        }
        let position = state.faults.iter().position(|(op, _)| *op == operation)?;
        Some(state.faults.remove(position).1)
    }

    fn limit_all(&self, query: &Query) -> bool {
        let limit_all = query.get(attr::MATCH_LIMIT).and_then(AttributeValue::as_str)
            == Some(attr::MATCH_LIMIT_ALL);
        limit_all && (!self.platform.is_macos_family() || query.contains_key(attr::MATCH_LIMIT_ALL))
    }

    fn shape(query: &Query, item: &StoredItem) -> Option<RawResult> {
        let flag = |key: &str| query.get(key).and_then(AttributeValue::as_bool) == Some(true);
        match (flag(attr::RETURN_DATA), flag(attr::RETURN_ATTRIBUTES)) {
            (true, false) => Some(RawResult::Data(item.data.to_vec())),
            (false, true) => Some(RawResult::Attributes(item.attributes.clone())),
            (true, true) => {
                let mut attributes = item.attributes.clone();
                attributes.insert(attr::VALUE_DATA, item.data.to_vec());
                Some(RawResult::Attributes(attributes))
            }
            (false, false) => None,
        }
    }
}

impl Default for MemoryKeychain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryKeychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeychain")
            .field("platform", &self.platform)
            .field("journaling", &self.journaling)
            .field("items", &self.len())
            .finish_non_exhaustive()
    }
}

fn is_synchronizable(attributes: &Query) -> bool {
    attributes
        .get(attr::SYNCHRONIZABLE)
        .and_then(AttributeValue::as_bool)
        .unwrap_or(false)
}

fn item_matches(query: &Query, item: &Query) -> bool {
    if is_synchronizable(query) != is_synchronizable(item) {
        return false;
    }
    query
        .iter()
        .filter(|(key, _)| {
            !attr::is_control(key)
                && *key != attr::SYNCHRONIZABLE
                && *key != attr::ACCESSIBLE
                && *key != attr::ACCESS_CONTROL
        })
        .all(|(key, value)| item.get(key) == Some(value))
}

fn same_identity(a: &Query, b: &Query) -> bool {
    is_synchronizable(a) == is_synchronizable(b)
        && [attr::CLASS, attr::SERVICE, attr::ACCOUNT, attr::ACCESS_GROUP]
            .iter()
            .all(|key| a.get(key) == b.get(key))
}

impl SecureStoreGateway for MemoryKeychain {
    fn add(&self, query: &Query) -> Status {
        let mut state = self.state();
        if let Some(status) = self.begin(&mut state, Operation::Add, query) {
            return status;
        }
        let attributes: Query = query
            .iter()
            .filter(|(key, _)| !attr::is_control(key))
            .map(|(key, value)| (key, value.clone()))
            .collect();
        if state
            .items
            .iter()
            .any(|item| same_identity(&item.attributes, &attributes))
        {
            return Status::DUPLICATE_ITEM;
        }
        let data = query
            .get(attr::VALUE_DATA)
            .and_then(AttributeValue::as_data)
            .unwrap_or_default()
            .to_vec();
        state.items.push(StoredItem {
            attributes,
            data: Zeroizing::new(data),
        });
        Status::SUCCESS
    }

    fn copy_matching(&self, query: &Query) -> (Status, Option<RawResult>) {
        let mut state = self.state();
        if let Some(status) = self.begin(&mut state, Operation::CopyMatching, query) {
            return (status, None);
        }
        if !self.platform.is_macos_family() && query.contains_key(attr::MATCH_LIMIT_ALL) {
            return (Status::PARAM, None);
        }
        let mut found = state
            .items
            .iter()
            .filter(|item| item_matches(query, &item.attributes))
            .peekable();
        if found.peek().is_none() {
            return (Status::ITEM_NOT_FOUND, None);
        }
        if self.limit_all(query) {
            let entries = found.filter_map(|item| Self::shape(query, item)).collect();
            (Status::SUCCESS, Some(RawResult::Array(entries)))
        } else {
            let result = found.next().and_then(|item| Self::shape(query, item));
            (Status::SUCCESS, result)
        }
    }

    fn update(&self, query: &Query, changes: &Query) -> Status {
        let mut state = self.state();
        if let Some(status) = self.begin(&mut state, Operation::Update, query) {
            return status;
        }
        let mut updated = false;
        for item in state
            .items
            .iter_mut()
            .filter(|item| item_matches(query, &item.attributes))
        {
            for (key, value) in changes.iter() {
                if key == attr::VALUE_DATA {
                    item.data = Zeroizing::new(value.as_data().unwrap_or_default().to_vec());
                } else if !attr::is_control(key) {
                    item.attributes.insert(key, value.clone());
                }
            }
            updated = true;
        }
        if updated {
            Status::SUCCESS
        } else {
            Status::ITEM_NOT_FOUND
        }
    }

    fn delete(&self, query: &Query) -> Status {
        let mut state = self.state();
        if let Some(status) = self.begin(&mut state, Operation::Delete, query) {
            return status;
        }
        let delete_all = self.platform.is_macos_family() || self.limit_all(query);
        let before = state.items.len();
        if delete_all {
            state.items.retain(|item| !item_matches(query, &item.attributes));
        } else if let Some(position) = state
            .items
            .iter()
            .position(|item| item_matches(query, &item.attributes))
        {
            state.items.remove(position);
        }
        if state.items.len() == before {
            Status::ITEM_NOT_FOUND
        } else {
            Status::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(service: &str, key: &str, data: &[u8]) -> Query {
        let mut query = Query::new();
        query.insert(attr::CLASS, attr::CLASS_GENERIC_PASSWORD);
        query.insert(attr::SERVICE, service);
        query.insert(attr::ACCOUNT, key);
        query.insert(attr::VALUE_DATA, data);
        query
    }

    fn search(service: &str) -> Query {
        let mut query = Query::new();
        query.insert(attr::CLASS, attr::CLASS_GENERIC_PASSWORD);
        query.insert(attr::SERVICE, service);
        query
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let store = MemoryKeychain::with_platform(Platform::Ios);
        assert_eq!(store.add(&item("svc", "k", b"1")), Status::SUCCESS);
        assert_eq!(store.add(&item("svc", "k", b"2")), Status::DUPLICATE_ITEM);
        assert_eq!(store.add(&item("other", "k", b"2")), Status::SUCCESS);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_synchronizable_items_are_scoped_separately() {
        let store = MemoryKeychain::with_platform(Platform::Ios);
        let mut synced = item("svc", "k", b"1");
        synced.insert(attr::SYNCHRONIZABLE, true);
        assert_eq!(store.add(&synced), Status::SUCCESS);
        assert_eq!(store.add(&item("svc", "k", b"2")), Status::SUCCESS);

        let mut query = search("svc");
        query.insert(attr::ACCOUNT, "k");
        query.insert(attr::RETURN_DATA, true);
        assert_eq!(
            store.copy_matching(&query),
            (Status::SUCCESS, Some(RawResult::Data(b"2".to_vec())))
        );
    }

    #[test]
    fn test_copy_matching_limits() {
        let store = MemoryKeychain::with_platform(Platform::Ios);
        store.add(&item("svc", "a", b"1"));
        store.add(&item("svc", "b", b"2"));

        let mut all = search("svc");
        all.insert(attr::RETURN_ATTRIBUTES, true);
        all.insert(attr::MATCH_LIMIT, attr::MATCH_LIMIT_ALL);
        match store.copy_matching(&all) {
            (Status::SUCCESS, Some(RawResult::Array(entries))) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut one = search("svc");
        one.insert(attr::RETURN_ATTRIBUTES, true);
        one.insert(attr::MATCH_LIMIT, attr::MATCH_LIMIT_ONE);
        assert!(matches!(
            store.copy_matching(&one),
            (Status::SUCCESS, Some(RawResult::Attributes(_)))
        ));
    }

    #[test]
    fn test_distinct_limit_flag_rejected_off_macos() {
        let store = MemoryKeychain::with_platform(Platform::Ios);
        store.add(&item("svc", "a", b"1"));
        let mut query = search("svc");
        query.insert(attr::MATCH_LIMIT_ALL, true);
        assert_eq!(store.copy_matching(&query), (Status::PARAM, None));
    }

    #[test]
    fn test_delete_without_limit_removes_one_off_macos() {
        let store = MemoryKeychain::with_platform(Platform::Ios);
        store.add(&item("svc", "a", b"1"));
        store.add(&item("svc", "b", b"2"));
        assert_eq!(store.delete(&search("svc")), Status::SUCCESS);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_removes_all_on_macos() {
        let store = MemoryKeychain::with_platform(Platform::MacOs);
        store.add(&item("svc", "a", b"1"));
        store.add(&item("svc", "b", b"2"));
        store.add(&item("other", "c", b"3"));
        assert_eq!(store.delete(&search("svc")), Status::SUCCESS);
        assert_eq!(store.len(), 1);
        assert_eq!(store.delete(&search("svc")), Status::ITEM_NOT_FOUND);
    }

    #[test]
    fn test_update_missing_item() {
        let store = MemoryKeychain::with_platform(Platform::Ios);
        let mut changes = Query::new();
        changes.insert(attr::VALUE_DATA, b"x".as_slice());
        assert_eq!(store.update(&search("svc"), &changes), Status::ITEM_NOT_FOUND);
    }

    #[test]
    fn test_fault_injection_and_journal() {
        let store = MemoryKeychain::with_platform(Platform::Ios).with_journal();
        store.fail_next(Operation::Add, Status::INTERACTION_NOT_ALLOWED);
        assert_eq!(store.add(&item("svc", "a", b"1")), Status::INTERACTION_NOT_ALLOWED);
        assert!(store.is_empty());
        assert_eq!(store.add(&item("svc", "a", b"1")), Status::SUCCESS);

        let journal = store.journal();
        assert_eq!(journal.len(), 2);
        assert!(journal.iter().all(|entry| entry.operation == Operation::Add));
    }

    #[test]
    fn test_journal_is_off_by_default() {
        let store = MemoryKeychain::with_platform(Platform::Ios);
        for i in 0..100 {
            store.add(&item("svc", &format!("k{i}"), b"secret"));
        }
        assert_eq!(store.len(), 100);
        assert!(store.journal().is_empty());
    }

    #[test]
    fn test_journal_never_keeps_payloads() {
        let store = MemoryKeychain::with_platform(Platform::Ios).with_journal();
        store.add(&item("svc", "k", b"secret-0"));
        let mut changes = Query::new();
        changes.insert(attr::VALUE_DATA, b"secret-1".as_slice());
        store.update(&search("svc"), &changes);
        assert_eq!(store.delete(&search("svc")), Status::SUCCESS);

        let journal = store.journal();
        assert_eq!(journal.len(), 3);
        assert!(journal
            .iter()
            .all(|entry| !entry.query.contains_key(attr::VALUE_DATA)));
        assert_eq!(
            journal[0].query.get(attr::ACCOUNT).and_then(AttributeValue::as_str),
            Some("k")
        );
    }
}
