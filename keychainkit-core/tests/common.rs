//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use keychainkit_core::{Configuration, MemoryKeychain, Platform, SecureStore};

/// Routes `log` records from the crate into a `tracing` subscriber.
///
/// Set `RUST_LOG=keychainkit_core=trace` to see submitted queries.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_log::LogTracer::init();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Configuration scoped to `service` with every other field defaulted.
pub fn config(service: &str) -> Configuration {
    Configuration::builder()
        .service(service)
        .build()
        .expect("valid configuration")
}

/// Store over a fresh in-memory keychain with the given platform semantics.
/// The gateway handle is returned for inspection.
pub fn store_on(
    platform: Platform,
    config: Configuration,
) -> (SecureStore<Arc<MemoryKeychain>>, Arc<MemoryKeychain>) {
    init_logging();
    let gateway = Arc::new(MemoryKeychain::with_platform(platform).with_journal());
    let store = SecureStore::with_platform(config, Arc::clone(&gateway), platform);
    (store, gateway)
}

/// Store sharing `gateway` with another store.
pub fn store_sharing(
    gateway: &Arc<MemoryKeychain>,
    platform: Platform,
    config: Configuration,
) -> SecureStore<Arc<MemoryKeychain>> {
    SecureStore::with_platform(config, Arc::clone(gateway), platform)
}
