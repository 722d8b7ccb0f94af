//! Shared helpers for the integration tests

#![allow(dead_code, reason = "each test binary uses a different subset")]

use crd_storage::store::memory::MemoryStore;
use crd_storage::{Storage, StorageConfig};
use std::sync::{Arc, Once};

static RUSTLS_INIT: Once = Once::new();

/// Install the rustls crypto provider once per test binary
///
/// Must run before the first Kubernetes client is built.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Only the first provider installed in a process sticks
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
        }
    });
}

/// Build a `Storage` for `object` on top of a shared in-memory store
pub async fn memory_storage(store: &Arc<MemoryStore>, object: &str) -> Storage {
    Storage::new(
        Arc::<MemoryStore>::clone(store),
        Arc::<MemoryStore>::clone(store),
        StorageConfig::for_object(object),
    )
    .await
    .expect("in-memory storage should provision")
}
