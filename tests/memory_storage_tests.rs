//! # Storage Tests Against the In-Memory Store
//!
//! End-to-end behaviour of `Storage` through its public API, with
//! `MemoryStore` standing in for the API server.

mod common;

use common::memory_storage;
use crd_storage::store::memory::{MemoryStore, Operation};
use crd_storage::{storagetest, ErrorKind, ResourceType, Storage, StorageConfig};
use std::sync::Arc;

#[tokio::test]
async fn test_conformance_suite_passes() {
    let store = Arc::new(MemoryStore::new());
    let storage = memory_storage(&store, "conformance").await;

    storagetest::run(&storage, "/conformance").await.unwrap();

    // Suite cleans up after itself
    assert!(storage.list("/conformance").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conformance_suite_passes_through_trait_object() {
    let store = Arc::new(MemoryStore::new());
    let storage: Box<dyn crd_storage::KeyValueStore> =
        Box::new(memory_storage(&store, "conformance-dyn").await);

    storagetest::run(storage.as_ref(), "/dyn").await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_twice_yields_one_object() {
    let store = Arc::new(MemoryStore::new());

    let first = memory_storage(&store, "shared").await;
    first.put("/kept", "v").await.unwrap();
    let second = memory_storage(&store, "shared").await;

    assert_eq!(store.object_count(), 1);
    assert_eq!(first.object_endpoint(), second.object_endpoint());
    assert_eq!(second.search("/kept").await.unwrap(), "v");
}

#[tokio::test]
async fn test_instances_on_same_object_do_not_clobber() {
    let store = Arc::new(MemoryStore::new());
    let a = memory_storage(&store, "shared").await;
    let b = memory_storage(&store, "shared").await;

    let (ra, rb) = tokio::join!(a.put("/a", "from-a"), b.put("/b", "from-b"));
    ra.unwrap();
    rb.unwrap();

    assert_eq!(a.search("/b").await.unwrap(), "from-b");
    assert_eq!(b.search("/a").await.unwrap(), "from-a");
    assert_eq!(a.list("").await.unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_last_write_wins_on_same_key() {
    let store = Arc::new(MemoryStore::new());
    let a = memory_storage(&store, "shared").await;
    let b = memory_storage(&store, "shared").await;

    a.put("/k", "first").await.unwrap();
    b.put("/k", "second").await.unwrap();

    assert_eq!(a.search("/k").await.unwrap(), "second");
}

#[tokio::test]
async fn test_objects_are_isolated() {
    let store = Arc::new(MemoryStore::new());
    let one = memory_storage(&store, "one").await;
    let two = memory_storage(&store, "two").await;

    one.put("/k", "v").await.unwrap();

    assert!(!two.exists("/k").await.unwrap());
    assert_eq!(store.object_count(), 2);
}

#[tokio::test]
async fn test_invalid_config_makes_no_requests() {
    let store = Arc::new(MemoryStore::new());
    let configs = [
        StorageConfig::for_object(""),
        {
            let mut config = StorageConfig::for_object("obj");
            config.resource_type.name = String::new();
            config
        },
        {
            let mut config = StorageConfig::for_object("obj");
            config.resource_type.version = String::new();
            config
        },
        {
            let mut config = StorageConfig::for_object("obj");
            config.resource_type.name = "NoDots".to_string();
            config
        },
    ];

    for config in configs {
        let err = Storage::new(
            Arc::<MemoryStore>::clone(&store),
            Arc::<MemoryStore>::clone(&store),
            config,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig, "{err}");
    }

    for operation in [
        Operation::Get,
        Operation::Post,
        Operation::Patch,
        Operation::RegisterResourceType,
        Operation::CreateNamespace,
    ] {
        assert_eq!(store.request_count(operation), 0, "{operation:?}");
    }
}

#[tokio::test]
async fn test_empty_namespace_falls_back_to_default() {
    let store = Arc::new(MemoryStore::new());
    let mut config = StorageConfig::for_object("obj");
    config.object.namespace = String::new();

    let storage = Storage::new(
        Arc::<MemoryStore>::clone(&store),
        Arc::<MemoryStore>::clone(&store),
        config,
    )
    .await
    .unwrap();

    assert!(store.has_namespace("default"));
    assert!(storage.object_endpoint().contains("/namespaces/default/"));
}

#[tokio::test]
async fn test_provisioning_failure_aborts_construction() {
    let store = Arc::new(MemoryStore::new());
    store.fail_next(Operation::CreateNamespace, 1);

    let err = Storage::new(
        Arc::<MemoryStore>::clone(&store),
        Arc::<MemoryStore>::clone(&store),
        StorageConfig::for_object("obj"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().starts_with("provisioning namespace"), "{err}");
    assert_eq!(store.request_count(Operation::Post), 0);
    assert_eq!(store.object_count(), 0);
}

#[tokio::test]
async fn test_deleted_backing_object_surfaces_not_found() {
    let store = Arc::new(MemoryStore::new());
    let storage = memory_storage(&store, "obj").await;
    assert!(store.delete_object(storage.object_endpoint()));

    let err = storage.list("/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().starts_with("listing key=/: get object"), "{err}");

    let err = storage.put("/k", "v").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_custom_resource_type_is_registered() {
    let store = Arc::new(MemoryStore::new());
    let mut config = StorageConfig::for_object("obj");
    config.resource_type.name = "kv-bucket.storage.example.org".to_string();
    config.resource_type.version = "v1alpha1".to_string();

    let storage = Storage::new(
        Arc::<MemoryStore>::clone(&store),
        Arc::<MemoryStore>::clone(&store),
        config,
    )
    .await
    .unwrap();

    let rt = ResourceType::new("kv-bucket.storage.example.org", "v1alpha1", "").unwrap();
    assert!(store.has_resource_type(&rt));
    assert_eq!(
        storage.object_endpoint(),
        "/apis/storage.example.org/v1alpha1/namespaces/default/kvbuckets/obj"
    );

    let object = store.object(storage.object_endpoint()).unwrap();
    assert_eq!(object["kind"], "KvBucket");
    assert_eq!(object["apiVersion"], "storage.example.org/v1alpha1");
}

#[tokio::test]
async fn test_keys_with_unusual_characters() {
    let store = Arc::new(MemoryStore::new());
    let storage = memory_storage(&store, "obj").await;

    for key in ["/with space", "/dots.and-dashes", "/unicode/ключ", "no-leading-slash"] {
        storage.put(key, "v").await.unwrap();
        assert_eq!(storage.search(key).await.unwrap(), "v", "{key}");
    }
    storage.put("/empty-value", "").await.unwrap();
    assert_eq!(storage.search("/empty-value").await.unwrap(), "");
    assert!(storage.exists("/empty-value").await.unwrap());
}

#[tokio::test]
async fn test_new_version_of_existing_type_bootstraps() {
    let store = Arc::new(MemoryStore::new());
    let v1 = memory_storage(&store, "versioned").await;
    v1.put("/k", "old").await.unwrap();

    let mut config = StorageConfig::for_object("versioned");
    config.resource_type.version = "v2".to_string();
    let v2 = Storage::new(
        Arc::<MemoryStore>::clone(&store),
        Arc::<MemoryStore>::clone(&store),
        config,
    )
    .await
    .unwrap();

    assert_eq!(
        v2.object_endpoint(),
        "/apis/example.io/v2/namespaces/default/crdstorages/versioned"
    );
    assert_eq!(store.request_count(Operation::RegisterResourceType), 2);
    v2.put("/k", "new").await.unwrap();
    assert_eq!(v2.search("/k").await.unwrap(), "new");
}

#[test]
fn test_rustls_init_is_repeatable() {
    common::init_rustls();
    common::init_rustls();

    assert!(rustls::crypto::CryptoProvider::get_default().is_some());
}
