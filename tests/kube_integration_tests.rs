//! # Live Cluster Tests
//!
//! Runs the conformance suite against a real API server. Requires a
//! reachable cluster in the current kubeconfig and permission to create
//! CustomResourceDefinitions and namespaces.
//!
//! ```bash
//! CRD_STORAGE_INTEGRATION=1 cargo test --test kube_integration_tests -- --ignored
//! ```
//!
//! The backing object is deleted afterwards; the resource type and
//! namespace are left in place.

mod common;

use crd_storage::{storagetest, ResourceType, Storage, StorageConfig};
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject};
use kube::Client;

fn integration_enabled() -> bool {
    std::env::var("CRD_STORAGE_INTEGRATION").is_ok_and(|v| v == "1")
}

async fn delete_backing_object(client: Client, config: &StorageConfig) -> anyhow::Result<()> {
    let rt = ResourceType::from_config(&config.resource_type)?;
    let resource = ApiResource {
        group: rt.group().to_string(),
        version: rt.version().to_string(),
        api_version: rt.api_version(),
        kind: rt.kind().to_string(),
        plural: rt.plural().to_string(),
    };
    let api: Api<DynamicObject> =
        Api::namespaced_with(client, &config.object.namespace, &resource);
    api.delete(&config.object.name, &DeleteParams::default())
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live cluster; set CRD_STORAGE_INTEGRATION=1"]
async fn test_conformance_against_live_cluster() {
    if !integration_enabled() {
        eprintln!("CRD_STORAGE_INTEGRATION not set, skipping");
        return;
    }
    common::init_rustls();

    let client = Client::try_default().await.expect("kubeconfig");
    let object = format!("crd-storage-it-{}", std::process::id());
    let config = StorageConfig {
        request_timeout: Some(std::time::Duration::from_secs(30)),
        ..StorageConfig::for_object(object)
    };

    let storage = Storage::connect(client.clone(), config.clone())
        .await
        .expect("provisioning");
    // A second bootstrap against the same object must succeed
    let again = Storage::connect(client.clone(), config.clone())
        .await
        .expect("second provisioning");

    let result = storagetest::run(&storage, "/it").await;
    again.put("/it/second-instance", "v").await.expect("put");
    let seen = storage.search("/it/second-instance").await;

    delete_backing_object(client, &config)
        .await
        .expect("cleanup");

    result.expect("conformance");
    assert_eq!(seen.expect("search"), "v");
}
