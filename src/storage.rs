//! # Key-Value Storage
//!
//! [`Storage`] treats the `data` map of a single backing object as a flat
//! key-value store.
//!
//! - Writes are JSON merge patches touching one key, so independent
//!   instances writing different keys never clobber each other. Writes to the
//!   same key are last-write-wins; there is no compare-and-swap.
//! - Reads fetch and decode the whole object every time. Nothing is cached,
//!   so a read never observes data older than its own request.
//!
//! Construction validates the configuration and provisions the resource type,
//! namespace and object. It either returns a ready `Storage` or an error;
//! there is no half-initialized state.

use crate::config::StorageConfig;
use crate::error::{Result, ResultExt, StorageError};
use crate::keys;
use crate::object::{BackingObject, Data, DataPatch};
use crate::observability::metrics;
use crate::provisioner::Provisioner;
use crate::resource_type::ResourceType;
use crate::store::{with_deadline, KubeStore, ObjectStore, ResourceRegistrar};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, Instrument, Span};

/// Key-value contract shared by every storage implementation
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`; same as [`KeyValueStore::put`]
    async fn create(&self, key: &str, value: &str) -> Result<()>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Check whether `key` is present (exact match)
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get the value of `key`, or a `NotFound` error
    async fn search(&self, key: &str) -> Result<String>;

    /// List the keys at or below `prefix`, relative to it
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `key`; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn ObjectStore>,
    object_endpoint: String,
    request_timeout: Option<Duration>,
    span: Span,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("object_endpoint", &self.object_endpoint)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Validate `config`, provision the backing object and return the store
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if a required setting is missing or malformed; no
    ///   request is made in that case
    /// - any provisioning error other than "already exists"
    pub async fn new(
        store: Arc<dyn ObjectStore>,
        registrar: Arc<dyn ResourceRegistrar>,
        config: StorageConfig,
    ) -> Result<Self> {
        let config = config.validated()?;
        let resource_type = ResourceType::from_config(&config.resource_type)?;
        let namespace = config.object.namespace.as_str();
        let object_name = config.object.name.as_str();

        let span = tracing::info_span!(
            "crd_storage",
            resource_type = %resource_type.name(),
            resource_version = %resource_type.version(),
            object = %object_name,
            namespace = %namespace,
        );

        Provisioner::new(
            registrar.as_ref(),
            store.as_ref(),
            &resource_type,
            namespace,
            object_name,
        )
        .with_request_timeout(config.request_timeout)
        .provision()
        .instrument(span.clone())
        .await?;

        let storage = Self {
            object_endpoint: resource_type.object_endpoint(namespace, object_name),
            store,
            request_timeout: config.request_timeout,
            span,
        };
        storage.span.in_scope(|| info!("storage ready"));
        Ok(storage)
    }

    /// Connect to a Kubernetes cluster through `client`
    ///
    /// # Errors
    ///
    /// See [`Storage::new`].
    pub async fn connect(client: kube::Client, config: StorageConfig) -> Result<Self> {
        let kube_store = Arc::new(
            KubeStore::new(client, config.crd_ready_timeout)
                .with_request_timeout(config.request_timeout),
        );
        Self::new(Arc::<KubeStore>::clone(&kube_store), kube_store, config).await
    }

    /// Item path of the backing object
    #[must_use]
    pub fn object_endpoint(&self) -> &str {
        &self.object_endpoint
    }

    pub async fn create(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, value).await
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.observe("put", async {
            let body = DataPatch::set(key, value).to_vec().map_err(|e| {
                StorageError::transport(format!("marshaling patch for key={key}"), e)
            })?;
            self.apply_patch(body)
                .await
                .with_context(|| format!("putting key={key}"))?;
            debug!(key, "key stored");
            Ok(())
        })
        .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.observe("exists", async {
            let data = self
                .get_data()
                .await
                .with_context(|| format!("checking existence key={key}"))?;
            Ok(data.contains_key(key))
        })
        .await
    }

    /// Get the value stored under `key`
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is absent. A missing key never yields an empty
    /// string.
    pub async fn search(&self, key: &str) -> Result<String> {
        self.observe("search", async {
            let mut data = self
                .get_data()
                .await
                .with_context(|| format!("searching for key={key}"))?;
            data.remove(key)
                .ok_or_else(|| StorageError::not_found(format!("searching for key={key}")))
        })
        .await
    }

    /// List keys equal to `prefix` or below `prefix/`, relative to the prefix
    ///
    /// An exact match is returned as `""`. `/foo` covers `/foo/bar` but not
    /// `/foobar`. Keys come back in ascending order; nothing matching is an
    /// empty list, not an error.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.observe("list", async {
            let data = self
                .get_data()
                .await
                .with_context(|| format!("listing key={prefix}"))?;
            Ok(keys::list_under(data.keys(), prefix))
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.observe("delete", async {
            let body = DataPatch::remove(key).to_vec().map_err(|e| {
                StorageError::transport(format!("marshaling patch for key={key}"), e)
            })?;
            self.apply_patch(body)
                .await
                .with_context(|| format!("deleting value for key={key}"))?;
            debug!(key, "key deleted");
            Ok(())
        })
        .await
    }

    async fn apply_patch(&self, body: Vec<u8>) -> Result<()> {
        with_deadline(
            self.request_timeout,
            self.store.patch(&self.object_endpoint, body),
        )
        .await
    }

    async fn get_data(&self) -> Result<Data> {
        let body = with_deadline(self.request_timeout, self.store.get(&self.object_endpoint))
            .await
            .context("get object")?;
        let object = BackingObject::from_slice(&body)
            .map_err(|e| StorageError::transport("unmarshal object", e))?;
        Ok(object.data)
    }

    async fn observe<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = fut.instrument(self.span.clone()).await;
        metrics::record_operation(operation, start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::record_operation_error(operation, e.kind());
        }
        result
    }
}

#[async_trait]
impl KeyValueStore for Storage {
    async fn create(&self, key: &str, value: &str) -> Result<()> {
        Storage::create(self, key, value).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        Storage::put(self, key, value).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Storage::exists(self, key).await
    }

    async fn search(&self, key: &str) -> Result<String> {
        Storage::search(self, key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Storage::list(self, prefix).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Storage::delete(self, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::memory::{MemoryStore, Operation};

    async fn storage() -> (Arc<MemoryStore>, Storage) {
        let store = Arc::new(MemoryStore::new());
        let storage = Storage::new(
            Arc::<MemoryStore>::clone(&store),
            Arc::<MemoryStore>::clone(&store),
            StorageConfig::for_object("unit-test"),
        )
        .await
        .unwrap();
        (store, storage)
    }

    #[tokio::test]
    async fn test_put_then_search() {
        let (_, storage) = storage().await;

        storage.put("/a/b", "value").await.unwrap();

        assert_eq!(storage.search("/a/b").await.unwrap(), "value");
        assert!(storage.exists("/a/b").await.unwrap());
        assert!(!storage.exists("/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_miss_is_not_found() {
        let (_, storage) = storage().await;

        let err = storage.search("/never-written").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("key=/never-written"));
    }

    #[tokio::test]
    async fn test_delete_last_key_keeps_data_present() {
        let (store, storage) = storage().await;

        storage.put("/only", "v").await.unwrap();
        storage.delete("/only").await.unwrap();

        let object = store.object(storage.object_endpoint()).unwrap();
        assert_eq!(object["data"], serde_json::json!({}));
        assert!(!storage.exists("/only").await.unwrap());
    }

    #[tokio::test]
    async fn test_transport_errors_carry_key_context() {
        let (store, storage) = storage().await;
        store.fail_next(Operation::Patch, 1);

        let err = storage.put("/k", "v").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().starts_with("putting key=/k: patch "));
    }

    #[tokio::test]
    async fn test_create_propagates_put_errors() {
        let (store, storage) = storage().await;
        store.fail_next(Operation::Patch, 1);

        assert!(storage.create("/k", "v").await.is_err());
    }

    #[tokio::test]
    async fn test_undecodable_object_is_transport_error() {
        let (store, storage) = storage().await;
        store
            .patch(storage.object_endpoint(), br#"{"data":"not-a-map"}"#.to_vec())
            .await
            .unwrap();

        let err = storage.list("/").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("unmarshal object"));
    }

    /// Object store whose reads never complete
    struct StalledStore(MemoryStore);

    #[async_trait]
    impl ObjectStore for StalledStore {
        async fn get(&self, _path: &str) -> Result<Vec<u8>> {
            std::future::pending().await
        }

        async fn post(&self, path: &str, body: Vec<u8>) -> Result<()> {
            self.0.post(path, body).await
        }

        async fn patch(&self, path: &str, merge_patch: Vec<u8>) -> Result<()> {
            self.0.patch(path, merge_patch).await
        }
    }

    #[tokio::test]
    async fn test_request_timeout_elapses_as_transport_error() {
        let inner = MemoryStore::new();
        let registrar = Arc::new(MemoryStore::new());
        let rt = ResourceType::new("crd-storage.example.io", "v1", "").unwrap();
        inner.register_resource_type(&rt).await.unwrap();
        inner.create_namespace("default").await.unwrap();

        let mut config = StorageConfig::for_object("slow");
        config.request_timeout = Some(Duration::from_millis(20));
        let storage = Storage::new(Arc::new(StalledStore(inner)), registrar, config)
            .await
            .unwrap();

        let err = storage.exists("/k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("deadline of 20ms exceeded"));
    }

    /// Registrar whose resource type registration is slower than a request
    struct SlowTypeRegistrar(Arc<MemoryStore>);

    #[async_trait]
    impl ResourceRegistrar for SlowTypeRegistrar {
        async fn register_resource_type(&self, resource_type: &ResourceType) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.0.register_resource_type(resource_type).await
        }

        async fn create_namespace(&self, name: &str) -> Result<()> {
            self.0.create_namespace(name).await
        }
    }

    #[tokio::test]
    async fn test_slow_type_registration_is_bounded_by_ready_timeout_only() {
        let store = Arc::new(MemoryStore::new());
        let registrar = Arc::new(SlowTypeRegistrar(Arc::<MemoryStore>::clone(&store)));
        let mut config = StorageConfig::for_object("slow-type");
        config.request_timeout = Some(Duration::from_millis(50));
        config.crd_ready_timeout = Duration::from_secs(30);

        let storage = Storage::new(Arc::<MemoryStore>::clone(&store), registrar, config)
            .await
            .unwrap();

        storage.put("/k", "v").await.unwrap();
        assert_eq!(storage.search("/k").await.unwrap(), "v");
    }
}
