//! # Store Backends
//!
//! Capability interfaces the storage layer is built on.
//!
//! - [`ObjectStore`]: raw `GET`/`POST`/`PATCH` against absolute API paths
//! - [`ResourceRegistrar`]: resource type and namespace provisioning
//!
//! Implementations:
//! - [`KubeStore`]: a live Kubernetes API server via `kube::Client`
//! - [`MemoryStore`]: in-process fake with JSON merge-patch semantics

use crate::error::{Result, StorageError};
use crate::resource_type::ResourceType;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

/// Raw object access by absolute path
///
/// Errors must be classified: a conflict on create is
/// [`ErrorKind::AlreadyExists`](crate::error::ErrorKind::AlreadyExists), a
/// missing path is [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound),
/// everything else is a transport error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the raw body at `path`
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Create an object in the collection at `path`
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<()>;

    /// Apply a JSON merge patch (RFC 7386) to the object at `path`
    async fn patch(&self, path: &str, merge_patch: Vec<u8>) -> Result<()>;
}

/// Provisioning primitives for the backing resource
#[async_trait]
pub trait ResourceRegistrar: Send + Sync {
    /// Register the resource type and wait until the store serves it
    ///
    /// A type already registered under another version gets the configured
    /// version added. Returns an `AlreadyExists` error, once the type is
    /// served, if this version was registered before.
    async fn register_resource_type(&self, resource_type: &ResourceType) -> Result<()>;

    /// Create a namespace
    ///
    /// Returns an `AlreadyExists` error if it is already present.
    async fn create_namespace(&self, name: &str) -> Result<()>;
}

/// Bound `fut` by `limit`, turning an elapsed deadline into a transport error
pub(crate) async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(limit) = limit else {
        return fut.await;
    };
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(StorageError::transport(
            format!("deadline of {}ms exceeded", limit.as_millis()),
            elapsed,
        )),
    }
}
