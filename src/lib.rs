//! # CRD Storage
//!
//! Key-value storage backed by a single Kubernetes custom resource object.
//!
//! One object's `data` field (a string-to-string map) holds the whole
//! dataset. On construction the resource type, namespace and object are
//! provisioned idempotently; afterwards every operation is an independent
//! round trip: a JSON merge patch for writes, a full fetch for reads.
//!
//! ## Quick Start
//!
//! ```no_run
//! use crd_storage::{Storage, StorageConfig};
//!
//! # async fn doc() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let storage = Storage::connect(client, StorageConfig::for_object("my-service")).await?;
//!
//! storage.put("/users/alice", "admin").await?;
//! assert_eq!(storage.search("/users/alice").await?, "admin");
//! assert_eq!(storage.list("/users").await?, vec!["alice"]);
//! # Ok(())
//! # }
//! ```
//!
//! Multiple `Storage` instances, in one process or many, may share the same
//! backing object.

pub mod config;
pub mod constants;
pub mod error;
pub mod keys;
pub mod object;
pub mod observability;
pub mod provisioner;
pub mod resource_type;
pub mod storage;
pub mod storagetest;
pub mod store;

pub use config::{ObjectConfig, ResourceTypeConfig, StorageConfig};
pub use error::{ErrorKind, Result, StorageError};
pub use resource_type::ResourceType;
pub use storage::{KeyValueStore, Storage};
