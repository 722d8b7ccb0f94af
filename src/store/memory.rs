//! # In-Memory Store
//!
//! A [`ObjectStore`] + [`ResourceRegistrar`] that keeps JSON documents in
//! process memory. It mimics the parts of API server behaviour the storage
//! layer relies on:
//!
//! - objects can only be created under a registered resource type and an
//!   existing namespace (404 otherwise)
//! - creating an object, namespace or resource type twice is a conflict
//! - resource types are keyed by `<plural>.<group>` like a
//!   CustomResourceDefinition; registering a new version of a known type
//!   adds that version instead of conflicting
//! - patches are JSON merge patches (RFC 7386): `null` removes a field,
//!   objects merge recursively, everything else replaces
//!
//! Failure injection and per-operation request counters make it usable for
//! negative tests.
//!
//! ```
//! use crd_storage::store::memory::{MemoryStore, Operation};
//!
//! let store = MemoryStore::new();
//! store.fail_next(Operation::Patch, 1); // next patch fails with a transport error
//! assert_eq!(store.request_count(Operation::Patch), 0);
//! ```

use super::{ObjectStore, ResourceRegistrar};
use crate::error::{Result, StorageError};
use crate::resource_type::ResourceType;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Store operations that can be counted and failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Post,
    Patch,
    RegisterResourceType,
    CreateNamespace,
}

#[derive(Debug, Default)]
struct State {
    /// `<plural>.<group>` -> served versions
    resource_types: BTreeMap<String, BTreeSet<String>>,
    namespaces: BTreeSet<String>,
    /// Item path -> document
    objects: BTreeMap<String, Value>,
    failures: HashMap<Operation, usize>,
    requests: HashMap<Operation, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

/// Parsed `/apis/<group>/<version>/namespaces/<ns>/<plural>[/<name>]`
struct ResourcePath<'a> {
    group: &'a str,
    version: &'a str,
    namespace: &'a str,
    plural: &'a str,
    name: Option<&'a str>,
}

impl<'a> ResourcePath<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["apis", group, version, "namespaces", namespace, plural] => Some(Self {
                group: *group,
                version: *version,
                namespace: *namespace,
                plural: *plural,
                name: None,
            }),
            ["apis", group, version, "namespaces", namespace, plural, name] => Some(Self {
                group: *group,
                version: *version,
                namespace: *namespace,
                plural: *plural,
                name: Some(*name),
            }),
            _ => None,
        }
    }

    fn resource_type_name(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of `operation` fail with a transport error
    pub fn fail_next(&self, operation: Operation, count: usize) {
        self.lock().failures.insert(operation, count);
    }

    /// Number of calls of `operation` made so far, failed ones included
    #[must_use]
    pub fn request_count(&self, operation: Operation) -> usize {
        self.lock().requests.get(&operation).copied().unwrap_or(0)
    }

    /// Stored document at an item path
    #[must_use]
    pub fn object(&self, path: &str) -> Option<Value> {
        self.lock().objects.get(path).cloned()
    }

    /// Number of stored objects across all resource types
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Remove the object at an item path, returning whether it existed
    pub fn delete_object(&self, path: &str) -> bool {
        self.lock().objects.remove(path).is_some()
    }

    #[must_use]
    pub fn has_namespace(&self, name: &str) -> bool {
        self.lock().namespaces.contains(name)
    }

    #[must_use]
    pub fn has_resource_type(&self, resource_type: &ResourceType) -> bool {
        self.lock()
            .resource_types
            .get(&resource_type.crd_name())
            .is_some_and(|versions| versions.contains(resource_type.version()))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the request and consume an injected failure, if any
    fn begin(&self, operation: Operation, context: &str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.requests.entry(operation).or_insert(0) += 1;
        if let Some(remaining) = state.failures.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::transport(
                    context.to_string(),
                    anyhow::anyhow!("injected {operation:?} failure"),
                ));
            }
        }
        Ok(state)
    }
}

/// Apply an RFC 7386 JSON merge patch to `target`
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let context = format!("get {path}");
        let state = self.begin(Operation::Get, &context)?;
        let object = state
            .objects
            .get(path)
            .ok_or_else(|| StorageError::not_found(context.clone()))?;
        serde_json::to_vec(object).map_err(|e| StorageError::transport(context, e))
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let context = format!("post {path}");
        let mut state = self.begin(Operation::Post, &context)?;

        let collection = ResourcePath::parse(path)
            .filter(|p| p.name.is_none())
            .ok_or_else(|| StorageError::not_found(context.clone()))?;
        let served = state
            .resource_types
            .get(&collection.resource_type_name())
            .is_some_and(|versions| versions.contains(collection.version));
        if !served {
            return Err(StorageError::not_found(format!(
                "{context}: resource type {}/{} {} not registered",
                collection.group, collection.version, collection.plural
            )));
        }
        if !state.namespaces.contains(collection.namespace) {
            return Err(StorageError::not_found(format!(
                "{context}: namespace {}",
                collection.namespace
            )));
        }

        let document: Value =
            serde_json::from_slice(&body).map_err(|e| StorageError::transport(context.clone(), e))?;
        let name = document
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StorageError::transport(context.clone(), anyhow::anyhow!("metadata.name is required"))
            })?;

        let item_path = format!("{path}/{name}");
        if state.objects.contains_key(&item_path) {
            return Err(StorageError::already_exists(format!("{context}: {name}")));
        }
        state.objects.insert(item_path, document);
        Ok(())
    }

    async fn patch(&self, path: &str, merge_patch_body: Vec<u8>) -> Result<()> {
        let context = format!("patch {path}");
        let mut state = self.begin(Operation::Patch, &context)?;

        let patch: Value = serde_json::from_slice(&merge_patch_body)
            .map_err(|e| StorageError::transport(context.clone(), e))?;
        let object = state
            .objects
            .get_mut(path)
            .ok_or_else(|| StorageError::not_found(context.clone()))?;
        merge_patch(object, &patch);
        Ok(())
    }
}

#[async_trait]
impl ResourceRegistrar for MemoryStore {
    async fn register_resource_type(&self, resource_type: &ResourceType) -> Result<()> {
        let context = format!("registering resource type {}", resource_type.crd_name());
        let mut state = self.begin(Operation::RegisterResourceType, &context)?;
        let inserted = state
            .resource_types
            .entry(resource_type.crd_name())
            .or_default()
            .insert(resource_type.version().to_string());
        if inserted {
            Ok(())
        } else {
            Err(StorageError::already_exists(context))
        }
    }

    async fn create_namespace(&self, name: &str) -> Result<()> {
        let context = format!("creating namespace {name}");
        let mut state = self.begin(Operation::CreateNamespace, &context)?;
        if state.namespaces.insert(name.to_string()) {
            Ok(())
        } else {
            Err(StorageError::already_exists(context))
        }
    }
}
