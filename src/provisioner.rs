//! # Resource Provisioner
//!
//! Makes sure the backing resource exists before any key-value operation:
//!
//! 1. register the resource type
//! 2. create the namespace
//! 3. create the backing object with empty `data`
//!
//! Each step treats "already exists" as success, so provisioning can be
//! re-run any number of times. Any other error aborts provisioning and is
//! returned with the step and resource in its context. Nothing is retried or
//! rolled back.
//!
//! The request timeout bounds the namespace and object round trips. The
//! resource type step is left to the registrar, whose wait for the type to be
//! served has its own limit.

use crate::error::{Result, ResultExt, StorageError};
use crate::object::BackingObject;
use crate::observability::metrics;
use crate::resource_type::ResourceType;
use crate::store::{with_deadline, ObjectStore, ResourceRegistrar};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    AlreadyExisted,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::AlreadyExisted => "already_exists",
        }
    }
}

/// Fold an "already exists" error into success
fn tolerate_existing(result: Result<()>) -> Result<Outcome> {
    match result {
        Ok(()) => Ok(Outcome::Created),
        Err(e) if e.is_already_exists() => Ok(Outcome::AlreadyExisted),
        Err(e) => Err(e),
    }
}

fn record(step: &str, result: &Result<Outcome>) {
    let outcome = match result {
        Ok(outcome) => outcome.as_str(),
        Err(_) => "error",
    };
    metrics::record_provision_step(step, outcome);
}

pub struct Provisioner<'a> {
    registrar: &'a dyn ResourceRegistrar,
    store: &'a dyn ObjectStore,
    resource_type: &'a ResourceType,
    namespace: &'a str,
    object_name: &'a str,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for Provisioner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("resource_type", &self.resource_type.name())
            .field("namespace", &self.namespace)
            .field("object_name", &self.object_name)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub fn new(
        registrar: &'a dyn ResourceRegistrar,
        store: &'a dyn ObjectStore,
        resource_type: &'a ResourceType,
        namespace: &'a str,
        object_name: &'a str,
    ) -> Self {
        Self {
            registrar,
            store,
            resource_type,
            namespace,
            object_name,
            request_timeout: None,
        }
    }

    /// Bound the namespace and object requests by `limit`
    #[must_use]
    pub fn with_request_timeout(mut self, limit: Option<Duration>) -> Self {
        self.request_timeout = limit;
        self
    }

    /// Run all provisioning steps in order
    ///
    /// # Errors
    ///
    /// Returns the first error that is not "already exists".
    pub async fn provision(&self) -> Result<()> {
        self.register_resource_type().await?;
        self.create_namespace().await?;
        self.create_object().await?;
        Ok(())
    }

    async fn register_resource_type(&self) -> Result<()> {
        let name = self.resource_type.name();
        let result = tolerate_existing(
            self.registrar
                .register_resource_type(self.resource_type)
                .await,
        );
        record("resource_type", &result);
        match result.context("provisioning resource type")? {
            Outcome::Created => debug!(resource_type = name, "resource type created"),
            Outcome::AlreadyExisted => debug!(resource_type = name, "resource type already exists"),
        }
        Ok(())
    }

    async fn create_namespace(&self) -> Result<()> {
        let result = tolerate_existing(
            with_deadline(
                self.request_timeout,
                self.registrar.create_namespace(self.namespace),
            )
            .await,
        );
        record("namespace", &result);
        match result.context("provisioning namespace")? {
            Outcome::Created => debug!(namespace = self.namespace, "namespace created"),
            Outcome::AlreadyExisted => debug!(namespace = self.namespace, "namespace already exists"),
        }
        Ok(())
    }

    async fn create_object(&self) -> Result<()> {
        let context = format!(
            "provisioning object {}/{}",
            self.namespace, self.object_name
        );
        let object = BackingObject::seed(self.resource_type, self.namespace, self.object_name);
        let body = serde_json::to_vec(&object)
            .map_err(|e| StorageError::transport(format!("{context}: marshaling object"), e))?;

        let path = self.resource_type.endpoint(self.namespace);
        let result = tolerate_existing(
            with_deadline(self.request_timeout, self.store.post(&path, body)).await,
        );
        record("object", &result);
        match result.context(context)? {
            Outcome::Created => debug!(object = self.object_name, "object created"),
            Outcome::AlreadyExisted => debug!(object = self.object_name, "object already exists"),
        }
        Ok(())
    }
}
