//! # Kubernetes Store
//!
//! [`ObjectStore`] and [`ResourceRegistrar`] over a live API server.
//!
//! Object access uses raw requests against absolute paths, so the backing
//! object's kind does not need a compile-time Rust type. The resource type is
//! registered as a CustomResourceDefinition whose schema declares `data` as
//! a map of strings.
//!
//! The definition is named `<plural>.<group>` and so is shared by every
//! version. Registering a version the existing definition lacks adds it as a
//! served, non-storage version. Every registration waits for the definition
//! to be established, including when another instance created it.

use super::{with_deadline, ObjectStore, ResourceRegistrar};
use crate::constants::MERGE_PATCH_CONTENT_TYPE;
use crate::error::{Result, StorageError};
use crate::resource_type::ResourceType;
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionVersion,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;
use kube_runtime::wait::{await_condition, conditions};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Attempts at adding a version before giving up on concurrent writers
const VERSION_UPDATE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    crd_ready_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("crd_ready_timeout", &self.crd_ready_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, crd_ready_timeout: Duration) -> Self {
        Self {
            client,
            crd_ready_timeout,
            request_timeout: None,
        }
    }

    /// Bound each provisioning request by `limit`
    ///
    /// The wait for a definition to be established is bounded by the ready
    /// timeout instead.
    #[must_use]
    pub fn with_request_timeout(mut self, limit: Option<Duration>) -> Self {
        self.request_timeout = limit;
        self
    }

    /// Make sure an existing definition serves the configured version
    ///
    /// Returns whether the definition had to be updated. A conflicting
    /// concurrent update is re-read and retried.
    async fn ensure_version(
        &self,
        crds: &Api<CustomResourceDefinition>,
        resource_type: &ResourceType,
    ) -> Result<bool> {
        let crd_name = resource_type.crd_name();
        let context = format!(
            "adding version {} to CustomResourceDefinition {crd_name}",
            resource_type.version()
        );
        let wanted = version_entry(resource_type)
            .map_err(|e| StorageError::transport(context.clone(), e))?;

        for attempt in 1..=VERSION_UPDATE_ATTEMPTS {
            let mut existing = with_deadline(self.request_timeout, async {
                crds.get(&crd_name).await.map_err(|e| {
                    classify(e, format!("reading CustomResourceDefinition {crd_name}"))
                })
            })
            .await?;
            if !serve_version(&mut existing, wanted.clone()) {
                return Ok(false);
            }

            let replaced = with_deadline(self.request_timeout, async {
                crds.replace(&crd_name, &PostParams::default(), &existing)
                    .await
                    .map_err(|e| classify(e, context.clone()))
            })
            .await;
            match replaced {
                Ok(_) => {
                    info!(
                        crd = %crd_name,
                        version = resource_type.version(),
                        "added version to CustomResourceDefinition"
                    );
                    return Ok(true);
                }
                // 409 here is a stale resourceVersion
                Err(e) if e.is_already_exists() => {
                    debug!(
                        crd = %crd_name,
                        attempt,
                        "CustomResourceDefinition changed concurrently, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::transport(
            context,
            anyhow::anyhow!("still conflicting after {VERSION_UPDATE_ATTEMPTS} attempts"),
        ))
    }

    async fn await_established(
        &self,
        crds: Api<CustomResourceDefinition>,
        crd_name: &str,
    ) -> Result<()> {
        debug!(crd = %crd_name, "waiting for CustomResourceDefinition to be established");
        let established = await_condition(crds, crd_name, conditions::is_crd_established());
        match tokio::time::timeout(self.crd_ready_timeout, established).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(StorageError::transport(
                format!("waiting for CustomResourceDefinition {crd_name}"),
                e,
            )),
            Err(elapsed) => Err(StorageError::transport(
                format!(
                    "waiting for CustomResourceDefinition {crd_name} ({}s)",
                    self.crd_ready_timeout.as_secs()
                ),
                elapsed,
            )),
        }
    }

    async fn send(&self, request: http::Request<Vec<u8>>, context: String) -> Result<String> {
        self.client
            .request_text(request)
            .await
            .map_err(|e| classify(e, context))
    }
}

/// Map a kube error onto the storage error kinds
///
/// 409 Conflict is `AlreadyExists`, 404 is `NotFound`, all else is transport.
pub(crate) fn classify(err: kube::Error, context: String) -> StorageError {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => StorageError::already_exists(context),
        kube::Error::Api(ae) if ae.code == 404 => StorageError::not_found(context),
        other => StorageError::transport(context, other),
    }
}

fn build_request(
    builder: http::request::Builder,
    body: Vec<u8>,
    context: &str,
) -> Result<http::Request<Vec<u8>>> {
    builder
        .body(body)
        .map_err(|e| StorageError::transport(format!("building request for {context}"), e))
}

/// CRD manifest for the resource type
///
/// `data` is a string map; unknown fields are preserved so server-side
/// pruning never strips anything a newer client writes.
pub(crate) fn crd_manifest(resource_type: &ResourceType) -> serde_json::Value {
    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": { "name": resource_type.crd_name() },
        "spec": {
            "group": resource_type.group(),
            "scope": "Namespaced",
            "names": {
                "kind": resource_type.kind(),
                "listKind": format!("{}List", resource_type.kind()),
                "plural": resource_type.plural(),
                "singular": resource_type.kind().to_lowercase(),
            },
            "versions": [{
                "name": resource_type.version(),
                "served": true,
                "storage": true,
                "schema": {
                    "openAPIV3Schema": {
                        "type": "object",
                        "description": resource_type.description(),
                        "x-kubernetes-preserve-unknown-fields": true,
                        "properties": {
                            "data": {
                                "type": "object",
                                "additionalProperties": { "type": "string" }
                            }
                        }
                    }
                }
            }]
        }
    })
}

fn typed_manifest(resource_type: &ResourceType) -> serde_json::Result<CustomResourceDefinition> {
    serde_json::from_value(crd_manifest(resource_type))
}

/// Version entry for the resource type, as served by a fresh definition
fn version_entry(
    resource_type: &ResourceType,
) -> anyhow::Result<CustomResourceDefinitionVersion> {
    typed_manifest(resource_type)?
        .spec
        .versions
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("manifest has no versions"))
}

/// Make `crd` serve `wanted`, returning whether anything changed
///
/// A missing version is appended with `storage: false`, since exactly one
/// version of a definition is the storage version. A present but unserved
/// version is switched to served.
pub(crate) fn serve_version(
    crd: &mut CustomResourceDefinition,
    mut wanted: CustomResourceDefinitionVersion,
) -> bool {
    let versions = &mut crd.spec.versions;
    if let Some(existing) = versions.iter_mut().find(|v| v.name == wanted.name) {
        if existing.served {
            return false;
        }
        existing.served = true;
        return true;
    }
    wanted.storage = false;
    versions.push(wanted);
    true
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let context = format!("get {path}");
        let request = build_request(http::Request::get(path), Vec::new(), &context)?;
        let text = self.send(request, context).await?;
        Ok(text.into_bytes())
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let context = format!("post {path}");
        let request = build_request(
            http::Request::post(path).header(CONTENT_TYPE, "application/json"),
            body,
            &context,
        )?;
        self.send(request, context).await?;
        Ok(())
    }

    async fn patch(&self, path: &str, merge_patch: Vec<u8>) -> Result<()> {
        let context = format!("patch {path}");
        let request = build_request(
            http::Request::patch(path).header(CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE),
            merge_patch,
            &context,
        )?;
        self.send(request, context).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceRegistrar for KubeStore {
    async fn register_resource_type(&self, resource_type: &ResourceType) -> Result<()> {
        let crd_name = resource_type.crd_name();
        let context = format!("creating CustomResourceDefinition {crd_name}");

        let crd = typed_manifest(resource_type)
            .map_err(|e| StorageError::transport(context.clone(), e))?;
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());

        let created = with_deadline(self.request_timeout, async {
            crds.create(&PostParams::default(), &crd)
                .await
                .map_err(|e| classify(e, context.clone()))
        })
        .await;
        let changed = match created {
            Ok(_) => true,
            Err(e) if e.is_already_exists() => self.ensure_version(&crds, resource_type).await?,
            Err(e) => return Err(e),
        };

        self.await_established(crds, &crd_name).await?;
        if changed {
            Ok(())
        } else {
            Err(StorageError::already_exists(context))
        }
    }

    async fn create_namespace(&self, name: &str) -> Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        with_deadline(self.request_timeout, async {
            namespaces
                .create(&PostParams::default(), &ns)
                .await
                .map_err(|e| classify(e, format!("creating namespace {name}")))
        })
        .await?;
        Ok(())
    }
}
