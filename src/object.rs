//! # Backing Object
//!
//! Wire shape of the single object holding the key-value data, plus the
//! merge-patch documents used to mutate it.
//!
//! The `data` field is always serialized, even when empty. The API server
//! treats an absent map differently from an empty one, and merge patches
//! against a missing `data` field would have nothing to merge into.

use crate::constants::{RETAIN_DATA_ANNOTATION, RETAIN_DATA_ANNOTATION_VALUE};
use crate::resource_type::ResourceType;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Key-value payload of the backing object
pub type Data = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackingObject {
    pub kind: String,
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Data,
}

impl BackingObject {
    /// Build the initial object: empty-but-present data and the retention annotation
    #[must_use]
    pub fn seed(resource_type: &ResourceType, namespace: &str, name: &str) -> Self {
        Self {
            kind: resource_type.kind().to_string(),
            api_version: resource_type.api_version(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                annotations: Some(BTreeMap::from([(
                    RETAIN_DATA_ANNOTATION.to_string(),
                    RETAIN_DATA_ANNOTATION_VALUE.to_string(),
                )])),
                ..ObjectMeta::default()
            },
            data: Data::new(),
        }
    }

    /// Decode a fetched object body
    ///
    /// # Errors
    ///
    /// Returns the JSON decode error if the body is not a backing object.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Data, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Data>::deserialize(deserializer)?.unwrap_or_default())
}

/// Merge patch touching a single entry of `data`
///
/// `Some(value)` sets the key; `None` serializes as `null`, which a merge
/// patch interprets as "remove this key".
#[derive(Debug, Serialize)]
pub struct DataPatch<'a> {
    data: BTreeMap<&'a str, Option<&'a str>>,
}

impl<'a> DataPatch<'a> {
    #[must_use]
    pub fn set(key: &'a str, value: &'a str) -> Self {
        Self {
            data: BTreeMap::from([(key, Some(value))]),
        }
    }

    #[must_use]
    pub fn remove(key: &'a str) -> Self {
        Self {
            data: BTreeMap::from([(key, None)]),
        }
    }

    /// Serialize to the request body
    ///
    /// # Errors
    ///
    /// Returns the JSON encode error; string maps always encode in practice.
    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
