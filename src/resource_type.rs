//! # Resource Type
//!
//! Identity of the custom resource kind holding the backing object, and the
//! API paths derived from it.
//!
//! A resource type is named `<kind-in-kebab-case>.<group>`:
//!
//! ```text
//! crd-storage.example.io  ->  kind       CrdStorage
//!                             plural     crdstorages
//!                             group      example.io
//!                             crd name   crdstorages.example.io
//! ```

use crate::config::ResourceTypeConfig;
use crate::error::{Result, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    name: String,
    version: String,
    description: String,
    kind: String,
    plural: String,
    group: String,
}

impl ResourceType {
    /// Parse a resource type descriptor
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if the name has no group part,
    /// an empty kind label, or characters other than lowercase alphanumerics,
    /// `-` and `.`.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let version = version.into();

        if version.is_empty() {
            return Err(StorageError::invalid_config(format!(
                "resource type {name} has an empty version"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        {
            return Err(StorageError::invalid_config(format!(
                "resource type name {name} must be a lowercase DNS name"
            )));
        }

        let (kind_label, group) = name.split_once('.').ok_or_else(|| {
            StorageError::invalid_config(format!(
                "resource type name {name} must be <kind>.<group>"
            ))
        })?;
        if kind_label.is_empty() || group.is_empty() {
            return Err(StorageError::invalid_config(format!(
                "resource type name {name} must be <kind>.<group>"
            )));
        }

        let kind = kebab_to_camel(kind_label);
        if kind.is_empty() {
            return Err(StorageError::invalid_config(format!(
                "resource type name {name} has no kind characters"
            )));
        }
        let plural = format!("{}s", kind.to_lowercase());
        let group = group.to_string();

        Ok(Self {
            name,
            version,
            description: description.into(),
            kind,
            plural,
            group,
        })
    }

    /// Parse from the configuration section
    ///
    /// # Errors
    ///
    /// See [`ResourceType::new`].
    pub fn from_config(config: &ResourceTypeConfig) -> Result<Self> {
        Self::new(&config.name, &config.version, &config.description)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn plural(&self) -> &str {
        &self.plural
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// `<group>/<version>`
    #[must_use]
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// Name of the CustomResourceDefinition object, `<plural>.<group>`
    #[must_use]
    pub fn crd_name(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }

    /// Collection endpoint for objects of this type in `namespace`
    #[must_use]
    pub fn endpoint(&self, namespace: &str) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}",
            self.group, self.version, namespace, self.plural
        )
    }

    /// Item endpoint for the object `name` in `namespace`
    #[must_use]
    pub fn object_endpoint(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}", self.endpoint(namespace), name)
    }
}

fn kebab_to_camel(label: &str) -> String {
    label
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_identity_is_derived_from_name() {
        let rt = ResourceType::new("crd-storage.example.io", "v1", "test").unwrap();

        assert_eq!(rt.kind(), "CrdStorage");
        assert_eq!(rt.plural(), "crdstorages");
        assert_eq!(rt.group(), "example.io");
        assert_eq!(rt.api_version(), "example.io/v1");
        assert_eq!(rt.crd_name(), "crdstorages.example.io");
    }

    #[test]
    fn test_endpoints() {
        let rt = ResourceType::new("kv.storage.acme.dev", "v1beta1", "").unwrap();

        assert_eq!(
            rt.endpoint("team-a"),
            "/apis/storage.acme.dev/v1beta1/namespaces/team-a/kvs"
        );
        assert_eq!(
            rt.object_endpoint("team-a", "cache"),
            "/apis/storage.acme.dev/v1beta1/namespaces/team-a/kvs/cache"
        );
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        for name in ["storage", ".example.io", "storage.", "Storage.example.io", "a_b.io", "-.io"]
        {
            let err = ResourceType::new(name, "v1", "").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig, "name {name}");
        }
    }

    #[test]
    fn test_empty_version_is_rejected() {
        let err = ResourceType::new("crd-storage.example.io", "", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
