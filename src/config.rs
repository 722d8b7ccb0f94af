//! # Storage Configuration
//!
//! Per-instance settings: which resource type holds the data, which object
//! inside it, and request deadlines.
//!
//! All settings have sensible defaults and can be overridden via environment
//! variables with [`StorageConfig::from_env`]. Nothing here is process-global;
//! two `Storage` instances may use entirely different configurations.

use crate::constants::{
    DEFAULT_CRD_READY_TIMEOUT_SECS, DEFAULT_NAMESPACE, DEFAULT_RESOURCE_DESCRIPTION,
    DEFAULT_RESOURCE_NAME, DEFAULT_RESOURCE_VERSION,
};
use crate::error::{Result, StorageError};
use std::time::Duration;

/// Custom resource type under which the backing object is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeConfig {
    /// Dotted name, `<kind-in-kebab-case>.<group>`
    pub name: String,
    /// API version, e.g. `v1`
    pub version: String,
    /// Human description; may be empty
    pub description: String,
}

/// Address of the backing object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectConfig {
    /// Object name. Required.
    ///
    /// If the object already exists it is reused. It is safe to run multiple
    /// `Storage` instances against the same object.
    pub name: String,
    /// Namespace holding the object; empty means `default`
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub resource_type: ResourceTypeConfig,
    pub object: ObjectConfig,
    /// Deadline for each store round trip. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// How long to wait for a newly registered resource type to be served
    pub crd_ready_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            resource_type: ResourceTypeConfig {
                name: DEFAULT_RESOURCE_NAME.to_string(),
                version: DEFAULT_RESOURCE_VERSION.to_string(),
                description: DEFAULT_RESOURCE_DESCRIPTION.to_string(),
            },
            object: ObjectConfig {
                name: String::new(),
                namespace: DEFAULT_NAMESPACE.to_string(),
            },
            request_timeout: None,
            crd_ready_timeout: Duration::from_secs(DEFAULT_CRD_READY_TIMEOUT_SECS),
        }
    }
}

impl StorageConfig {
    /// Create a config for the given object name with all other settings defaulted
    #[must_use]
    pub fn for_object(name: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.object.name = name.into();
        config
    }

    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            resource_type: ResourceTypeConfig {
                name: env_var_or_default_str(
                    "CRD_STORAGE_RESOURCE_NAME",
                    &defaults.resource_type.name,
                ),
                version: env_var_or_default_str(
                    "CRD_STORAGE_RESOURCE_VERSION",
                    &defaults.resource_type.version,
                ),
                description: env_var_or_default_str(
                    "CRD_STORAGE_RESOURCE_DESCRIPTION",
                    &defaults.resource_type.description,
                ),
            },
            object: ObjectConfig {
                name: env_var_or_default_str("CRD_STORAGE_OBJECT_NAME", &defaults.object.name),
                namespace: env_var_or_default_str(
                    "CRD_STORAGE_NAMESPACE",
                    &defaults.object.namespace,
                ),
            },
            request_timeout: std::env::var("CRD_STORAGE_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),
            crd_ready_timeout: Duration::from_secs(env_var_or_default(
                "CRD_STORAGE_CRD_READY_TIMEOUT_SECS",
                DEFAULT_CRD_READY_TIMEOUT_SECS,
            )),
        }
    }

    /// Check required settings and fill in fallbacks
    ///
    /// The description may be empty. An empty namespace falls back to
    /// `default`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] naming the first offending field.
    pub fn validated(mut self) -> Result<Self> {
        if self.resource_type.name.trim().is_empty() {
            return Err(StorageError::invalid_config(
                "config.resource_type.name is empty",
            ));
        }
        if self.resource_type.version.trim().is_empty() {
            return Err(StorageError::invalid_config(
                "config.resource_type.version is empty",
            ));
        }
        if self.object.name.trim().is_empty() {
            return Err(StorageError::invalid_config("config.object.name is empty"));
        }
        if self.object.namespace.trim().is_empty() {
            self.object.namespace = DEFAULT_NAMESPACE.to_string();
        }
        Ok(self)
    }
}

fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
