//! # Constants
//!
//! Shared constants used throughout the crate.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default resource type name (`<kind-in-kebab-case>.<group>`)
pub const DEFAULT_RESOURCE_NAME: &str = "crd-storage.example.io";

/// Default resource type version
pub const DEFAULT_RESOURCE_VERSION: &str = "v1";

/// Default resource type description
pub const DEFAULT_RESOURCE_DESCRIPTION: &str = "Key-value data managed by crd-storage";

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default time to wait for a freshly created CRD to become established (seconds)
pub const DEFAULT_CRD_READY_TIMEOUT_SECS: u64 = 30;

/// Annotation placed on the backing object so the empty `data` map is kept
pub const RETAIN_DATA_ANNOTATION: &str = "storageDoNotOmitempty";

/// Value of [`RETAIN_DATA_ANNOTATION`]
pub const RETAIN_DATA_ANNOTATION_VALUE: &str = "non-empty";

/// Content type for JSON merge patches (RFC 7386)
pub const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// Separator between key segments
pub const KEY_SEPARATOR: char = '/';
