//! # Storage Errors
//!
//! Kind-tagged error type shared by the provisioner, the key-value façade and
//! the store backends.
//!
//! Every variant carries a human-readable context chain. Context is prepended
//! as the error travels outwards, so the rendered message reads outermost
//! first, e.g. `searching for key=/foo: get /apis/...: not found`.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// Coarse classification callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required construction parameter is missing or malformed
    InvalidConfig,
    /// The resource being created is already present in the store
    AlreadyExists,
    /// The requested key (or store path) does not exist
    NotFound,
    /// Any other store failure: network, API status, decode, deadline
    Transport,
}

impl ErrorKind {
    /// Get a stable label for logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transport => "transport",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every fallible operation in this crate
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid configuration: {context}")]
    InvalidConfig { context: String },

    #[error("{context}: already exists")]
    AlreadyExists { context: String },

    #[error("{context}: not found")]
    NotFound { context: String },

    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StorageError {
    pub fn invalid_config(context: impl Into<String>) -> Self {
        StorageError::InvalidConfig {
            context: context.into(),
        }
    }

    pub fn already_exists(context: impl Into<String>) -> Self {
        StorageError::AlreadyExists {
            context: context.into(),
        }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        StorageError::NotFound {
            context: context.into(),
        }
    }

    pub fn transport(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        StorageError::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Get the kind tag of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            StorageError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Transport { .. } => ErrorKind::Transport,
        }
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if a caller-side retry may succeed
    ///
    /// Only transport failures are transient. Configuration errors, missing
    /// keys and conflicts will fail the same way again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Get the context chain without the kind suffix
    #[must_use]
    pub fn context_chain(&self) -> &str {
        match self {
            StorageError::InvalidConfig { context }
            | StorageError::AlreadyExists { context }
            | StorageError::NotFound { context }
            | StorageError::Transport { context, .. } => context,
        }
    }

    /// Prepend `outer` to the context chain, keeping the kind
    #[must_use]
    pub fn context(mut self, outer: impl std::fmt::Display) -> Self {
        let context = match &mut self {
            StorageError::InvalidConfig { context }
            | StorageError::AlreadyExists { context }
            | StorageError::NotFound { context }
            | StorageError::Transport { context, .. } => context,
        };
        *context = if context.is_empty() {
            outer.to_string()
        } else {
            format!("{outer}: {context}")
        };
        self
    }
}

/// Attach context to a `Result<_, StorageError>`
pub trait ResultExt<T> {
    /// Prepend a context message to the error, if any
    ///
    /// # Errors
    ///
    /// Returns the original error with the context prepended.
    fn context<C: std::fmt::Display>(self, outer: C) -> Result<T>;

    /// Lazily prepend a context message to the error, if any
    ///
    /// # Errors
    ///
    /// Returns the original error with the context prepended.
    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C: std::fmt::Display>(self, outer: C) -> Result<T> {
        self.map_err(|e| e.context(outer))
    }

    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|e| e.context(f()))
    }
}
