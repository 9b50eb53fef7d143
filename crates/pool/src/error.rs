//! Error types for pool operations
use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by a [`Manager`](crate::Manager) callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for pool operations
#[derive(Error, Debug)]
pub enum Error {
    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// No resource became available before the acquire deadline
    #[error(
        "No resource available for '{resource_id}' after {waited_ms}ms: {total}/{maximum} in use"
    )]
    Timeout {
        /// The resource identifier
        resource_id: String,
        /// How long the caller waited, in milliseconds
        waited_ms: u64,
        /// Resources in existence when the wait gave up
        total: usize,
        /// Configured capacity
        maximum: usize,
    },

    /// The manager failed to create a resource
    #[error("Failed to create resource '{resource_id}': {source}")]
    Create {
        /// The resource identifier
        resource_id: String,
        /// The manager's error
        #[source]
        source: BoxError,
    },

    /// The manager rejected a resource on release; it was destroyed
    #[error("Failed to recycle resource '{resource_id}': {source}")]
    Recycle {
        /// The resource identifier
        resource_id: String,
        /// The manager's error
        #[source]
        source: BoxError,
    },

    /// The pool has been shut down
    #[error("Pool for '{resource_id}' is closed")]
    Closed {
        /// The resource identifier
        resource_id: String,
    },

    /// A background thread could not be started
    #[error("Failed to spawn '{name}' thread: {source}")]
    Spawn {
        /// Thread name
        name: String,
        /// The OS error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn create<E>(resource_id: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Create {
            resource_id: resource_id.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn recycle<E>(resource_id: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Recycle {
            resource_id: resource_id.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn closed(resource_id: &str) -> Self {
        Self::Closed {
            resource_id: resource_id.to_string(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Only an exhausted pool is worth retrying; the pool itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get the resource ID associated with this error (if any)
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } | Self::Spawn { .. } => None,
            Self::Timeout { resource_id, .. }
            | Self::Create { resource_id, .. }
            | Self::Recycle { resource_id, .. }
            | Self::Closed { resource_id } => Some(resource_id),
        }
    }
}
