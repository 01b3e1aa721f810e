//! Error types shared across the Gantry control plane and runtime
//!
//! Errors carry contextual fields (component names, namespaces, categories)
//! to aid debugging in production.

use thiserror::Error;

/// Main error type for Gantry operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A single component/subscription document failed to deserialize.
    ///
    /// Loaders treat this as recoverable: the item is skipped and the batch
    /// continues.
    #[error("decode error for {kind}: {message}")]
    Decode {
        /// Resource kind being decoded
        kind: String,
        /// Description of what failed
        message: String,
    },

    /// A secret reference could not be resolved from the cluster.
    ///
    /// Aborts the enclosing list/stream operation.
    #[error("secret resolution error for {secret} in {namespace}: {message}")]
    SecretResolution {
        /// Name of the secret being fetched
        secret: String,
        /// Namespace the fetch targeted
        namespace: String,
        /// Description of what failed
        message: String,
    },

    /// An outbound stream send failed with a transport-unavailable code.
    ///
    /// Terminates the affected stream only.
    #[error("transport unavailable: {message}")]
    TransportUnavailable {
        /// Description of what failed
        message: String,
    },

    /// An annotation value could not be parsed and has no usable default
    #[error("annotation parse error for {key}: {message}")]
    AnnotationParse {
        /// Annotation key that failed to parse
        key: String,
        /// Description of what failed
        message: String,
    },

    /// Validation error for identifiers or resource specs
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// I/O error with context
    #[error("io error [{context}]: {source}")]
    Io {
        /// Where the error occurred (e.g. a file path)
        context: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "api", "loader", "watcher")
        context: String,
    },
}

impl Error {
    /// Create a decode error for the given resource kind
    pub fn decode(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a secret resolution error with secret and namespace context
    pub fn secret_for(
        secret: impl Into<String>,
        namespace: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::SecretResolution {
            secret: secret.into(),
            namespace: namespace.into(),
            message: msg.into(),
        }
    }

    /// Create a transport-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            message: msg.into(),
        }
    }

    /// Create an annotation parse error for the given key
    pub fn annotation(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::AnnotationParse {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether the enclosing batch operation may continue past this error.
    ///
    /// Decode errors are per-item and recoverable; secret resolution and
    /// transport errors abort their operation/stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::AnnotationParse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_recoverable() {
        let err = Error::decode("Component", "unexpected key");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("Component"));
    }

    #[test]
    fn secret_errors_abort_the_batch() {
        let err = Error::secret_for("redis-password", "prod", "not found");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("redis-password"));
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn transport_unavailable_is_terminal_for_stream() {
        let err = Error::unavailable("connection reset");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("transport unavailable"));
    }

    #[test]
    fn annotation_errors_name_the_key() {
        let err = Error::annotation("gantry.dev/app-port", "invalid digit");
        assert!(err.to_string().contains("gantry.dev/app-port"));
        assert!(err.is_recoverable());
    }
}
