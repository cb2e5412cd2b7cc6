//! Error types for James

use thiserror::Error;

/// Result type for James operations
pub type Result<T> = std::result::Result<T, JamesError>;

/// James error types
#[derive(Error, Debug)]
pub enum JamesError {
    #[error("Spec syntax error: {0}")]
    Syntax(String),

    #[error("Service '{0}': ram_mb is required")]
    MissingResourceLimit(String),

    #[error("Service '{service}': ram_mb {ram_mb} does not fit in bytes")]
    ResourceLimitOverflow { service: String, ram_mb: u64 },

    #[error("Service '{service}': unknown how_to_update: {policy}")]
    UnknownUpdatePolicy { service: String, policy: String },

    #[error("Service '{0}': maximum of one ingress per service exceeded")]
    ConflictingIngress(String),

    #[error("Service '{0}': global services cannot have 'replicas' defined")]
    GlobalServiceHasReplicas(String),

    #[error("Service '{0}': persistent volumes defined but no placement hostname defined")]
    PersistentVolumeWithoutPlacement(String),

    #[error(
        "Service '{0}': stateful service - define at least empty backup section if you really don't want backups"
    )]
    StatefulServiceWithoutBackup(String),

    #[error("Service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("Serialization error: {0}")]
    InternalSerialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
