use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("not initialized: run 'forge init'")]
    NotInitialized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid name '{0}': must be kebab-case (lowercase alphanumeric with hyphens)")]
    InvalidName(String),

    #[error("invalid scale level {0}: must be between 0 and 4")]
    InvalidScaleLevel(u8),

    #[error("{kind} already exists: {id}")]
    DuplicateEntity { kind: &'static str, id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("operation '{operation}' failed and was rolled back: {cause}")]
    OperationFailed { operation: String, cause: String },

    #[error(
        "CRITICAL: operation '{operation}' failed ({cause}) and rollback also failed \
         ({rollback_cause}); manual intervention required"
    )]
    CriticalInconsistency {
        operation: String,
        cause: String,
        rollback_cause: String,
    },

    #[error("automatic operations halted after a critical inconsistency; manual intervention required")]
    Halted,

    #[error("session lock not acquired after {waited_ms}ms")]
    LockTimeout { waited_ms: u64 },

    #[error("git {command} failed: {stderr}")]
    VersionControl { command: String, stderr: String },

    #[error("git binary not found on PATH")]
    GitNotFound,

    #[error("invalid status '{0}': expected todo, in_progress, done, or blocked")]
    InvalidStatus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    /// True when the caller may retry after fixing input or backing off.
    /// `CriticalInconsistency` is the one state that must never be retried
    /// automatically.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ForgeError::CriticalInconsistency { .. } | ForgeError::Halted
        )
    }

    /// True for pre-flight failures that are guaranteed to have had zero
    /// side effects.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ForgeError::Validation(_)
                | ForgeError::InvalidName(_)
                | ForgeError::InvalidScaleLevel(_)
                | ForgeError::DuplicateEntity { .. }
                | ForgeError::NotFound { .. }
                | ForgeError::InvalidStatus(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_inconsistency_is_not_retryable() {
        let err = ForgeError::CriticalInconsistency {
            operation: "create_feature".into(),
            cause: "db insert failed".into(),
            rollback_cause: "reset failed".into(),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_preflight());
    }

    #[test]
    fn validation_errors_are_preflight_and_retryable() {
        let err = ForgeError::InvalidName("Bad_Name".into());
        assert!(err.is_retryable());
        assert!(err.is_preflight());
    }

    #[test]
    fn operation_failed_is_retryable_but_not_preflight() {
        let err = ForgeError::OperationFailed {
            operation: "create_feature".into(),
            cause: "disk full".into(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_preflight());
    }
}
