//! Error taxonomy for the fuzz capture pipeline.

use thiserror::Error;

/// Errors produced by the fuzzcatch pipeline.
///
/// Negative fuzz outcomes (engine exited cleanly, no new corpus file) are
/// not errors; they are returned as structured results by the pipeline.
#[derive(Debug, Error)]
pub enum FuzzcatchError {
    /// The go toolchain could not be invoked or produced unusable output.
    #[error("go toolchain error: {0}")]
    Toolchain(String),

    /// A git invocation could not start or exited unexpectedly.
    #[error("git error: {0}")]
    Git(String),

    /// Invalid or missing configuration, caught before any remote call.
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote rejected a mutation because the credential lacks write
    /// access to the repository.
    #[error("failed to {action}: the token does not have write access to the repository")]
    RemotePermission { action: &'static str },

    /// The remote rejected a mutation because the target already exists.
    ///
    /// Raised only by branch creation, where the pull-request publisher
    /// intercepts it and converts it into a `found: false` result.
    #[error("failed to {action}: target already exists")]
    RemoteConflict { action: &'static str },

    /// Any other remote-reported failure. The remote's own error messages
    /// are logged at error level before this is raised.
    #[error("failed to {action}")]
    Remote { action: &'static str },

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fuzzcatch operations.
pub type Result<T> = std::result::Result<T, FuzzcatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_names_the_failed_action() {
        let err = FuzzcatchError::Remote {
            action: "get repository id",
        };
        assert_eq!(err.to_string(), "failed to get repository id");

        let err = FuzzcatchError::Remote {
            action: "create a pull request",
        };
        assert_eq!(err.to_string(), "failed to create a pull request");
    }

    #[test]
    fn test_permission_error_hints_at_write_access() {
        let err = FuzzcatchError::RemotePermission {
            action: "create a branch",
        };
        let msg = err.to_string();
        assert!(msg.contains("failed to create a branch"));
        assert!(msg.contains("write access"));
    }

    #[test]
    fn test_toolchain_error_display() {
        let err = FuzzcatchError::Toolchain("failed to run go: not found".to_string());
        assert!(err.to_string().contains("go toolchain error"));
    }
}
