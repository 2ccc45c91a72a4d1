//! Error types for Vessel

use nix::errno::Errno;
use thiserror::Error;

/// Vessel error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown namespace kind, or a process/namespace entry that does not exist
    #[error("Not found: {what}")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// Insufficient privilege, or the caller is in a state the kernel refuses
    /// (for example a multi-threaded caller of setns)
    #[error("Operation refused: {operation}: {errno}")]
    PermissionOrState {
        /// Operation that was refused
        operation: String,
        /// Underlying OS error
        #[source]
        errno: Errno,
    },

    /// Process table, memory or namespace nesting limits were hit
    #[error("Resources exhausted: {operation}: {errno}")]
    ResourceExhausted {
        /// Operation that ran out of resources
        operation: String,
        /// Underlying OS error
        #[source]
        errno: Errno,
    },

    /// A new execution context could not be created
    #[error("Creation failed: {message}: {errno}")]
    Creation {
        /// Error message
        message: String,
        /// Underlying OS error
        #[source]
        errno: Errno,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),
}

impl Error {
    /// The OS error code behind this error, when there is one
    #[must_use]
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::PermissionOrState { errno, .. }
            | Self::ResourceExhausted { errno, .. }
            | Self::Creation { errno, .. } => Some(*errno),
            Self::System(errno) => Some(*errno),
            Self::Io(err) => err.raw_os_error().map(Errno::from_raw),
            Self::NotFound { .. } | Self::InvalidConfig { .. } => None,
        }
    }

    /// Whether this error means a launch produced no child at all
    #[must_use]
    pub const fn is_creation_failure(&self) -> bool {
        matches!(self, Self::Creation { .. } | Self::ResourceExhausted { .. })
    }

    /// Whether the kernel refused the operation for privilege or caller-state reasons
    #[must_use]
    pub const fn is_permission_or_state(&self) -> bool {
        matches!(self, Self::PermissionOrState { .. })
    }

    /// Whether the error is a lookup miss
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for Vessel operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_accessor() {
        let err = Error::Creation {
            message: "clone".to_string(),
            errno: Errno::EINVAL,
        };
        assert_eq!(err.errno(), Some(Errno::EINVAL));
        assert!(err.is_creation_failure());

        let err = Error::NotFound {
            what: "namespace kind 'bogus'".to_string(),
        };
        assert_eq!(err.errno(), None);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_io_errno() {
        let err = Error::from(std::io::Error::from_raw_os_error(Errno::ENOENT as i32));
        assert_eq!(err.errno(), Some(Errno::ENOENT));
    }

    #[test]
    fn test_display() {
        let err = Error::PermissionOrState {
            operation: "setns mnt".to_string(),
            errno: Errno::EINVAL,
        };
        let msg = err.to_string();
        assert!(msg.contains("setns mnt"));
        assert!(err.is_permission_or_state());
        assert!(!err.is_creation_failure());
    }
}
