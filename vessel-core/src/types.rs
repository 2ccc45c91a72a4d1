//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an OS process.
///
/// Used both as the target of a namespace join and as the result of a
/// launch. A launched handle is owned by whoever reaps the child; this
/// type does not wait on or signal the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessHandle(i32);

impl ProcessHandle {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Handle for the calling process
    #[must_use]
    pub fn current() -> Self {
        Self(nix::unistd::getpid().as_raw())
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessHandle {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessHandle> for nix::unistd::Pid {
    fn from(handle: ProcessHandle) -> Self {
        Self::from_raw(handle.0)
    }
}
