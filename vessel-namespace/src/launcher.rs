//! Launching processes into new namespaces with clone(2)
//!
//! This module uses `unsafe` for clone(), which starts the child directly
//! inside a caller-supplied routine rather than duplicating and replacing
//! the parent.

#![allow(unsafe_code)]

use nix::errno::Errno;
use nix::sched::{clone, CloneCb, CloneFlags};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, TryLockError};
use vessel_core::{Error, ProcessHandle, Result};

use crate::config::{NamespaceConfig, NamespaceFlagSet};

/// Size of the stack a launched child starts on
pub const STACK_SIZE: usize = 8 * 1024 * 1024;

/// Exit status of a child whose entry routine panicked
pub const PANIC_EXIT_STATUS: i32 = 101;

/// Non-namespace clone flags a launch may add.
///
/// Anything sharing the address space, signal handlers or thread group
/// with the parent is excluded: the child must own its copy of the stack
/// and of the entry routine.
pub const ALLOWED_EXTRA_FLAGS: CloneFlags = CloneFlags::CLONE_FS
    .union(CloneFlags::CLONE_FILES)
    .union(CloneFlags::CLONE_SYSVSEM)
    .union(CloneFlags::CLONE_IO)
    .union(CloneFlags::CLONE_PTRACE)
    .union(CloneFlags::CLONE_UNTRACED);

struct ChildStack([u8; STACK_SIZE]);

static CHILD_STACK: Mutex<ChildStack> = Mutex::new(ChildStack([0; STACK_SIZE]));

/// Launches entry routines in new processes placed in new namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolatedLauncher {
    namespaces: NamespaceFlagSet,
    extra_flags: CloneFlags,
}

impl IsolatedLauncher {
    /// Launcher creating the namespaces in `namespaces`
    #[must_use]
    pub const fn new(namespaces: NamespaceFlagSet) -> Self {
        Self {
            namespaces,
            extra_flags: CloneFlags::empty(),
        }
    }

    /// Launcher creating the namespaces enabled in `config`
    #[must_use]
    pub fn from_config(config: &NamespaceConfig) -> Self {
        Self::new(config.to_flag_set())
    }

    /// Add non-namespace clone flags.
    ///
    /// Flags outside [`ALLOWED_EXTRA_FLAGS`] make [`launch`](Self::launch)
    /// fail without creating anything.
    #[must_use]
    pub const fn with_clone_flags(mut self, flags: CloneFlags) -> Self {
        self.extra_flags = flags;
        self
    }

    /// Namespaces a launched child is created in
    #[must_use]
    pub const fn namespaces(&self) -> NamespaceFlagSet {
        self.namespaces
    }

    /// Flags handed to clone(2), without the exit signal
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        self.namespaces.clone_flags() | self.extra_flags
    }

    /// Start a child in new namespaces running `entry`.
    ///
    /// The child begins inside `entry` with no further setup. Its return
    /// value becomes the exit status unless it execs first; a panic exits
    /// with [`PANIC_EXIT_STATUS`]. The parent gets the handle back as soon
    /// as the child exists and never waits for or reaps it; whoever holds
    /// the handle must. On error no child exists.
    pub fn launch<F>(&self, entry: F) -> Result<ProcessHandle>
    where
        F: FnOnce() -> i32,
    {
        let refused = self.extra_flags.difference(ALLOWED_EXTRA_FLAGS);
        if !refused.is_empty() {
            return Err(Error::Creation {
                message: format!("clone flags {refused:?} are not allowed for a launch"),
                errno: Errno::EINVAL,
            });
        }

        let flags = self.clone_flags();
        tracing::debug!(
            namespaces = %self.namespaces,
            flags = ?flags,
            "Launching isolated process"
        );

        let mut entry = Some(entry);
        let callback: CloneCb<'_> = Box::new(move || {
            let status = entry.take().map_or(PANIC_EXIT_STATUS, |entry| {
                panic::catch_unwind(AssertUnwindSafe(entry)).unwrap_or(PANIC_EXIT_STATUS)
            });
            status as isize
        });

        let result = with_child_stack(|stack| {
            // SAFETY: the flags never include CLONE_VM (see ALLOWED_EXTRA_FLAGS),
            // so the child runs on its own copy of `stack` and of `callback`.
            // Both stay alive in the parent until clone returns.
            unsafe { clone(callback, stack, flags, Some(libc::SIGCHLD)) }
        });

        match result {
            Ok(pid) => {
                tracing::info!(
                    pid = %pid,
                    namespaces = %self.namespaces,
                    "Launched isolated process"
                );
                Ok(ProcessHandle::from(pid))
            }
            Err(errno) => {
                tracing::error!(
                    error = %errno,
                    namespaces = %self.namespaces,
                    "Failed to launch isolated process"
                );
                Err(launch_error(errno, self.namespaces))
            }
        }
    }
}

/// Start a child in the namespaces of `namespaces` running `entry`.
///
/// See [`IsolatedLauncher::launch`].
pub fn launch<F>(namespaces: NamespaceFlagSet, entry: F) -> Result<ProcessHandle>
where
    F: FnOnce() -> i32,
{
    IsolatedLauncher::new(namespaces).launch(entry)
}

/// Run `f` on the static child stack, or on a fresh one if another launch
/// holds it. Inside a launched child the static stack always looks held.
fn with_child_stack<T>(f: impl FnOnce(&mut [u8]) -> T) -> T {
    match CHILD_STACK.try_lock() {
        Ok(mut stack) => f(&mut stack.0),
        Err(TryLockError::Poisoned(poisoned)) => f(&mut poisoned.into_inner().0),
        Err(TryLockError::WouldBlock) => {
            tracing::debug!("Static child stack busy, allocating a private one");
            let mut stack = vec![0u8; STACK_SIZE];
            f(&mut stack)
        }
    }
}

fn launch_error(errno: Errno, namespaces: NamespaceFlagSet) -> Error {
    match errno {
        Errno::EAGAIN | Errno::ENOMEM | Errno::ENOSPC => Error::ResourceExhausted {
            operation: format!("clone into namespaces {namespaces}"),
            errno,
        },
        _ => Error::Creation {
            message: format!("clone into namespaces {namespaces}"),
            errno,
        },
    }
}
