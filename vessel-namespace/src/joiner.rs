//! Joining existing namespaces with setns(2)
//!
//! A join moves only the calling thread. The kernel refuses some kinds
//! (mount, user) for callers that share state with other threads; that
//! refusal is reported as [`Error::PermissionOrState`] and is not checked
//! for up front.

use nix::errno::Errno;
use nix::sched::setns;
use std::fs::File;
use thiserror::Error;
use vessel_core::{Error, ProcessHandle, Result};

use crate::kind::NamespaceKind;
use crate::registry::NamespaceRegistry;

/// Joins the calling thread to namespaces of other processes
#[derive(Debug, Clone, Default)]
pub struct NamespaceJoiner {
    registry: NamespaceRegistry,
}

/// A sequential multi-kind join that stopped partway.
///
/// The caller stays in the namespaces listed in `joined`; nothing is
/// rolled back.
#[derive(Error, Debug)]
#[error("joining {failed} namespace of process {target} failed after joining {joined:?}: {source}")]
pub struct PartialJoinError {
    /// Process whose namespaces were being joined
    pub target: ProcessHandle,
    /// Kinds joined before the failure, in order
    pub joined: Vec<NamespaceKind>,
    /// Kind whose join failed
    pub failed: NamespaceKind,
    /// Why it failed
    #[source]
    pub source: Error,
}

impl NamespaceJoiner {
    /// Joiner reading namespace entries from `/proc`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joiner reading namespace entries through `registry`
    #[must_use]
    pub const fn with_registry(registry: NamespaceRegistry) -> Self {
        Self { registry }
    }

    /// Move the calling thread into the `kind` namespace of `target`.
    ///
    /// On failure the caller's membership for `kind` is unchanged.
    pub fn join(&self, target: ProcessHandle, kind: NamespaceKind) -> Result<()> {
        let path = self.registry.ns_path(target, kind);
        let file = File::open(&path).map_err(|e| open_error(e, target, kind))?;

        tracing::debug!(
            target_pid = %target,
            kind = %kind,
            path = %path.display(),
            "Joining namespace"
        );

        setns(&file, kind.clone_flag()).map_err(|errno| {
            tracing::debug!(
                target_pid = %target,
                kind = %kind,
                error = %errno,
                "setns refused"
            );
            setns_error(errno, target, kind)
        })
    }

    /// [`join`](Self::join) with the kind given by name
    pub fn join_by_name(&self, target: ProcessHandle, name: &str) -> Result<()> {
        let kind = NamespaceKind::from_name(name)?;
        self.join(target, kind)
    }

    /// Join several kinds one after another, user namespace first.
    ///
    /// This is not transactional: a failure leaves the caller in the kinds
    /// already joined, which the error lists. Callers that need all kinds
    /// at once should launch a fresh child instead.
    pub fn join_all(
        &self,
        target: ProcessHandle,
        kinds: impl IntoIterator<Item = NamespaceKind>,
    ) -> std::result::Result<(), PartialJoinError> {
        let mut ordered: Vec<_> = kinds.into_iter().collect();
        ordered.sort_unstable();
        ordered.dedup();

        let mut joined = Vec::with_capacity(ordered.len());
        for kind in ordered {
            if let Err(source) = self.join(target, kind) {
                return Err(PartialJoinError {
                    target,
                    joined,
                    failed: kind,
                    source,
                });
            }
            joined.push(kind);
        }

        Ok(())
    }
}

/// Move the calling thread into the `kind` namespace of `target`
pub fn join(target: ProcessHandle, kind: NamespaceKind) -> Result<()> {
    NamespaceJoiner::new().join(target, kind)
}

/// Move the calling thread into the namespace named `name` of `target`
pub fn join_by_name(target: ProcessHandle, name: &str) -> Result<()> {
    NamespaceJoiner::new().join_by_name(target, name)
}

fn open_error(err: std::io::Error, target: ProcessHandle, kind: NamespaceKind) -> Error {
    match err.raw_os_error().map(Errno::from_raw) {
        Some(Errno::ENOENT | Errno::ESRCH) => Error::NotFound {
            what: format!("{kind} namespace of process {target}"),
        },
        Some(errno @ (Errno::EACCES | Errno::EPERM)) => Error::PermissionOrState {
            operation: format!("open {kind} namespace of process {target}"),
            errno,
        },
        _ => Error::Io(err),
    }
}

fn setns_error(errno: Errno, target: ProcessHandle, kind: NamespaceKind) -> Error {
    let operation = format!("setns into {kind} namespace of process {target}");
    match errno {
        Errno::EPERM | Errno::EINVAL => Error::PermissionOrState { operation, errno },
        Errno::ENOMEM => Error::ResourceExhausted { operation, errno },
        _ => Error::System(errno),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_unknown_kind_name() {
        let err = join_by_name(ProcessHandle::current(), "time").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_target_process() {
        let root = tempfile::tempdir().unwrap();
        let joiner = NamespaceJoiner::with_registry(NamespaceRegistry::with_proc_root(root.path()));

        let err = joiner
            .join(ProcessHandle::from_raw(999_999), NamespaceKind::Uts)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_setns_error_mapping() {
        let target = ProcessHandle::from_raw(1);

        assert!(setns_error(Errno::EINVAL, target, NamespaceKind::Mount).is_permission_or_state());
        assert!(setns_error(Errno::EPERM, target, NamespaceKind::Network).is_permission_or_state());
        assert!(matches!(
            setns_error(Errno::ENOMEM, target, NamespaceKind::Pid),
            Error::ResourceExhausted { .. }
        ));
        assert!(matches!(
            setns_error(Errno::EBADF, target, NamespaceKind::Pid),
            Error::System(Errno::EBADF)
        ));
    }

    #[test]
    fn test_open_error_mapping() {
        let target = ProcessHandle::from_raw(1);
        let kind = NamespaceKind::Ipc;

        let err = io::Error::from_raw_os_error(Errno::EACCES as i32);
        assert!(open_error(err, target, kind).is_permission_or_state());

        let err = io::Error::from_raw_os_error(Errno::ENOENT as i32);
        assert!(open_error(err, target, kind).is_not_found());

        let err = io::Error::from_raw_os_error(Errno::EIO as i32);
        assert!(matches!(open_error(err, target, kind), Error::Io(_)));
    }

    #[test]
    fn test_join_all_reports_progress() {
        let root = tempfile::tempdir().unwrap();
        let joiner = NamespaceJoiner::with_registry(NamespaceRegistry::with_proc_root(root.path()));

        let err = joiner
            .join_all(
                ProcessHandle::from_raw(999_999),
                [NamespaceKind::Pid, NamespaceKind::User],
            )
            .unwrap_err();

        assert!(err.joined.is_empty());
        assert_eq!(err.failed, NamespaceKind::User);
        assert!(err.source.is_not_found());
    }
}
