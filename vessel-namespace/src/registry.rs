//! Kernel namespace support discovery and namespace identities
//!
//! The kernel exposes one entry per namespace kind under `/proc/<pid>/ns`.
//! A kind the kernel was built without simply has no entry there, which
//! [`NamespaceRegistry::discover`] reports as absence rather than an error.

use nix::sched::CloneFlags;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use vessel_core::{Error, ProcessHandle, Result};

use crate::kind::NamespaceKind;

/// Default procfs mount point
pub const PROC_ROOT: &str = "/proc";

/// Reads namespace information from a procfs mount
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    proc_root: PathBuf,
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceRegistry {
    /// Registry backed by `/proc`
    #[must_use]
    pub fn new() -> Self {
        Self::with_proc_root(PROC_ROOT)
    }

    /// Registry backed by a procfs mounted elsewhere
    #[must_use]
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// The procfs root this registry reads from
    #[must_use]
    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    /// Directory holding the namespace entries of `pid`
    #[must_use]
    pub fn ns_dir(&self, pid: ProcessHandle) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("ns")
    }

    /// Path of the `kind` entry of `pid`
    #[must_use]
    pub fn ns_path(&self, pid: ProcessHandle, kind: NamespaceKind) -> PathBuf {
        self.ns_dir(pid).join(kind.name())
    }

    /// Namespace kinds supported by the running kernel.
    ///
    /// Lists `<proc_root>/self/ns` and keeps the entries that name a known
    /// kind. Fails only if that directory cannot be read.
    pub fn discover(&self) -> Result<BTreeSet<NamespaceKind>> {
        let dir = self.proc_root.join("self").join("ns");
        let kinds = discover_in(&dir)?;

        tracing::debug!(
            dir = %dir.display(),
            kinds = ?kinds,
            "Discovered namespace kinds"
        );

        Ok(kinds)
    }

    /// Identity of the `kind` namespace `pid` currently belongs to
    pub fn namespace_id(&self, pid: ProcessHandle, kind: NamespaceKind) -> Result<NamespaceId> {
        read_namespace_id(&self.ns_path(pid, kind), kind)
    }

    /// Snapshot of every namespace identity of `pid`.
    ///
    /// Kinds the kernel does not expose are left out of the snapshot.
    pub fn namespace_info(&self, pid: ProcessHandle) -> Result<NamespaceInfo> {
        snapshot(pid, &self.ns_dir(pid))
    }

    /// Snapshot of the calling process, read through `<proc_root>/self`.
    ///
    /// Inside a new pid namespace `getpid()` no longer names the caller in
    /// the procfs it still sees, so the pid is only recorded, never looked up.
    pub fn self_namespace_info(&self) -> Result<NamespaceInfo> {
        snapshot(
            ProcessHandle::current(),
            &self.proc_root.join("self").join("ns"),
        )
    }
}

fn read_namespace_id(path: &Path, kind: NamespaceKind) -> Result<NamespaceId> {
    let target = std::fs::read_link(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            what: format!("{kind} namespace at {}", path.display()),
        },
        _ => Error::Io(e),
    })?;

    NamespaceId::parse(kind, &target.to_string_lossy())
}

fn snapshot(pid: ProcessHandle, dir: &Path) -> Result<NamespaceInfo> {
    let mut ids = BTreeMap::new();

    for kind in NamespaceKind::ALL {
        match read_namespace_id(&dir.join(kind.name()), kind) {
            Ok(id) => {
                ids.insert(kind, id);
            }
            Err(Error::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    if ids.is_empty() && !dir.exists() {
        return Err(Error::NotFound {
            what: format!("process {pid}"),
        });
    }

    Ok(NamespaceInfo { pid, ids })
}

/// Namespace kinds listed in `dir`, a `/proc/<pid>/ns` style directory
pub fn discover_in(dir: &Path) -> Result<BTreeSet<NamespaceKind>> {
    let mut present = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        present.insert(entry?.file_name());
    }

    Ok(NamespaceKind::ALL
        .into_iter()
        .filter(|kind| present.contains(std::ffi::OsStr::new(kind.name())))
        .collect())
}

/// Namespace kinds supported by the running kernel, via `/proc`
pub fn discover() -> Result<BTreeSet<NamespaceKind>> {
    NamespaceRegistry::new().discover()
}

/// Cached result of [`discover`].
///
/// The probe runs on the first successful call; support does not change
/// while the process runs.
pub fn supported() -> Result<&'static BTreeSet<NamespaceKind>> {
    static SUPPORTED: OnceLock<BTreeSet<NamespaceKind>> = OnceLock::new();

    if let Some(kinds) = SUPPORTED.get() {
        return Ok(kinds);
    }
    let kinds = discover()?;
    Ok(SUPPORTED.get_or_init(|| kinds))
}

/// Kernel flag for the namespace kind called `name`.
///
/// This is a static table lookup and does not depend on kernel support.
pub fn flag_for(name: &str) -> Result<CloneFlags> {
    NamespaceKind::from_name(name).map(NamespaceKind::clone_flag)
}

/// Identity of a namespace, as exposed by its `kind:[inode]` link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId {
    /// Namespace kind
    pub kind: NamespaceKind,
    /// Inode number of the namespace on nsfs
    pub inode: u64,
}

impl NamespaceId {
    /// Parse a link target such as `net:[4026531905]`
    pub fn parse(kind: NamespaceKind, target: &str) -> Result<Self> {
        let inode = target
            .strip_prefix(kind.name())
            .and_then(|rest| rest.strip_prefix(":["))
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|digits| digits.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed {kind} namespace link '{target}'"),
                ))
            })?;

        Ok(Self { kind, inode })
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.kind, self.inode)
    }
}

/// Namespace identities of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pid: ProcessHandle,
    ids: BTreeMap<NamespaceKind, NamespaceId>,
}

impl NamespaceInfo {
    /// Snapshot for `pid` read from `/proc`
    pub fn for_process(pid: ProcessHandle) -> Result<Self> {
        NamespaceRegistry::new().namespace_info(pid)
    }

    /// Snapshot for the calling process, valid inside a new pid namespace
    pub fn current() -> Result<Self> {
        NamespaceRegistry::new().self_namespace_info()
    }

    /// Process the snapshot was taken of
    #[must_use]
    pub const fn pid(&self) -> ProcessHandle {
        self.pid
    }

    /// Identity of the `kind` namespace, if the kernel exposes it
    #[must_use]
    pub fn get(&self, kind: NamespaceKind) -> Option<NamespaceId> {
        self.ids.get(&kind).copied()
    }

    /// Whether both snapshots show the same `kind` namespace
    #[must_use]
    pub fn shares_with(&self, other: &Self, kind: NamespaceKind) -> bool {
        matches!((self.get(kind), other.get(kind)), (Some(a), Some(b)) if a == b)
    }

    /// Kinds in which this process is in a different namespace than `other`
    #[must_use]
    pub fn differing_kinds(&self, other: &Self) -> BTreeSet<NamespaceKind> {
        self.ids
            .keys()
            .copied()
            .filter(|kind| !self.shares_with(other, *kind))
            .collect()
    }
}

impl fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Namespace Info (PID {}):", self.pid)?;
        for (kind, id) in &self.ids {
            let label = format!("{}:", kind.name().to_uppercase());
            writeln!(f, "  {label:<8}{id}")?;
        }
        Ok(())
    }
}
