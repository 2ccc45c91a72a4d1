//! Namespace kinds and their kernel ABI flags

use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vessel_core::{Error, Result};

/// A Linux namespace kind.
///
/// Variants are declared in join order, so sorted collections of kinds
/// iterate with the user namespace first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum NamespaceKind {
    /// User and group id mapping
    User,
    /// Mount table
    Mount,
    /// Hostname and domain name
    Uts,
    /// System V IPC objects and POSIX message queues
    Ipc,
    /// Process id space
    Pid,
    /// Network stack
    Network,
    /// Cgroup hierarchy root
    Cgroup,
}

/// Every kind with its `/proc/<pid>/ns` entry name and clone flag, indexed
/// by discriminant. The user namespace comes first: privilege gained inside
/// it is what allows joining the others.
const KIND_TABLE: [(NamespaceKind, &str, CloneFlags); 7] = [
    (NamespaceKind::User, "user", CloneFlags::CLONE_NEWUSER),
    (NamespaceKind::Mount, "mnt", CloneFlags::CLONE_NEWNS),
    (NamespaceKind::Uts, "uts", CloneFlags::CLONE_NEWUTS),
    (NamespaceKind::Ipc, "ipc", CloneFlags::CLONE_NEWIPC),
    (NamespaceKind::Pid, "pid", CloneFlags::CLONE_NEWPID),
    (NamespaceKind::Network, "net", CloneFlags::CLONE_NEWNET),
    (NamespaceKind::Cgroup, "cgroup", CloneFlags::CLONE_NEWCGROUP),
];

impl NamespaceKind {
    /// All kinds, in join order
    pub const ALL: [Self; 7] = [
        Self::User,
        Self::Mount,
        Self::Uts,
        Self::Ipc,
        Self::Pid,
        Self::Network,
        Self::Cgroup,
    ];

    const fn entry(self) -> (Self, &'static str, CloneFlags) {
        KIND_TABLE[self as usize]
    }

    /// Canonical short name, identical to the `/proc/<pid>/ns` entry
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.entry().1
    }

    /// Kernel clone/setns flag for this kind
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        self.entry().2
    }

    /// Look up a kind by name.
    ///
    /// Accepts the canonical short names plus `mount` and `network`.
    pub fn from_name(name: &str) -> Result<Self> {
        let name = match name {
            "mount" => "mnt",
            "network" => "net",
            other => other,
        };

        KIND_TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(kind, _, _)| *kind)
            .ok_or_else(|| Error::NotFound {
                what: format!("namespace kind '{name}'"),
            })
    }

    /// Kind whose flag is exactly `flag`
    #[must_use]
    pub fn from_flag(flag: CloneFlags) -> Option<Self> {
        KIND_TABLE
            .iter()
            .find(|(_, _, f)| *f == flag)
            .map(|(kind, _, _)| *kind)
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NamespaceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl TryFrom<String> for NamespaceKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::from_name(&s)
    }
}

impl From<NamespaceKind> for &'static str {
    fn from(kind: NamespaceKind) -> Self {
        kind.name()
    }
}

impl From<NamespaceKind> for CloneFlags {
    fn from(kind: NamespaceKind) -> Self {
        kind.clone_flag()
    }
}
