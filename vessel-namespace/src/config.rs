//! Namespace configuration and flag sets

use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::kind::NamespaceKind;

/// Namespace configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Enable PID namespace
    pub pid: bool,

    /// Enable network namespace
    pub network: bool,

    /// Enable mount namespace
    pub mount: bool,

    /// Enable UTS namespace (hostname)
    pub uts: bool,

    /// Enable IPC namespace
    pub ipc: bool,

    /// Enable user namespace
    pub user: bool,

    /// Enable cgroup namespace
    pub cgroup: bool,
}

impl NamespaceConfig {
    /// Create an empty configuration (no namespaces)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable all namespaces (except user, which usually needs id mapping)
    #[must_use]
    pub const fn all() -> Self {
        Self {
            pid: true,
            network: true,
            mount: true,
            uts: true,
            ipc: true,
            user: false,
            cgroup: true,
        }
    }

    /// Minimal isolation (only PID and mount)
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            pid: true,
            network: false,
            mount: true,
            uts: false,
            ipc: false,
            user: false,
            cgroup: false,
        }
    }

    /// Configuration enabling exactly the given kinds
    #[must_use]
    pub fn from_kinds(kinds: impl IntoIterator<Item = NamespaceKind>) -> Self {
        let mut config = Self::new();
        for kind in kinds {
            config.set(kind, true);
        }
        config
    }

    /// Enable PID namespace
    #[must_use]
    pub const fn with_pid(mut self, enable: bool) -> Self {
        self.pid = enable;
        self
    }

    /// Enable network namespace
    #[must_use]
    pub const fn with_network(mut self, enable: bool) -> Self {
        self.network = enable;
        self
    }

    /// Enable mount namespace
    #[must_use]
    pub const fn with_mount(mut self, enable: bool) -> Self {
        self.mount = enable;
        self
    }

    /// Enable UTS namespace
    #[must_use]
    pub const fn with_uts(mut self, enable: bool) -> Self {
        self.uts = enable;
        self
    }

    /// Enable IPC namespace
    #[must_use]
    pub const fn with_ipc(mut self, enable: bool) -> Self {
        self.ipc = enable;
        self
    }

    /// Enable user namespace
    #[must_use]
    pub const fn with_user(mut self, enable: bool) -> Self {
        self.user = enable;
        self
    }

    /// Enable cgroup namespace
    #[must_use]
    pub const fn with_cgroup(mut self, enable: bool) -> Self {
        self.cgroup = enable;
        self
    }

    /// Whether `kind` is enabled
    #[must_use]
    pub const fn is_enabled(&self, kind: NamespaceKind) -> bool {
        match kind {
            NamespaceKind::User => self.user,
            NamespaceKind::Mount => self.mount,
            NamespaceKind::Uts => self.uts,
            NamespaceKind::Ipc => self.ipc,
            NamespaceKind::Pid => self.pid,
            NamespaceKind::Network => self.network,
            NamespaceKind::Cgroup => self.cgroup,
        }
    }

    /// Enable or disable `kind`
    pub const fn set(&mut self, kind: NamespaceKind, enable: bool) {
        let slot = match kind {
            NamespaceKind::User => &mut self.user,
            NamespaceKind::Mount => &mut self.mount,
            NamespaceKind::Uts => &mut self.uts,
            NamespaceKind::Ipc => &mut self.ipc,
            NamespaceKind::Pid => &mut self.pid,
            NamespaceKind::Network => &mut self.network,
            NamespaceKind::Cgroup => &mut self.cgroup,
        };
        *slot = enable;
    }

    /// Drop every enabled kind the running kernel does not support
    #[must_use]
    pub fn restrict_to(mut self, supported: &BTreeSet<NamespaceKind>) -> Self {
        for kind in NamespaceKind::ALL {
            if self.is_enabled(kind) && !supported.contains(&kind) {
                tracing::debug!(kind = %kind, "Namespace kind not supported by kernel, disabling");
                self.set(kind, false);
            }
        }
        self
    }

    /// Convert to the flag set passed to clone(2)
    #[must_use]
    pub fn to_flag_set(&self) -> NamespaceFlagSet {
        self.enabled_kinds().into_iter().collect()
    }

    /// Check if any namespaces are enabled
    #[must_use]
    pub const fn has_any(&self) -> bool {
        self.pid || self.network || self.mount || self.uts || self.ipc || self.user || self.cgroup
    }

    /// Enabled kinds, in join order
    #[must_use]
    pub fn enabled_kinds(&self) -> Vec<NamespaceKind> {
        NamespaceKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }
}

/// A set of namespace kinds encoded as kernel clone flags.
///
/// Every set bit is the flag of exactly one [`NamespaceKind`], so the set
/// always converts back to the kinds it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<NamespaceKind>", into = "Vec<NamespaceKind>")]
pub struct NamespaceFlagSet(CloneFlags);

impl NamespaceFlagSet {
    /// No namespaces
    pub const NONE: Self = Self(CloneFlags::empty());

    /// Every namespace kind
    #[must_use]
    pub fn all() -> Self {
        NamespaceKind::ALL.into_iter().collect()
    }

    /// Build from raw flag bits.
    ///
    /// Returns `None` if any bit is not the flag of a namespace kind.
    #[must_use]
    pub fn from_bits(bits: i32) -> Option<Self> {
        let flags = CloneFlags::from_bits(bits)?;
        if Self::all().0.contains(flags) {
            Some(Self(flags))
        } else {
            None
        }
    }

    /// Raw flag bits
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0.bits()
    }

    /// Flags as `nix` clone flags
    #[must_use]
    pub const fn clone_flags(self) -> CloneFlags {
        self.0
    }

    /// Check if `kind` is in the set
    #[must_use]
    pub fn contains(self, kind: NamespaceKind) -> bool {
        self.0.contains(kind.clone_flag())
    }

    /// Add `kind` to the set
    pub fn insert(&mut self, kind: NamespaceKind) {
        self.0.insert(kind.clone_flag());
    }

    /// Remove `kind` from the set
    pub fn remove(&mut self, kind: NamespaceKind) {
        self.0.remove(kind.clone_flag());
    }

    /// Check if the set is empty
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    /// Number of kinds in the set
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.bits().count_ones() as usize
    }

    /// Kinds in the set, in join order
    pub fn kinds(self) -> impl Iterator<Item = NamespaceKind> {
        NamespaceKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl Default for NamespaceFlagSet {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<NamespaceKind> for NamespaceFlagSet {
    fn from(kind: NamespaceKind) -> Self {
        Self(kind.clone_flag())
    }
}

impl FromIterator<NamespaceKind> for NamespaceFlagSet {
    fn from_iter<I: IntoIterator<Item = NamespaceKind>>(iter: I) -> Self {
        let mut set = Self::NONE;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl From<Vec<NamespaceKind>> for NamespaceFlagSet {
    fn from(kinds: Vec<NamespaceKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<NamespaceFlagSet> for Vec<NamespaceKind> {
    fn from(set: NamespaceFlagSet) -> Self {
        set.kinds().collect()
    }
}

impl From<NamespaceFlagSet> for CloneFlags {
    fn from(set: NamespaceFlagSet) -> Self {
        set.0
    }
}

impl std::ops::BitOr for NamespaceFlagSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOr<NamespaceKind> for NamespaceFlagSet {
    type Output = Self;

    fn bitor(self, rhs: NamespaceKind) -> Self {
        Self(self.0 | rhs.clone_flag())
    }
}

impl std::ops::BitAnd for NamespaceFlagSet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for NamespaceFlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, kind) in self.kinds().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{kind}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NamespaceConfig::default();
        assert!(!config.has_any());
        assert!(config.to_flag_set().is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let config = NamespaceConfig::new()
            .with_pid(true)
            .with_network(false)
            .with_uts(true);

        assert!(config.pid);
        assert!(!config.network);
        assert!(config.is_enabled(NamespaceKind::Uts));
    }

    #[test]
    fn test_flag_set_conversion() {
        let config = NamespaceConfig::new().with_pid(true).with_network(true);

        let flags = config.to_flag_set().clone_flags();
        assert!(flags.contains(CloneFlags::CLONE_NEWPID));
        assert!(flags.contains(CloneFlags::CLONE_NEWNET));
        assert!(!flags.contains(CloneFlags::CLONE_NEWNS));
    }

    #[test]
    fn test_enabled_kinds_order() {
        let config = NamespaceConfig::minimal().with_user(true);
        assert_eq!(
            config.enabled_kinds(),
            vec![NamespaceKind::User, NamespaceKind::Mount, NamespaceKind::Pid]
        );
    }

    #[test]
    fn test_restrict_to_supported() {
        let supported: BTreeSet<_> = [NamespaceKind::Mount, NamespaceKind::Uts].into();
        let config = NamespaceConfig::all().restrict_to(&supported);

        assert_eq!(
            config.enabled_kinds(),
            vec![NamespaceKind::Mount, NamespaceKind::Uts]
        );
    }

    #[test]
    fn test_flag_set_roundtrip() {
        let kinds = vec![NamespaceKind::Ipc, NamespaceKind::Cgroup];
        let set: NamespaceFlagSet = kinds.iter().copied().collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.kinds().collect::<Vec<_>>(), kinds);
        assert_eq!(NamespaceFlagSet::from_bits(set.bits()), Some(set));
    }

    #[test]
    fn test_from_bits_rejects_foreign_flags() {
        let bits = (CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_VM).bits();
        assert_eq!(NamespaceFlagSet::from_bits(bits), None);
        assert_eq!(NamespaceFlagSet::from_bits(0), Some(NamespaceFlagSet::NONE));
    }

    #[test]
    fn test_flag_set_ops() {
        let mut set = NamespaceFlagSet::from(NamespaceKind::Pid) | NamespaceKind::Network;
        assert!(set.contains(NamespaceKind::Pid));
        assert!(set.contains(NamespaceKind::Network));
        assert!(!set.contains(NamespaceKind::Mount));

        set.remove(NamespaceKind::Pid);
        assert_eq!(set, NamespaceFlagSet::from(NamespaceKind::Network));

        let both = NamespaceFlagSet::all() & set;
        assert_eq!(both, set);
    }

    #[test]
    fn test_flag_set_display() {
        let set = NamespaceFlagSet::from(NamespaceKind::Pid) | NamespaceKind::Mount;
        assert_eq!(set.to_string(), "mnt|pid");
        assert_eq!(NamespaceFlagSet::NONE.to_string(), "none");
    }

    #[test]
    fn test_config_from_json() {
        let config: NamespaceConfig =
            serde_json::from_str(r#"{"pid": true, "mount": true}"#).unwrap();
        assert_eq!(config, NamespaceConfig::minimal());
    }

    #[test]
    fn test_flag_set_serde() {
        let set = NamespaceFlagSet::from(NamespaceKind::User) | NamespaceKind::Uts;
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["user","uts"]"#);

        let back: NamespaceFlagSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
