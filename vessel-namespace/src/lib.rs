//! Linux namespace primitives for process isolation
//!
//! This crate provides the layer a container runtime is built on:
//! - Discovering which namespace kinds the kernel supports
//! - Joining the namespaces of an existing process (setns)
//! - Launching a child straight into new namespaces (clone)
//!
//! Supported kinds: mount, UTS, IPC, PID, network, user and cgroup.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod joiner;
pub mod kind;
pub mod launcher;
pub mod registry;

pub use config::{NamespaceConfig, NamespaceFlagSet};
pub use joiner::{join, join_by_name, NamespaceJoiner, PartialJoinError};
pub use kind::NamespaceKind;
pub use launcher::{launch, IsolatedLauncher, STACK_SIZE};
pub use registry::{discover, flag_for, supported, NamespaceId, NamespaceInfo, NamespaceRegistry};

pub use vessel_core::{Error, ProcessHandle, Result};
