//! Minimal process supervisor for tests: reaps launched children.

#![allow(dead_code)]

use nix::sys::wait::{waitpid, WaitStatus};
use vessel_namespace::ProcessHandle;

/// Wait for `pid` to terminate without blocking the async runtime
pub async fn wait_for_exit(pid: ProcessHandle) -> anyhow::Result<WaitStatus> {
    let status = tokio::task::spawn_blocking(move || waitpid(pid.as_nix_pid(), None)).await??;
    Ok(status)
}

/// Exit code of a child that terminated normally
pub async fn exit_code(pid: ProcessHandle) -> anyhow::Result<i32> {
    match wait_for_exit(pid).await? {
        WaitStatus::Exited(_, code) => Ok(code),
        other => anyhow::bail!("child {pid} did not exit normally: {other:?}"),
    }
}

pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}
