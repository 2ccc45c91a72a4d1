//! Runs alone in its own binary so that no other test owns children.

use nix::errno::Errno;
use nix::sched::CloneFlags;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use vessel_namespace::{IsolatedLauncher, NamespaceKind};

#[test]
fn test_failed_launch_leaves_nothing_to_reap() {
    let launcher = IsolatedLauncher::new(NamespaceKind::Mount.into())
        .with_clone_flags(CloneFlags::CLONE_FS);

    let err = launcher.launch(|| 0).unwrap_err();
    assert!(err.is_creation_failure(), "{err}");

    let reaped = waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG));
    assert_eq!(reaped, Err(Errno::ECHILD));
}
