use nix::errno::Errno;
use vessel_core::*;

#[test]
fn test_process_handle_display() {
    let handle = ProcessHandle::from_raw(1);
    assert_eq!(format!("{}", handle), "1");
}

#[test]
fn test_process_handle_nix_roundtrip() {
    let pid = nix::unistd::getpid();
    let handle = ProcessHandle::from(pid);

    assert_eq!(handle, ProcessHandle::current());
    assert_eq!(nix::unistd::Pid::from(handle), pid);
}

#[test]
fn test_error_from_nix() {
    let err: Error = Errno::ESRCH.into();

    assert!(matches!(err, Error::System(Errno::ESRCH)));
    assert_eq!(err.errno(), Some(Errno::ESRCH));
}

#[test]
fn test_resource_exhausted_is_creation_failure() {
    let err = Error::ResourceExhausted {
        operation: "clone".to_string(),
        errno: Errno::EAGAIN,
    };

    assert!(err.is_creation_failure());
    assert!(err.to_string().contains("clone"));
}

#[test]
fn test_invalid_config_message() {
    let err = Error::InvalidConfig {
        message: "unknown namespace kind".to_string(),
    };

    assert_eq!(
        err.to_string(),
        "Invalid configuration: unknown namespace kind"
    );
    assert_eq!(err.errno(), None);
}
