//! Namespace primitives demonstration
//!
//! Run with: cargo run --example namespace_demo
//! Run as root: sudo cargo run --example namespace_demo

use std::ffi::CString;

use anyhow::Context;
use nix::sys::wait::{waitpid, WaitStatus};
use tracing_subscriber::EnvFilter;
use vessel_namespace::{
    flag_for, supported, IsolatedLauncher, NamespaceConfig, NamespaceInfo, NamespaceKind,
    ProcessHandle,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    println!("🔒 Vessel Namespace Demo\n");

    demo_supported_kinds()?;
    demo_current_namespaces()?;

    if nix::unistd::geteuid().is_root() {
        println!("\n🔐 Running with root privileges - demonstrating launch and join\n");
        demo_launch()?;
    } else {
        println!("\n⚠️  Run with sudo to see launch and join demos");
    }

    Ok(())
}

fn demo_supported_kinds() -> anyhow::Result<()> {
    println!("📊 Kernel-supported namespace kinds:");
    println!("{:-<60}", "");

    let kinds = supported().context("Failed to probe /proc/self/ns")?;
    for kind in NamespaceKind::ALL {
        let flag = flag_for(kind.name())?;
        let mark = if kinds.contains(&kind) { "✅" } else { "❌" };
        println!("  {mark} {:<8} {:#010x}", kind.name(), flag.bits());
    }
    println!();
    Ok(())
}

fn demo_current_namespaces() -> anyhow::Result<()> {
    let info = NamespaceInfo::current().context("Failed to read namespace links")?;
    print!("{info}");
    Ok(())
}

fn demo_launch() -> anyhow::Result<()> {
    let config = NamespaceConfig::all().restrict_to(supported()?);
    let launcher = IsolatedLauncher::from_config(&config);
    let parent = ProcessHandle::current();
    let program = CString::new("/bin/hostname")?;

    println!("🚀 Launching /bin/hostname in: {}", launcher.namespaces());

    let pid = launcher.launch(move || {
        if nix::unistd::sethostname("vessel-demo").is_err() {
            return 1;
        }
        // Exec replaces the child; reaching the end means it failed.
        let _ = nix::unistd::execv(&program, &[&program]);
        127
    })?;
    report_exit(pid)?;

    println!("\n🔁 Launching a child that joins back into this process's namespaces");
    let mut kinds = config.enabled_kinds();
    // A child cannot move back up into its parent's pid namespace.
    kinds.retain(|kind| *kind != NamespaceKind::Pid);
    let pid = launcher.launch(move || {
        for kind in &kinds {
            if vessel_namespace::join(parent, *kind).is_err() {
                return 1;
            }
        }
        0
    })?;
    report_exit(pid)
}

fn report_exit(pid: ProcessHandle) -> anyhow::Result<()> {
    match waitpid(pid.as_nix_pid(), None)? {
        WaitStatus::Exited(_, 0) => println!("  ✅ Child {pid} exited cleanly"),
        WaitStatus::Exited(_, code) => println!("  ❌ Child {pid} exited with code {code}"),
        other => println!("  ⚠️  Child {pid} ended with {other:?}"),
    }
    Ok(())
}
