//! Child processes for process agents, confined in a cgroup v2 where the platform allows it.
//!
//! [`LimitedProcess`] owns the child: dropping it kills the child (and removes its cgroup).

#[cfg(target_os = "linux")]
mod cgroup_manager_linux;

#[cfg(target_os = "linux")]
pub use cgroup_manager_linux::*;

#[cfg(not(target_os = "linux"))]
mod cgroup_manager_stub;

#[cfg(not(target_os = "linux"))]
pub use cgroup_manager_stub::*;

use std::{
    path::Path,
    process::{Child, Stdio},
};

use anyhow::Context;

/// Spawn `program` with stdin/stdout detached. Agents talk over TCP only.
fn create_process(program: &Path, args: &[String], allow_stderr: bool) -> anyhow::Result<Child> {
    let mut cmd = std::process::Command::new(program);
    cmd.args(args).stdin(Stdio::null()).stdout(Stdio::null());
    if !allow_stderr {
        cmd.stderr(Stdio::null());
    }
    cmd.spawn()
        .with_context(|| format!("could not start '{}'", program.display()))
}

/// Limits applied to one agent process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLimits {
    /// Hard memory limit in bytes, `0` for none.
    pub max_memory: i64,
    /// Maximum number of tasks in the cgroup.
    pub max_pids: i64,
    /// CPUs the agent may run on, as a cpuset list (`"0,2-3"`). Empty for no restriction.
    pub cpus: String,
}
