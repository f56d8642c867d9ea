use std::{
    path::Path,
    process::Child,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use anyhow::{bail, Context};
use cgroups_rs::{cgroup_builder::CgroupBuilder, Cgroup, CgroupPid, MaxValue};
use tracing::{trace, warn};

use super::{create_process, ProcessLimits};

fn current_user_id() -> anyhow::Result<String> {
    let output = std::process::Command::new("id")
        .arg("-u")
        .output()
        .context("could not launch 'id -u'")?;
    let id = std::str::from_utf8(&output.stdout).context("user id is not valid utf-8")?;
    Ok(id.trim().to_string())
}

/// Path of a cgroup delegated to the current user by systemd.
fn user_cgroup_path(user_id: &str, group_name: &str) -> String {
    format!("user.slice/user-{user_id}.slice/user@{user_id}.service/{group_name}")
}

fn create_cgroup(path: &str, limits: &ProcessLimits) -> anyhow::Result<Cgroup> {
    let mut builder = CgroupBuilder::new(path);
    if limits.max_memory > 0 {
        builder = builder.memory().memory_hard_limit(limits.max_memory).done();
    }
    if limits.max_pids > 0 {
        builder = builder
            .pid()
            .maximum_number_of_processes(MaxValue::Value(limits.max_pids))
            .done();
    }
    if !limits.cpus.is_empty() {
        builder = builder.cpu().cpus(limits.cpus.clone()).done();
    }
    builder
        .build(cgroups_rs::hierarchies::auto())
        .context("could not create cgroup")
}

fn wait_for_cleanup(cgroup: &Cgroup, pid: u64, max_duration: Duration) -> anyhow::Result<()> {
    let deadline = Instant::now() + max_duration;
    while cgroup.tasks().iter().any(|task| task.pid == pid) {
        if Instant::now() > deadline {
            bail!("process {pid} still alive after {max_duration:?}");
        }
        std::thread::sleep(Duration::from_millis(10).min(max_duration / 10));
    }
    Ok(())
}

/// A child process, optionally confined in its own cgroup.
#[derive(Debug)]
pub struct LimitedProcess {
    child: Child,
    cgroup: Option<Cgroup>,
    cleaned_up: bool,
}

impl LimitedProcess {
    /// Start `program` inside a fresh cgroup enforcing `limits`.
    pub fn launch(
        program: &Path,
        args: &[String],
        limits: &ProcessLimits,
        allow_stderr: bool,
    ) -> anyhow::Result<LimitedProcess> {
        static COUNTER: AtomicU32 = AtomicU32::new(1);

        let user_id = current_user_id()?;
        let group_name = format!(
            "AI_KNOCKOUT_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let path = user_cgroup_path(&user_id, &group_name);
        let group = create_cgroup(&path, limits)?;

        let mut child = match create_process(program, args, allow_stderr) {
            Ok(child) => child,
            Err(e) => {
                let _ = group.delete();
                return Err(e);
            }
        };
        let pid = child.id() as u64;
        if let Err(e) = group.add_task_by_tgid(CgroupPid { pid }) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = group.delete();
            return Err(e).context("could not add process to cgroup");
        }
        trace!(pid, cgroup = %path, "agent process started");

        Ok(LimitedProcess {
            child,
            cgroup: Some(group),
            cleaned_up: false,
        })
    }

    /// Start `program` with no confinement at all.
    pub fn launch_without_container(
        program: &Path,
        args: &[String],
        allow_stderr: bool,
    ) -> anyhow::Result<LimitedProcess> {
        let child = create_process(program, args, allow_stderr)?;
        Ok(LimitedProcess {
            child,
            cgroup: None,
            cleaned_up: false,
        })
    }

    /// OS id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// True once the child has terminated, for whatever reason.
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the child (and everything in its cgroup), waiting up to `max_duration` for it.
    pub fn try_kill(&mut self, max_duration: Duration) -> anyhow::Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        match &self.cgroup {
            Some(cgroup) => {
                cgroup.kill().context("could not kill cgroup")?;
                wait_for_cleanup(cgroup, self.child.id() as u64, max_duration)?;
                let _ = self.child.wait();
                if let Err(e) = cgroup.delete() {
                    warn!("failed to remove cgroup {}: {e}", cgroup.path());
                }
            }
            None => {
                // already dead is fine
                let _ = self.child.kill();
                self.child.wait().context("could not reap process")?;
            }
        }
        self.cleaned_up = true;
        Ok(())
    }
}

impl Drop for LimitedProcess {
    fn drop(&mut self) {
        if let Err(e) = self.try_kill(Duration::from_millis(500)) {
            warn!("could not clean up agent process {}: {e:#}", self.child.id());
        }
    }
}
