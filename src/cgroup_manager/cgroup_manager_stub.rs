use std::{path::Path, process::Child, time::Duration};

use anyhow::{bail, Context};
use tracing::warn;

use super::{create_process, ProcessLimits};

/// A child process. Confinement is only available on Linux.
#[derive(Debug)]
pub struct LimitedProcess {
    child: Child,
    cleaned_up: bool,
}

impl LimitedProcess {
    pub fn launch(
        _program: &Path,
        _args: &[String],
        _limits: &ProcessLimits,
        _allow_stderr: bool,
    ) -> anyhow::Result<LimitedProcess> {
        bail!("cgroups only available on linux")
    }

    pub fn launch_without_container(
        program: &Path,
        args: &[String],
        allow_stderr: bool,
    ) -> anyhow::Result<LimitedProcess> {
        let child = create_process(program, args, allow_stderr)?;
        Ok(LimitedProcess {
            child,
            cleaned_up: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    pub fn try_kill(&mut self, _max_duration: Duration) -> anyhow::Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        let _ = self.child.kill();
        self.child.wait().context("could not reap process")?;
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
