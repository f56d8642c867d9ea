use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context};
use tracing::{error, instrument, trace};

const BIN_NAME: &str = "eval";

/// Build the `eval` binary of the crate in `dir` and return its path.
#[instrument(parent = None)]
pub fn compile_single_agent(dir: &Path) -> anyhow::Result<PathBuf> {
    //TODO: --offline to prevent using other crates than expected ?
    let args = [
        "build",
        "--release",
        "--bin",
        BIN_NAME,
        "--message-format",
        "short",
    ];

    let dir = dir
        .canonicalize()
        .with_context(|| format!("invalid crate directory {}", dir.display()))?;
    let output = Command::new("cargo")
        .args(args)
        .current_dir(&dir)
        .stdin(Stdio::null())
        .output()
        .context("could not launch command 'cargo'")?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    trace!(stdout = %String::from_utf8_lossy(&output.stdout), %stderr);
    if output.status.success() {
        let exe = format!("{BIN_NAME}{}", std::env::consts::EXE_SUFFIX);
        Ok(dir.join("target").join("release").join(exe))
    } else {
        let stderr = stderr.trim();
        error!("compilation error: {stderr}");
        Err(anyhow!("Compilation error: {}", first_error_line(stderr)))
    }
}

/// First diagnostic line of cargo's `stderr`, skipping progress lines such as
/// `Compiling thiserror v1.0.69` that merely contain the word.
fn first_error_line(stderr: &str) -> &str {
    stderr
        .lines()
        .find(|line| line.starts_with("error") || line.contains(": error"))
        .or_else(|| stderr.lines().next())
        .unwrap_or_default()
}

#[cfg(test)]
mod compiler_tests {
    use super::*;

    #[test]
    fn progress_lines_naming_error_crates_are_skipped() {
        let stderr = "   Compiling thiserror v1.0.69\n   Compiling eval v0.1.0\n\
                      error[E0308]: mismatched types\nerror: could not compile `eval`";
        assert_eq!(first_error_line(stderr), "error[E0308]: mismatched types");
    }

    #[test]
    fn short_format_diagnostics_are_found() {
        let stderr =
            "   Compiling anyhow v1.0.86\nsrc/main.rs:3:5: error[E0425]: cannot find value `x`";
        assert_eq!(
            first_error_line(stderr),
            "src/main.rs:3:5: error[E0425]: cannot find value `x`"
        );
    }

    #[test]
    fn falls_back_to_the_first_line() {
        assert_eq!(first_error_line("linker failed\nsecond"), "linker failed");
        assert_eq!(first_error_line(""), "");
    }
}
