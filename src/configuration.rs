//! Config for the evaluator behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive: set the value to `"true"` to enable one.
//!
//! - `EVAL_VERBOSE`: print tournament progress (default: `true`)
//! - `EVAL_LOG`: enable logging to a file (default: `false`)
//! - `EVAL_ALLOW_UNCONTAINED`: run process agents without cgroup limits when cgroups v2 is not
//!   available (default: `false`)
//! - `EVAL_COMPILE_AGENTS`: compile submissions before the tournament (default: `true`)
//! - `EVAL_DEBUG_AGENT_STDERR`: let process agents write to stderr (default: `false`)
//! - `EVAL_COURSE`: course id, part of the seeding store key (default: `"0"`)
//! - `EVAL_SUBMISSIONS_DIR`: folder holding one sub-folder per entrant (default: `submissions`)

use std::path::{Path, PathBuf};

/// Configuration for evaluator behaviors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) allow_uncontained: bool,
    pub(crate) compile_agents: bool,
    pub(crate) debug_agent_stderr: bool,
    pub(crate) course_id: String,
    pub(crate) submissions_dir: PathBuf,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The evaluator will print match progress to stdout.
    /// - Logging to file is disabled.
    /// - Process agents must run inside a cgroup.
    /// - Agents will be compiled before execution.
    /// - Agent stderr output is disabled.
    /// - Course `"0"`, submissions read from `./submissions`.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            allow_uncontained: false,
            compile_agents: true,
            debug_agent_stderr: false,
            course_id: "0".to_string(),
            submissions_dir: PathBuf::from("submissions"),
        }
    }

    /// Create configuration from environment variables (see the module documentation).
    ///
    /// Any unset variable leaves the default value.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        let defaults = Self::new();
        Self {
            verbose: get_env_flag("EVAL_VERBOSE", defaults.verbose),
            log: get_env_flag("EVAL_LOG", defaults.log),
            allow_uncontained: get_env_flag("EVAL_ALLOW_UNCONTAINED", defaults.allow_uncontained),
            compile_agents: get_env_flag("EVAL_COMPILE_AGENTS", defaults.compile_agents),
            debug_agent_stderr: get_env_flag(
                "EVAL_DEBUG_AGENT_STDERR",
                defaults.debug_agent_stderr,
            ),
            course_id: std::env::var("EVAL_COURSE").unwrap_or(defaults.course_id),
            submissions_dir: std::env::var_os("EVAL_SUBMISSIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.submissions_dir),
        }
    }

    /// Enable or disable progress output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Allow process agents to run without cgroup limits when confinement fails.
    ///
    /// Only the move budget is enforced for such agents.
    pub fn with_allow_uncontained(mut self, value: bool) -> Self {
        self.allow_uncontained = value;
        self
    }

    /// Enable or disable agent compilation.
    pub fn with_compile_agents(mut self, value: bool) -> Self {
        self.compile_agents = value;
        self
    }

    /// Enable or disable agent stderr output (debug purposes only).
    pub fn with_debug_agent_stderr(mut self, value: bool) -> Self {
        self.debug_agent_stderr = value;
        self
    }

    /// Course whose seeding list is read and written.
    pub fn with_course_id(mut self, course: impl Into<String>) -> Self {
        self.course_id = course.into();
        self
    }

    /// Folder holding the submissions.
    pub fn with_submissions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.submissions_dir = dir.into();
        self
    }

    /// Course id.
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// Submissions folder.
    pub fn submissions_dir(&self) -> &Path {
        &self.submissions_dir
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod configuration_tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Configuration::new()
            .with_verbose(false)
            .with_compile_agents(false)
            .with_course_id("312")
            .with_submissions_dir("/tmp/subs");
        assert!(!config.verbose);
        assert!(!config.compile_agents);
        assert!(!config.allow_uncontained);
        assert_eq!(config.course_id(), "312");
        assert_eq!(config.submissions_dir(), Path::new("/tmp/subs"));
        assert_eq!(Configuration::default(), Configuration::new());
    }
}
