//! Resource limits for agent execution.
//!
//! The per-move budget applies to every agent. Memory and CPU limits only apply to process
//! agents, and only where Linux cgroups v2 are available.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ai_knockout::constraints::ConstraintsBuilder;
//!
//! let constraints = ConstraintsBuilder::new()
//!     .with_ram_per_agent(2_000)
//!     .with_cpu_list("0-3")
//!     .with_cpus_per_agent(2)
//!     .with_action_timeout(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//! ```
//!
//! Constraints may also be read from environment variables with
//! [`ConstraintsBuilder::from_env()`].

use std::{collections::BTreeSet, env, time::Duration};

use anyhow::{bail, Context};
use tracing::warn;

use crate::cgroup_manager::ProcessLimits;

/// Per-move budget used when none is configured.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_PIDS_PER_AGENT: i64 = 100;

#[derive(Debug, Default)]
enum AutoCpus {
    #[default]
    Auto,
    Count(usize),
    List(String),
}

/// Builder for [`Constraints`].
///
/// By default memory is only bounded by what is available, the CPU pool holds every physical
/// CPU of the host, each agent gets one CPU and each move gets [`DEFAULT_ACTION_TIMEOUT`].
#[derive(Debug, Default)]
pub struct ConstraintsBuilder {
    total_ram: Option<usize>,
    agent_ram: Option<usize>,
    cpus: AutoCpus,
    cpus_per_agent: Option<usize>,
    action_time: Option<Duration>,
}

impl ConstraintsBuilder {
    /// A builder with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder configured from environment variables:
    /// - `MAX_TOTAL_RAM` (usize): RAM available to both agents of a match, in MB
    /// - `RAM_PER_AGENT` (usize): RAM per agent, in MB
    /// - `CPU_LIST` (string): CPUs of the pool, e.g. "0-3,6"
    /// - `TOTAL_CPU_COUNT` (usize): size of the pool, ignored if `CPU_LIST` is set
    /// - `CPUS_PER_AGENT` (usize): CPUs given to each agent
    /// - `ACTION_TIMEOUT_MS` (u64): per-move budget in milliseconds
    #[must_use]
    pub fn from_env() -> Self {
        fn parse_usize(var: &str) -> Option<usize> {
            env::var(var).ok()?.parse().ok()
        }

        let cpus = if let Ok(list) = env::var("CPU_LIST") {
            AutoCpus::List(list)
        } else if let Some(count) = parse_usize("TOTAL_CPU_COUNT") {
            AutoCpus::Count(count)
        } else {
            AutoCpus::Auto
        };
        let action_time = env::var("ACTION_TIMEOUT_MS")
            .ok()
            .and_then(|ms| ms.parse::<u64>().ok())
            .map(Duration::from_millis);

        ConstraintsBuilder {
            total_ram: parse_usize("MAX_TOTAL_RAM"),
            agent_ram: parse_usize("RAM_PER_AGENT"),
            cpus,
            cpus_per_agent: parse_usize("CPUS_PER_AGENT"),
            action_time,
        }
    }

    /// RAM available to both agents of a match together (in MB).
    #[must_use]
    pub fn with_max_total_ram(self, max: usize) -> Self {
        Self {
            total_ram: Some(max),
            ..self
        }
    }

    /// RAM available to each agent (in MB).
    #[must_use]
    pub fn with_ram_per_agent(self, max: usize) -> Self {
        Self {
            agent_ram: Some(max),
            ..self
        }
    }

    /// CPUs of the pool, as a list of ids and inclusive ranges: `"0-3,6,8"`.
    #[must_use]
    pub fn with_cpu_list(self, cpus: &str) -> Self {
        Self {
            cpus: AutoCpus::List(cpus.to_string()),
            ..self
        }
    }

    /// Size of the CPU pool (CPUs `0..max`). Ignored if a CPU list is set.
    #[must_use]
    pub fn with_total_cpu_count(self, max: usize) -> Self {
        if let AutoCpus::List(_) = self.cpus {
            warn!("`with_total_cpu_count` is ignored if `with_cpu_list` is used!");
            self
        } else {
            Self {
                cpus: AutoCpus::Count(max),
                ..self
            }
        }
    }

    /// CPUs given to each agent. Default is one.
    #[must_use]
    pub fn with_cpus_per_agent(self, max: usize) -> Self {
        Self {
            cpus_per_agent: Some(max),
            ..self
        }
    }

    /// Wall-clock budget of a single move. Exceeding it forfeits the match.
    #[must_use]
    pub fn with_action_timeout(self, duration: Duration) -> Self {
        Self {
            action_time: Some(duration),
            ..self
        }
    }

    /// Build the constraints.
    ///
    /// # Errors
    ///
    /// Fails when the limits are impossible: per-agent RAM above the total, empty or invalid
    /// CPU list, zero CPUs per agent, or a zero move budget.
    pub fn build(self) -> anyhow::Result<Constraints> {
        let mut sys = sysinfo::System::new();

        let total_ram = self.total_ram.map(|mb| mb * 1_000_000).unwrap_or_else(|| {
            sys.refresh_memory();
            sys.available_memory() as usize
        });
        if total_ram < self.agent_ram.unwrap_or(0) * 1_000_000 {
            bail!(
                "Agent RAM size ({}MB) is greater than total RAM ({}MB)",
                self.agent_ram.unwrap_or(0),
                total_ram / 1_000_000
            );
        }

        let cpus = match self.cpus {
            // physical CPUs only: agents sharing hyper-threads slow each other down
            AutoCpus::Auto => (0..num_cpus::get_physical() as u8).collect::<BTreeSet<u8>>(),
            AutoCpus::Count(count) => (0..count as u8).collect::<BTreeSet<u8>>(),
            AutoCpus::List(s) => cpu_list_to_set(&s).context("error parsing cpu list")?,
        };
        if cpus.is_empty() {
            bail!("the CPU pool is empty");
        }
        let cpus_per_agent = self.cpus_per_agent.unwrap_or(1);
        if cpus_per_agent == 0 {
            bail!("each agent needs at least one CPU");
        }
        let agent_ram = self
            .agent_ram
            .map(|mb| mb * 1_000_000)
            .unwrap_or(total_ram / 2);
        let action_time = self.action_time.unwrap_or(DEFAULT_ACTION_TIMEOUT);
        if action_time.is_zero() {
            bail!("the move budget must be positive");
        }

        Ok(Constraints {
            total_ram,
            agent_ram,
            cpus,
            cpus_per_agent,
            action_time,
        })
    }
}

fn cpu_list_to_set(s: &str) -> anyhow::Result<BTreeSet<u8>> {
    if s.is_empty() {
        bail!("Empty string");
    }
    let mut set = BTreeSet::new();
    for item in s.split(',') {
        let bounds = item
            .split('-')
            .map(|v| v.trim().parse::<u8>().with_context(|| format!("could not parse '{v}'")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        match bounds[..] {
            [single] => {
                set.insert(single);
            }
            [start, end] => set.extend(start.min(end)..=start.max(end)),
            _ => bail!(
                "each comma-separated item must be a number or a range (e.g. '0-3'), got '{item}'"
            ),
        }
    }
    Ok(set)
}

/// Validated limits. Obtained through [`ConstraintsBuilder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraints {
    pub(crate) total_ram: usize,
    pub(crate) agent_ram: usize,
    pub(crate) cpus: BTreeSet<u8>,
    pub(crate) cpus_per_agent: usize,
    pub(crate) action_time: Duration,
}

impl Constraints {
    /// Create a [`ConstraintsBuilder`].
    pub fn builder() -> ConstraintsBuilder {
        ConstraintsBuilder::new()
    }

    /// Wall-clock budget of a single move.
    pub fn action_timeout(&self) -> Duration {
        self.action_time
    }

    /// Process limits for the two sides of a match.
    ///
    /// Each side takes `cpus_per_agent` CPUs from the pool. When the pool is too small for
    /// both, the sides share the whole pool.
    pub(crate) fn match_limits(&self) -> [ProcessLimits; 2] {
        let mut pool = self.cpus.iter().copied();
        let first = pool.by_ref().take(self.cpus_per_agent).collect::<Vec<_>>();
        let second = pool.take(self.cpus_per_agent).collect::<Vec<_>>();
        let (first, second) = if second.len() == self.cpus_per_agent {
            (first, second)
        } else {
            let all = self.cpus.iter().copied().collect::<Vec<_>>();
            (all.clone(), all)
        };

        let agent_ram = self.agent_ram.min(self.total_ram / 2);
        [first, second].map(|cpus| ProcessLimits {
            max_memory: agent_ram as i64,
            max_pids: MAX_PIDS_PER_AGENT,
            cpus: cpus
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(","),
        })
    }
}

#[cfg(test)]
mod constraints_tests {
    use super::*;

    #[test]
    fn cpu_list_parsing() {
        let set = cpu_list_to_set("0-2,5,9-7").unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 5, 7, 8, 9]);
        assert!(cpu_list_to_set("").is_err());
        assert!(cpu_list_to_set("1-2-3").is_err());
        assert!(cpu_list_to_set("a").is_err());
    }

    #[test]
    fn defaults() {
        let constraints = ConstraintsBuilder::new()
            .with_max_total_ram(1_000)
            .with_total_cpu_count(2)
            .build()
            .unwrap();
        assert_eq!(constraints.action_timeout(), DEFAULT_ACTION_TIMEOUT);
        assert_eq!(constraints.agent_ram, 500_000_000);
    }

    #[test]
    fn impossible_limits_are_rejected() {
        assert!(ConstraintsBuilder::new()
            .with_max_total_ram(100)
            .with_ram_per_agent(200)
            .build()
            .is_err());
        assert!(ConstraintsBuilder::new()
            .with_action_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(ConstraintsBuilder::new()
            .with_total_cpu_count(2)
            .with_cpus_per_agent(0)
            .build()
            .is_err());
    }

    #[test]
    fn pool_is_split_between_sides() {
        let constraints = ConstraintsBuilder::new()
            .with_max_total_ram(1_000)
            .with_ram_per_agent(300)
            .with_cpu_list("2-5")
            .with_cpus_per_agent(2)
            .build()
            .unwrap();
        let [one, two] = constraints.match_limits();
        assert_eq!(one.cpus, "2,3");
        assert_eq!(two.cpus, "4,5");
        assert_eq!(one.max_memory, 300_000_000);
    }

    #[test]
    fn small_pool_is_shared() {
        let constraints = ConstraintsBuilder::new()
            .with_max_total_ram(1_000)
            .with_cpu_list("3")
            .build()
            .unwrap();
        let [one, two] = constraints.match_limits();
        assert_eq!(one.cpus, "3");
        assert_eq!(two.cpus, "3");
    }
}
