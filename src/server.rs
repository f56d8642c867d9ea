//! Core evaluation logic for running a knockout tournament.
//!
//! This module defines the [`Evaluator`] type, which orchestrates the tournament:
//!
//! - Compiling or loading agents from the submissions directory
//! - Ordering them with the seeding list of the previous tournament, if any
//! - Playing the bracket round by round, one match at a time, under the [`Constraints`]
//! - Returning and storing the final placings
//!
//! # Behavior & Configuration
//!
//! Behavior is controlled by a [`Configuration`] object:
//!
//! - When `config.compile_agents = true`, the evaluator expects each sub-directory to be a
//!   **Rust crate** with an `eval` binary. A crate that does not compile forfeits its first match.
//! - When `config.compile_agents = false`, each sub-directory must contain **exactly one**
//!   executable, plus an optional descriptor.
//!
//! The optional YAML descriptor declares the agent kind and its extra arguments:
//!
//! ```yaml
//! kind: random # or "ai" (default)
//! args: "--depth 4"
//! ```
//!
//! > ⚠️ This file is manually parsed and supports only these two keys and comments.
//!
//! ## Uncontained Mode
//!
//! If `config.allow_uncontained = true`, process agents still run when Linux cgroups v2 is not
//! available. In this case, **only the move budget is enforced**, and CPU/RAM isolation is skipped.
//!
//! # Example
//!
//! See crate-level documentation for an example on how to use the `Evaluator`.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use anyhow::bail;
use tracing::{error, info, instrument, trace, warn};

use crate::agent::Agent;
use crate::agent_collector::collect_agents;
use crate::board::Side;
use crate::bracket::{BracketTree, Slot};
use crate::configuration::Configuration;
use crate::constraints::Constraints;
use crate::logger::init_logger;
use crate::match_runner::{run_bracket_match, MatchReport};
use crate::placement::resolve;
use crate::round_evaluator::{evaluate, MatchOutcome};
use crate::seeding::{seed_order, SeedingStore};

/// Final state of a tournament.
#[derive(Debug, Clone)]
pub struct TournamentReport {
    /// Entrant ids, champion first.
    pub placings: Vec<String>,
    /// The evaluated bracket. Its `Display` implementation draws it.
    pub bracket: BracketTree<Arc<Agent>>,
}

/// Runs knockout tournaments between agents.
pub struct Evaluator {
    config: Configuration,
    constraints: Constraints,
}

impl Evaluator {
    /// Create an [`Evaluator`] with given [`Configuration`] and [`Constraints`].
    ///
    /// Starts file logging if `config.log` is set.
    #[instrument(skip_all)]
    pub fn new(config: Configuration, constraints: Constraints) -> Evaluator {
        if config.log {
            if let Err(e) = init_logger() {
                eprintln!("logging disabled: {e:#}");
            }
        }
        trace!(?config, ?constraints);

        Evaluator {
            config,
            constraints,
        }
    }

    /// Run the tournament between the submissions of the configured directory.
    ///
    /// The seeding list of the configured course is read from `store` before the tournament and
    /// replaced with the new placings afterwards. Store failures are logged and ignored.
    ///
    /// # Errors
    /// Returns an error if the submissions directory is invalid or holds no entrant. Nothing is
    /// stored in that case.
    pub fn evaluate(&self, store: &dyn SeedingStore) -> anyhow::Result<TournamentReport> {
        let agents = collect_agents(&self.config.submissions_dir, &self.config)?;
        info!(agents = ?agents.iter().map(|a| &a.name).collect::<Vec<_>>());

        let course = &self.config.course_id;
        let budget = self.constraints.action_timeout();
        let seeding = store.get_seeding(course, budget).unwrap_or_else(|e| {
            error!("could not fetch seeding: {e:#}");
            None
        });

        let report = self.run_bracket(agents, seeding.as_deref())?;

        if let Err(e) = store.put_result(&report.placings, course, budget) {
            error!("could not store placings: {e:#}");
        }
        Ok(report)
    }

    /// Run the tournament between `agents`, listed in submission order.
    ///
    /// Agents named in `seeding` are placed first, in that order.
    ///
    /// # Errors
    /// Returns an error if `agents` is empty or if two agents share a name.
    #[instrument(skip_all, fields(entrants = agents.len()))]
    pub fn run_bracket(
        &self,
        agents: Vec<Arc<Agent>>,
        seeding: Option<&[String]>,
    ) -> anyhow::Result<TournamentReport> {
        let mut names = HashSet::new();
        if let Some(agent) = agents.iter().find(|agent| !names.insert(agent.name.as_str())) {
            bail!("two entrants are named '{}'", agent.name);
        }

        let entrants = agents
            .into_iter()
            .map(|agent| (agent.name.clone(), agent))
            .collect::<Vec<_>>();
        let entrants = match seeding {
            Some(seeding) => seed_order(entrants, seeding),
            None => entrants,
        };

        let mut tree = BracketTree::build(entrants)?;
        info!(
            rounds = tree.round_count(),
            byes = tree.bye_count(),
            "bracket built"
        );
        if self.config.verbose {
            println!(
                "Knockout: {} rounds, {} byes",
                tree.round_count(),
                tree.bye_count()
            );
        }

        let verbose = self.config.verbose;
        let _wrap = verbose.then(LineWrapGuard::disable);
        let mut runner = |left: &Slot<Arc<Agent>>, right: &Slot<Arc<Agent>>| {
            let names = left.id().zip(right.id());
            if let (true, Some((l, r))) = (verbose, names) {
                print_running_match(l, r);
            }
            let (outcome, report) =
                run_bracket_match(left, right, &self.constraints, &self.config);
            if let (true, Some((l, r))) = (verbose, names) {
                print_match_result(l, r, &outcome, report.as_ref());
            }
            outcome
        };
        evaluate(&mut tree, &mut runner);

        let placings = resolve(&tree);
        if placings.is_empty() {
            warn!("every entrant forfeited, no placings");
        }
        info!(?placings);
        Ok(TournamentReport {
            placings,
            bracket: tree,
        })
    }
}

fn print_running_match(left: &str, right: &str) {
    // clear, green, default, start of line
    print!("\x1b[2K\x1b[32mRunning...:\x1b[39m {left} vs {right}\x1b[0G");
    let _ = std::io::stdout().flush();
}

fn print_match_result(
    left: &str,
    right: &str,
    outcome: &MatchOutcome,
    report: Option<&MatchReport>,
) {
    let winner = match outcome.winner {
        Some(Side::One) => left,
        Some(Side::Two) => right,
        None => "nobody",
    };
    let details = match report {
        Some(report) => format!(
            "{:.3}s-{:.3}s \x1b[33m{}",
            report.times[0].as_secs_f64(),
            report.times[1].as_secs_f64(),
            report.ending
        ),
        None => "\x1b[31mforfeit".to_string(),
    };

    // clear line, green match, winner, details, start of line
    println!(
        "\x1b[2K\x1b[32m{left} vs {right}: \x1b[39m{winner} advances, {details}\x1b[39m\x1b[0G"
    );
}

/// Disables terminal line wrapping until dropped, so progress lines can be overwritten.
struct LineWrapGuard;

impl LineWrapGuard {
    fn disable() -> Self {
        print!("\x1b[?7l");
        LineWrapGuard
    }
}

impl Drop for LineWrapGuard {
    fn drop(&mut self) {
        print!("\x1b[?7h");
        let _ = std::io::stdout().flush();
    }
}
