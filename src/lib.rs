//! # Ai Knockout
//!
//! Single-elimination (knockout) tournaments between Connect Four agents, with sandboxed and
//! time-bounded move computation.
//!
//! It provides:
//! - Balanced bracket construction with byes, optionally seeded by a previous ranking
//!   ([`bracket`], [`seeding`])
//! - Round-by-round evaluation of the bracket ([`round_evaluator`]) and a final ranking of
//!   every entrant ([`placement`])
//! - The Connect Four rules ([`board`]) and a match driver with forfeits on illegal moves,
//!   timeouts and crashes ([`match_runner`])
//! - Isolated move computation ([`turn_sandbox`]): in-process agents run on worker threads,
//!   process agents run in Linux cgroups v2 and talk over TCP
//!
//! Matches are played one after the other; only the move being computed is isolated.
//!
//! # Documentation Overview
//!
//! - For the tournament flow, see the [`server`] module.
//! - For configuring evaluation behavior and resource limits, see
//!   [`Configuration`](crate::configuration::Configuration) and [`constraints`].
//! - For writing agents, see [`game_interface`].
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ai_knockout::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let constraints = ConstraintsBuilder::new()
//!         .with_ram_per_agent(1000) // in MB
//!         .with_action_timeout(Duration::from_millis(500))
//!         .build()?;
//!
//!     // Run process agents without cgroups if cgroup v2 is not available
//!     let config = Configuration::new()
//!         .with_allow_uncontained(true)
//!         .with_course_id("312")
//!         .with_submissions_dir("path_to_agents_directory");
//!
//!     let evaluator = Evaluator::new(config, constraints);
//!     let report = evaluator.evaluate(&JsonFileStore::new("results"))?;
//!
//!     println!("{}", report.bracket);
//!     for (rank, name) in report.placings.iter().enumerate() {
//!         println!("{}. {name}", rank + 1);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Example Agent
//!
//! A process agent only needs a [`MovePolicy`](crate::game_interface::MovePolicy):
//!
//! ```no_run
//! use ai_knockout::game_interface::{run_remote_agent, Capability};
//! use ai_knockout::board::{Board, Side};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_remote_agent(|board: &Board, _side: Side, _capability: Capability| {
//!         board.legal_columns().next().unwrap_or(0)
//!     })
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;

pub mod agent;
mod agent_collector;
pub mod board;
pub mod bracket;
mod cgroup_manager;
mod client_handler;
pub mod configuration;
pub mod constraints;
pub mod game_interface;
mod logger;
pub mod match_runner;
pub mod placement;
pub mod policies;
pub mod round_evaluator;
pub mod seeding;
pub mod server;
pub mod turn_sandbox;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use ai_knockout::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::Agent;
    pub use crate::board::{Board, Side};
    pub use crate::configuration::Configuration;
    pub use crate::constraints::ConstraintsBuilder;
    pub use crate::game_interface::{AgentKind, Capability, MovePolicy};
    pub use crate::seeding::{JsonFileStore, SeedingStore};
    pub use crate::server::{Evaluator, TournamentReport};
}
