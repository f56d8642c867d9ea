//! Isolated, time-bounded computation of one move.
//!
//! A [`TurnSandbox`] is opened for each side of a match with [`launch_sandbox`]. The caller
//! waits for each move up to the per-move budget; a move that is late, even by a small margin,
//! is reported as [`TurnError::Timeout`] and its result is never used.
//!
//! In-process agents run every move on a fresh worker thread that reports over a channel
//! ([`WorkerSandbox`]). Worker threads cannot be killed: a late worker is abandoned and its
//! result dropped. Process agents answer over TCP and are killed as soon as they time out or
//! fail.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::bail;
use thiserror::Error;
use tracing::{instrument, trace};

use crate::agent::{Agent, AgentSource};
use crate::board::{Board, Side};
use crate::cgroup_manager::ProcessLimits;
use crate::client_handler::ClientHandler;
use crate::configuration::Configuration;
use crate::game_interface::{Capability, MovePolicy};

/// Why a move could not be obtained. Both variants forfeit the match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// No result within the budget.
    #[error("no move within {budget:?}")]
    Timeout {
        /// The budget that was exceeded.
        budget: Duration,
    },
    /// The computation crashed or answered garbage.
    #[error("move computation failed: {0}")]
    Failure(String),
}

/// A move obtained in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    /// Column chosen by the agent. Not validated against the board yet.
    pub column: usize,
    /// Wall-clock time of the computation, as measured by the caller.
    pub elapsed: Duration,
}

/// One side's isolated move computation, for the duration of a match.
pub trait TurnSandbox {
    /// Ask for a move on `board`, waiting at most `budget`.
    fn compute_move(
        &mut self,
        board: &Board,
        capability: Capability,
        budget: Duration,
    ) -> Result<Turn, TurnError>;
}

/// Runs an in-process [`MovePolicy`] on a new thread for each move.
pub struct WorkerSandbox {
    name: String,
    side: Side,
    policy: Arc<dyn MovePolicy>,
}

impl WorkerSandbox {
    /// Sandbox for `policy` playing `side`.
    pub fn new(name: impl Into<String>, side: Side, policy: Arc<dyn MovePolicy>) -> Self {
        Self {
            name: name.into(),
            side,
            policy,
        }
    }
}

impl TurnSandbox for WorkerSandbox {
    #[instrument(skip_all, fields(agent = self.name))]
    fn compute_move(
        &mut self,
        board: &Board,
        capability: Capability,
        budget: Duration,
    ) -> Result<Turn, TurnError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let policy = Arc::clone(&self.policy);
        let board = board.clone();
        let side = self.side;

        let start = Instant::now();
        thread::Builder::new()
            .name(format!("move-{}", self.name))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    policy.select_move(&board, side, capability)
                }));
                // the receiver is gone if the move came too late
                let _ = tx.send(result.map_err(panic_message));
            })
            .map_err(|e| TurnError::Failure(format!("could not start worker: {e}")))?;

        let result = rx.recv_timeout(budget);
        let elapsed = start.elapsed();
        match result {
            Ok(Ok(column)) if elapsed <= budget => {
                trace!(column, ?elapsed);
                Ok(Turn { column, elapsed })
            }
            Ok(Ok(_)) | Err(RecvTimeoutError::Timeout) => Err(TurnError::Timeout { budget }),
            Ok(Err(msg)) => Err(TurnError::Failure(format!("panicked: {msg}"))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(TurnError::Failure("worker ended without a move".to_string()))
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Open the sandbox of `agent` playing `side`.
///
/// # Errors
/// The agent cannot be loaded at all: its submission is missing, or its process could not be
/// started or did not connect. The caller treats this as a forfeit of the match.
#[instrument(skip_all, fields(agent = agent.name, %side))]
pub(crate) fn launch_sandbox(
    agent: &Agent,
    side: Side,
    limits: &ProcessLimits,
    config: &Configuration,
    budget: Duration,
) -> anyhow::Result<Box<dyn TurnSandbox>> {
    match &agent.source {
        AgentSource::InProcess(policy) => Ok(Box::new(WorkerSandbox::new(
            agent.name.clone(),
            side,
            Arc::clone(policy),
        ))),
        AgentSource::Executable(path) => Ok(Box::new(ClientHandler::init(
            agent, path, side, limits, config, budget,
        )?)),
        AgentSource::Missing(msg) => bail!("agent could not be loaded: {msg}"),
    }
}

#[cfg(test)]
mod sandbox_tests {
    use super::*;
    use crate::game_interface::AgentKind;

    fn sandbox<P: MovePolicy + 'static>(policy: P) -> WorkerSandbox {
        WorkerSandbox::new("test", Side::One, Arc::new(policy))
    }

    fn ask(sandbox: &mut WorkerSandbox, budget: Duration) -> Result<Turn, TurnError> {
        sandbox.compute_move(&Board::new(), Capability::General, budget)
    }

    #[test]
    fn quick_move_is_returned_with_its_time() {
        let mut sandbox = sandbox(|_: &Board, _: Side, _: Capability| 4);
        let budget = Duration::from_secs(2);
        let turn = ask(&mut sandbox, budget).unwrap();
        assert_eq!(turn.column, 4);
        assert!(turn.elapsed <= budget);
    }

    #[test]
    fn slow_move_times_out() {
        let mut sandbox = sandbox(|_: &Board, _: Side, _: Capability| {
            thread::sleep(Duration::from_millis(300));
            1
        });
        let budget = Duration::from_millis(20);
        assert_eq!(ask(&mut sandbox, budget), Err(TurnError::Timeout { budget }));
    }

    #[test]
    fn slightly_late_move_is_not_used() {
        let budget = Duration::from_millis(40);
        let mut sandbox = sandbox(move |_: &Board, _: Side, _: Capability| {
            thread::sleep(budget + Duration::from_millis(5));
            2
        });
        assert!(matches!(
            ask(&mut sandbox, budget),
            Err(TurnError::Timeout { .. })
        ));
    }

    #[test]
    fn panicking_policy_is_a_failure() {
        let mut sandbox = sandbox(|_: &Board, _: Side, _: Capability| -> usize {
            panic!("agent bug")
        });
        match ask(&mut sandbox, Duration::from_secs(2)) {
            Err(TurnError::Failure(msg)) => assert!(msg.contains("agent bug"), "{msg}"),
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn policy_sees_side_and_capability() {
        let mut sandbox = WorkerSandbox::new(
            "sided",
            Side::Two,
            Arc::new(|_: &Board, side: Side, capability: Capability| {
                usize::from(side == Side::Two)
                    + 2 * usize::from(capability == Capability::VersusRandom)
            }),
        );
        let turn = sandbox
            .compute_move(&Board::new(), Capability::VersusRandom, Duration::from_secs(2))
            .unwrap();
        assert_eq!(turn.column, 3);
    }

    #[test]
    fn missing_agent_cannot_be_launched() {
        let agent = Agent::with_error("broken", "does not compile");
        let constraints = crate::constraints::ConstraintsBuilder::new()
            .with_max_total_ram(1_000)
            .with_total_cpu_count(2)
            .build()
            .unwrap();
        let [limits, _] = constraints.match_limits();
        let result = launch_sandbox(
            &agent,
            Side::One,
            &limits,
            &Configuration::new(),
            constraints.action_timeout(),
        );
        let err = result.err().expect("a missing agent must not launch");
        assert!(err.to_string().contains("does not compile"));
    }

    #[test]
    fn in_process_agent_launches() {
        let policy = Arc::new(crate::policies::FirstLegalColumn);
        let agent = Agent::in_process("first", AgentKind::Ai, policy);
        let limits = ProcessLimits {
            max_memory: 0,
            max_pids: 0,
            cpus: String::new(),
        };
        let budget = Duration::from_secs(1);
        let mut sandbox =
            launch_sandbox(&agent, Side::One, &limits, &Configuration::new(), budget).unwrap();
        let turn = sandbox
            .compute_move(&Board::new(), Capability::General, budget)
            .unwrap();
        assert_eq!(turn.column, 0);
    }
}
