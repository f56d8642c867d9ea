//! One Connect Four match between two bracket slots.

use std::{fmt, sync::Arc, time::Duration};

use tracing::{debug, instrument, trace, warn};

use crate::agent::Agent;
use crate::board::{Board, MoveError, Side};
use crate::bracket::Slot;
use crate::configuration::Configuration;
use crate::constraints::Constraints;
use crate::game_interface::{AgentKind, Capability};
use crate::round_evaluator::MatchOutcome;
use crate::turn_sandbox::{launch_sandbox, TurnError, TurnSandbox};

/// How a played match ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEnding {
    /// The winner connected four.
    Connected,
    /// The board filled up; the side with less compute time won.
    FullBoard,
    /// `offender` chose a full or out-of-range column.
    IllegalMove {
        /// Side that forfeited.
        offender: Side,
        /// Why the column was refused.
        error: MoveError,
    },
    /// `offender` timed out or crashed.
    Forfeit {
        /// Side that forfeited.
        offender: Side,
        /// What went wrong.
        error: TurnError,
    },
}

impl fmt::Display for MatchEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchEnding::Connected => f.write_str("four in a row"),
            MatchEnding::FullBoard => f.write_str("full board, decided on time"),
            MatchEnding::IllegalMove { offender, error } => {
                write!(f, "illegal move by player {offender}: {error}")
            }
            MatchEnding::Forfeit { offender, error } => write!(f, "player {offender}: {error}"),
        }
    }
}

/// Result of a match that was actually played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    /// Winning side.
    pub winner: Side,
    /// Compute time of each side, indexed by [`Side::index`].
    pub times: [Duration; 2],
    /// Why the match stopped.
    pub ending: MatchEnding,
    /// Pieces on the board at the end.
    pub moves: usize,
}

impl From<&MatchReport> for MatchOutcome {
    fn from(report: &MatchReport) -> Self {
        MatchOutcome::won_by(report.winner, report.times[0], report.times[1])
    }
}

/// A match in progress between two opened sandboxes.
pub struct Match {
    sandboxes: [Box<dyn TurnSandbox>; 2],
    capabilities: [Capability; 2],
    board: Board,
    turn: Side,
    times: [Duration; 2],
    budget: Duration,
}

impl Match {
    /// A match on an empty board; side one moves first.
    ///
    /// `kinds` are the declared kinds of both agents: each side is asked for the capability
    /// matching its opponent.
    pub fn new(
        sandboxes: [Box<dyn TurnSandbox>; 2],
        kinds: [AgentKind; 2],
        budget: Duration,
    ) -> Self {
        Self {
            sandboxes,
            capabilities: [Capability::against(kinds[1]), Capability::against(kinds[0])],
            board: Board::new(),
            turn: Side::One,
            times: [Duration::ZERO; 2],
            budget,
        }
    }

    /// Start from `board` instead, with `turn` to move.
    #[cfg(test)]
    pub(crate) fn starting_from(mut self, board: Board, turn: Side) -> Self {
        self.board = board;
        self.turn = turn;
        self
    }

    /// Play until a side connects four, forfeits, or the board is full.
    pub fn play(mut self) -> MatchReport {
        loop {
            if self.board.is_full() {
                let winner = tie_break(self.times);
                return self.finish(winner, MatchEnding::FullBoard);
            }

            let side = self.turn;
            let i = side.index();
            trace!(%side, board = %self.board, "asking for a move");
            let computed =
                self.sandboxes[i].compute_move(&self.board, self.capabilities[i], self.budget);
            let turn = match computed {
                Ok(turn) => turn,
                Err(error) => {
                    let ending = MatchEnding::Forfeit {
                        offender: side,
                        error,
                    };
                    return self.finish(side.other(), ending);
                }
            };
            self.times[i] += turn.elapsed;

            if let Err(error) = self.board.apply_move(turn.column, side) {
                let ending = MatchEnding::IllegalMove {
                    offender: side,
                    error,
                };
                return self.finish(side.other(), ending);
            }
            if self.board.is_win(side) {
                return self.finish(side, MatchEnding::Connected);
            }
            self.turn = side.other();
        }
    }

    fn finish(self, winner: Side, ending: MatchEnding) -> MatchReport {
        debug!(%winner, %ending, times = ?self.times, "match over");
        MatchReport {
            winner,
            times: self.times,
            ending,
            moves: self.board.piece_count(),
        }
    }
}

/// Winner of a drawn board: the lower cumulative time, side two on an exact tie.
fn tie_break(times: [Duration; 2]) -> Side {
    if times[0] < times[1] {
        Side::One
    } else {
        Side::Two
    }
}

/// Outcome of the bracket match between `left` (side one) and `right` (side two).
///
/// A side without an entrant, or whose agent cannot be launched, loses without playing.
/// When neither side can play, nobody advances.
#[instrument(skip_all, fields(left = left.id(), right = right.id()))]
pub fn run_bracket_match(
    left: &Slot<Arc<Agent>>,
    right: &Slot<Arc<Agent>>,
    constraints: &Constraints,
    config: &Configuration,
) -> (MatchOutcome, Option<MatchReport>) {
    let (left, right) = match (left.handle(), right.handle()) {
        (Some(left), Some(right)) => (left, right),
        (Some(_), None) => return (MatchOutcome::walkover(Side::One), None),
        (None, Some(_)) => return (MatchOutcome::walkover(Side::Two), None),
        (None, None) => return (MatchOutcome::no_winner(), None),
    };

    let budget = constraints.action_timeout();
    let limits = constraints.match_limits();
    let agents = [left, right];
    let sandboxes = [Side::One, Side::Two].map(|side| {
        let i = side.index();
        launch_sandbox(agents[i], side, &limits[i], config, budget)
    });

    match sandboxes {
        [Ok(one), Ok(two)] => {
            let report = Match::new([one, two], [left.kind, right.kind], budget).play();
            (MatchOutcome::from(&report), Some(report))
        }
        [Ok(_), Err(e)] => {
            warn!("{} forfeits: {e:#}", right.name);
            (MatchOutcome::walkover(Side::One), None)
        }
        [Err(e), Ok(_)] => {
            warn!("{} forfeits: {e:#}", left.name);
            (MatchOutcome::walkover(Side::Two), None)
        }
        [Err(e1), Err(e2)] => {
            warn!("both agents forfeit: {e1:#} / {e2:#}");
            (MatchOutcome::no_winner(), None)
        }
    }
}
