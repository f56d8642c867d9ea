//! Bottom-up evaluation of a [`BracketTree`].
//!
//! Rounds are played from the deepest match-bearing level up to the final. A round is a
//! worklist of the nodes at one depth, processed left to right; a node's match is played only
//! when both of its children are resolved, and a round is finished before the next one starts.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::board::Side;
use crate::bracket::{BracketTree, NodeId, Slot};

/// Result of one bracket match, as reported by a [`MatchRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Winning side, `None` when neither side can be credited (both forfeited).
    pub winner: Option<Side>,
    /// Compute time charged to the left child in this match.
    pub left_time: Duration,
    /// Compute time charged to the right child in this match.
    pub right_time: Duration,
}

impl MatchOutcome {
    /// `side` won after spending the given times.
    pub fn won_by(side: Side, left_time: Duration, right_time: Duration) -> Self {
        Self {
            winner: Some(side),
            left_time,
            right_time,
        }
    }

    /// `side` advances without anything being played.
    pub fn walkover(side: Side) -> Self {
        Self::won_by(side, Duration::ZERO, Duration::ZERO)
    }

    /// Nobody advances.
    pub fn no_winner() -> Self {
        Self {
            winner: None,
            left_time: Duration::ZERO,
            right_time: Duration::ZERO,
        }
    }

    /// Time charged to `side`.
    pub fn time_of(&self, side: Side) -> Duration {
        match side {
            Side::One => self.left_time,
            Side::Two => self.right_time,
        }
    }
}

/// Plays the match between two resolved slots.
///
/// Byes reach the runner too: it must let the present side through (see
/// [`MatchOutcome::walkover`]) and must never fail. Any closure
/// `FnMut(&Slot<H>, &Slot<H>) -> MatchOutcome` is a runner.
pub trait MatchRunner<H> {
    /// Play `left` (side one) against `right` (side two).
    fn run_match(&mut self, left: &Slot<H>, right: &Slot<H>) -> MatchOutcome;
}

impl<H, F> MatchRunner<H> for F
where
    F: FnMut(&Slot<H>, &Slot<H>) -> MatchOutcome,
{
    fn run_match(&mut self, left: &Slot<H>, right: &Slot<H>) -> MatchOutcome {
        self(left, right)
    }
}

/// Play every match of `tree`, writing winners into parents and times into children.
///
/// Both children of a played match get their elimination time, including the winner: time is
/// attributed to the match, and the winner's own node is not read again for placement.
#[instrument(skip_all, fields(rounds = tree.round_count()))]
pub fn evaluate<H, R>(tree: &mut BracketTree<H>, runner: &mut R)
where
    H: Clone,
    R: MatchRunner<H>,
{
    for level in (1..=tree.round_count()).rev() {
        let round = tree.nodes_at_depth(level).collect::<Vec<_>>();
        debug!(level, matches = round.len(), "starting round");
        for parent in round {
            play_node(tree, parent, runner);
        }
    }
}

fn play_node<H, R>(tree: &mut BracketTree<H>, parent: NodeId, runner: &mut R)
where
    H: Clone,
    R: MatchRunner<H>,
{
    let Some((left, right)) = tree.children(parent) else {
        return;
    };
    let left_slot = tree.node(left).slot();
    let right_slot = tree.node(right).slot();
    if !left_slot.is_resolved() || !right_slot.is_resolved() {
        warn!(node = parent.index(), "children not resolved, match skipped");
        return;
    }

    let outcome = runner.run_match(left_slot, right_slot);
    let advancing = match outcome.winner {
        Some(Side::One) => left_slot.clone(),
        Some(Side::Two) => right_slot.clone(),
        None => Slot::Bye,
    };
    debug!(
        node = parent.index(),
        winner = advancing.id().unwrap_or("nobody"),
        ?outcome
    );

    tree.set_slot(parent, advancing);
    tree.set_elimination_time(left, outcome.left_time);
    tree.set_elimination_time(right, outcome.right_time);
}
