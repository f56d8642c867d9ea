//! The draw of a single-elimination tournament.
//!
//! A [`BracketTree`] is a perfect binary tree stored in an arena: the root is node `0` and the
//! children of node `i` are `2i + 1` and `2i + 2`. Leaves sit at depth `round_count + 1` and hold
//! the entrants (or byes) of the first round; every other node is filled in by
//! [`round_evaluator`](crate::round_evaluator) once the match between its children is played.
//!
//! Byes are spread over the first round with a modulo test on the number of first-round slots
//! already processed, so that they do not cluster at the top of the draw.

use std::{fmt, time::Duration};

use thiserror::Error;
use tracing::{debug, trace};

/// Identifies a node of a [`BracketTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in breadth-first order (root is `0`).
    pub fn index(self) -> usize {
        self.0
    }
}

/// Occupant of a bracket node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<H> {
    /// Not decided yet: the match below this node has not been played.
    Pending,
    /// Nobody: the opponent of this slot advances without playing.
    Bye,
    /// An entrant and the handle used to make it play.
    Entrant {
        /// Entrant identity, as used by the seeding and results lists.
        id: String,
        /// Opaque handle carried alongside the id.
        handle: H,
    },
}

impl<H> Slot<H> {
    /// True once the node holds an entrant or a bye.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Slot::Pending)
    }

    /// Entrant id, if the slot holds an entrant.
    pub fn id(&self) -> Option<&str> {
        match self {
            Slot::Entrant { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Entrant handle, if the slot holds an entrant.
    pub fn handle(&self) -> Option<&H> {
        match self {
            Slot::Entrant { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

/// One node of the draw.
#[derive(Debug, Clone)]
pub struct BracketNode<H> {
    slot: Slot<H>,
    depth: usize,
    elimination_time: Option<Duration>,
}

impl<H> BracketNode<H> {
    fn pending(depth: usize) -> Self {
        Self {
            slot: Slot::Pending,
            depth,
            elimination_time: None,
        }
    }

    /// Who occupies this node.
    pub fn slot(&self) -> &Slot<H> {
        &self.slot
    }

    /// Distance from the root, the root being at depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Compute time spent by this occupant in the match played from this node.
    ///
    /// `None` for the champion and for nodes whose match has not been played.
    pub fn elimination_time(&self) -> Option<Duration> {
        self.elimination_time
    }
}

/// Bracket construction failures. None of them is recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    /// A bracket needs at least one entrant.
    #[error("cannot build a bracket without entrants")]
    NoEntrants,
    /// The leaf assignment ran out of entrants before every first-round slot was filled.
    #[error("entrant list exhausted after {games_assigned} first-round slots")]
    Exhausted {
        /// Number of first-round slots filled before the failure.
        games_assigned: usize,
    },
    /// Entrants were left over once every first-round slot was filled.
    #[error("{0} entrants were not placed in the bracket")]
    Unplaced(usize),
}

/// Balanced single-elimination draw. `H` is the agent handle stored next to each entrant id.
#[derive(Debug, Clone)]
pub struct BracketTree<H> {
    nodes: Vec<BracketNode<H>>,
    round_count: usize,
    slot_count: usize,
    bye_count: usize,
    bye_interval: Option<usize>,
}

impl<H> BracketTree<H> {
    /// Build the draw for `entrants`, listed by seed (best seed first).
    ///
    /// With a single entrant the tree is just a root already holding that entrant.
    ///
    /// # Errors
    /// [`BracketError::NoEntrants`] for an empty list. The other variants denote an internal
    /// inconsistency of the leaf assignment.
    pub fn build(entrants: Vec<(String, H)>) -> Result<Self, BracketError> {
        let entrant_count = entrants.len();
        if entrant_count == 0 {
            return Err(BracketError::NoEntrants);
        }

        let slot_count = entrant_count.next_power_of_two();
        let round_count = slot_count.trailing_zeros() as usize;
        let bye_count = slot_count - entrant_count;
        let bye_interval = (bye_count > 0).then(|| (1 << (round_count - 1)) / bye_count);
        debug!(entrant_count, round_count, slot_count, bye_count, ?bye_interval);

        let mut tree = BracketTree {
            nodes: vec![BracketNode::pending(1)],
            round_count,
            slot_count,
            bye_count,
            bye_interval,
        };

        let mut remaining = entrants;
        if round_count == 0 {
            let (id, handle) = remaining.remove(0);
            tree.nodes[0].slot = Slot::Entrant { id, handle };
            return Ok(tree);
        }

        let mut pending_byes = bye_count;
        let mut games_assigned = 0;
        let mut frontier = 0..1;
        for _ in 0..round_count {
            let next_start = tree.nodes.len();
            for parent in frontier {
                let depth = tree.nodes[parent].depth;
                let (left, right) = if depth == round_count {
                    let bye_turn = bye_interval
                        .is_some_and(|interval| pending_byes > 0 && games_assigned % interval == 0);
                    let pair = if bye_turn {
                        let left = take(&mut remaining, 0, games_assigned)?;
                        pending_byes -= 1;
                        (left, Slot::Bye)
                    } else {
                        let left = take(&mut remaining, pending_byes, games_assigned)?;
                        let right = remaining
                            .pop()
                            .map(|(id, handle)| Slot::Entrant { id, handle })
                            .ok_or(BracketError::Exhausted { games_assigned })?;
                        (left, right)
                    };
                    games_assigned += 1;
                    pair
                } else {
                    (Slot::Pending, Slot::Pending)
                };
                for slot in [left, right] {
                    tree.nodes.push(BracketNode {
                        slot,
                        depth: depth + 1,
                        elimination_time: None,
                    });
                }
            }
            frontier = next_start..tree.nodes.len();
        }

        if !remaining.is_empty() {
            return Err(BracketError::Unplaced(remaining.len()));
        }
        trace!("bracket built with {} nodes", tree.nodes.len());
        Ok(tree)
    }

    /// `ceil(log2(entrant_count))`: number of rounds to play.
    pub fn round_count(&self) -> usize {
        self.round_count
    }

    /// Smallest power of two greater than or equal to the number of entrants.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Number of first-round byes.
    pub fn bye_count(&self) -> usize {
        self.bye_count
    }

    /// Spacing of byes among first-round slots, `None` when there are no byes.
    pub fn bye_interval(&self) -> Option<usize> {
        self.bye_interval
    }

    /// The node of the final.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Access a node.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &BracketNode<H> {
        &self.nodes[id.0]
    }

    /// Left and right children of a node, `None` for a leaf.
    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        let left = 2 * id.0 + 1;
        (left + 1 < self.nodes.len()).then_some((NodeId(left), NodeId(left + 1)))
    }

    /// Nodes at `depth`, from left to right. Empty outside `1..=round_count + 1`.
    pub fn nodes_at_depth(&self, depth: usize) -> impl Iterator<Item = NodeId> {
        let range = if depth == 0 || depth > self.round_count + 1 {
            0..0
        } else {
            (1 << (depth - 1)) - 1..(1 << depth) - 1
        };
        range.map(NodeId)
    }

    /// The first-round matches as `(left, right)` slots, from left to right.
    pub fn first_round(&self) -> Vec<(&Slot<H>, &Slot<H>)> {
        self.nodes_at_depth(self.round_count)
            .filter_map(|parent| self.children(parent))
            .map(|(left, right)| (self.node(left).slot(), self.node(right).slot()))
            .collect()
    }

    pub(crate) fn set_slot(&mut self, id: NodeId, slot: Slot<H>) {
        debug_assert!(!self.nodes[id.0].slot.is_resolved(), "node written twice");
        self.nodes[id.0].slot = slot;
    }

    pub(crate) fn set_elimination_time(&mut self, id: NodeId, time: Duration) {
        debug_assert!(self.nodes[id.0].elimination_time.is_none());
        self.nodes[id.0].elimination_time = Some(time);
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node(id);
        let name = match &node.slot {
            Slot::Entrant { id, .. } => id.as_str(),
            Slot::Bye => "Bye",
            Slot::Pending => "?",
        };
        let indent = "    ".repeat(node.depth - 1);
        match node.elimination_time {
            Some(time) => writeln!(f, "{indent}{name}/{:.3}", time.as_secs_f64())?,
            None => writeln!(f, "{indent}{name}/NA")?,
        }
        if let Some((left, right)) = self.children(id) {
            self.fmt_node(left, f)?;
            self.fmt_node(right, f)?;
        }
        Ok(())
    }
}

fn take<H>(
    remaining: &mut Vec<(String, H)>,
    index: usize,
    games_assigned: usize,
) -> Result<Slot<H>, BracketError> {
    if index >= remaining.len() {
        return Err(BracketError::Exhausted { games_assigned });
    }
    let (id, handle) = remaining.remove(index);
    Ok(Slot::Entrant { id, handle })
}

/// One line per node, indented by depth: `name/time`, with `Bye` and `NA` for absent values.
impl<H> fmt::Display for BracketTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(self.root(), f)
    }
}

#[cfg(test)]
mod bracket_tests {
    use super::*;

    fn entrants(names: &[&str]) -> Vec<(String, ())> {
        names.iter().map(|n| (n.to_string(), ())).collect()
    }

    fn numbered(n: usize) -> Vec<(String, ())> {
        (0..n).map(|i| (format!("agent_{i}"), ())).collect()
    }

    fn pairing(tree: &BracketTree<()>) -> Vec<(String, String)> {
        let label = |slot: &Slot<()>| slot.id().unwrap_or("bye").to_string();
        tree.first_round()
            .into_iter()
            .map(|(l, r)| (label(l), label(r)))
            .collect()
    }

    fn pair(l: &str, r: &str) -> (String, String) {
        (l.to_string(), r.to_string())
    }

    #[test]
    fn derived_constants() {
        for n in 2..=70 {
            let tree = BracketTree::build(numbered(n)).unwrap();
            let slots = tree.slot_count();
            assert!(slots.is_power_of_two());
            assert!(slots >= n && slots / 2 < n, "n = {n}");
            assert_eq!(1 << tree.round_count(), slots);
            assert_eq!(tree.bye_count(), slots - n);
            assert_eq!(tree.bye_interval().is_some(), slots != n);
        }
    }

    #[test]
    fn five_entrants_pairing() {
        let tree = BracketTree::build(entrants(&["A", "B", "C", "D", "E"])).unwrap();
        assert_eq!(tree.round_count(), 3);
        assert_eq!(tree.slot_count(), 8);
        assert_eq!(tree.bye_count(), 3);
        assert_eq!(tree.bye_interval(), Some(1));
        assert_eq!(
            pairing(&tree),
            vec![
                pair("A", "bye"),
                pair("B", "bye"),
                pair("C", "bye"),
                pair("D", "E")
            ]
        );
    }

    #[test]
    fn six_entrants_spread_byes() {
        let tree = BracketTree::build(entrants(&["A", "B", "C", "D", "E", "F"])).unwrap();
        assert_eq!(tree.bye_interval(), Some(2));
        assert_eq!(
            pairing(&tree),
            vec![
                pair("A", "bye"),
                pair("C", "F"),
                pair("B", "bye"),
                pair("D", "E")
            ]
        );
    }

    #[test]
    fn power_of_two_pairs_top_with_bottom() {
        let tree =
            BracketTree::build(entrants(&["A", "B", "C", "D", "E", "F", "G", "H"])).unwrap();
        assert_eq!(tree.bye_interval(), None);
        assert_eq!(
            pairing(&tree),
            vec![pair("A", "H"), pair("B", "G"), pair("C", "F"), pair("D", "E")]
        );
    }

    #[test]
    fn two_entrants_meet_in_the_final() {
        let tree = BracketTree::build(entrants(&["A", "B"])).unwrap();
        assert_eq!(tree.round_count(), 1);
        let (left, right) = tree.children(tree.root()).unwrap();
        assert_eq!(tree.node(left).slot().id(), Some("A"));
        assert_eq!(tree.node(right).slot().id(), Some("B"));
        assert_eq!(tree.node(left).depth(), 2);
        assert!(tree.children(left).is_none());
    }

    #[test]
    fn byes_only_in_first_round_and_never_paired_together() {
        for n in 2..=70 {
            let tree = BracketTree::build(numbered(n)).unwrap();
            let leaf_depth = tree.round_count() + 1;
            for depth in 1..=leaf_depth {
                for id in tree.nodes_at_depth(depth) {
                    let slot = tree.node(id).slot();
                    if depth < leaf_depth {
                        assert_eq!(slot, &Slot::Pending);
                    } else {
                        assert!(slot.is_resolved());
                    }
                }
            }
            let first_round = tree.first_round();
            assert_eq!(first_round.len(), tree.slot_count() / 2);
            let byes = first_round
                .iter()
                .filter(|(l, r)| matches!(l, Slot::Bye) || matches!(r, Slot::Bye))
                .count();
            assert_eq!(byes, tree.bye_count());
            assert!(first_round
                .iter()
                .all(|(l, r)| !(matches!(l, Slot::Bye) && matches!(r, Slot::Bye))));
        }
    }

    #[test]
    fn every_entrant_is_placed_once() {
        for n in 2..=70 {
            let tree = BracketTree::build(numbered(n)).unwrap();
            let mut ids = tree
                .first_round()
                .into_iter()
                .flat_map(|(l, r)| [l.id(), r.id()])
                .flatten()
                .map(str::to_string)
                .collect::<Vec<_>>();
            ids.sort();
            let mut expected = numbered(n).into_iter().map(|(id, _)| id).collect::<Vec<_>>();
            expected.sort();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = BracketTree::<()>::build(vec![]).unwrap_err();
        assert_eq!(err, BracketError::NoEntrants);
    }

    #[test]
    fn single_entrant_is_the_root() {
        let tree = BracketTree::build(entrants(&["solo"])).unwrap();
        assert_eq!(tree.round_count(), 0);
        assert_eq!(tree.node(tree.root()).slot().id(), Some("solo"));
        assert!(tree.children(tree.root()).is_none());
        assert!(tree.first_round().is_empty());
    }

    #[test]
    fn dump_shows_byes_and_missing_times() {
        let tree = BracketTree::build(entrants(&["A", "B", "C"])).unwrap();
        let dump = tree.to_string();
        let lines = dump.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "?/NA");
        assert_eq!(lines[2], "        A/NA");
        assert_eq!(lines[3], "        Bye/NA");
    }
}
