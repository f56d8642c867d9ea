//! Final ranking of an evaluated bracket.

use std::collections::HashSet;

use crate::bracket::{BracketTree, Slot};

/// Ranking of the entrants of an evaluated `tree`, best first.
///
/// Depth levels are read from the root down. Within a level, nodes are sorted by elimination
/// time (absent first, then ascending) and each entrant is appended the first time it is seen.
/// The champion, whose root node has no time, therefore comes first; every other entrant is
/// ranked by the round it was eliminated in, then by the time it spent in that match. Spending
/// less time ranks higher: a resource-use tie-break, not a measure of playing strength.
pub fn resolve<H>(tree: &BracketTree<H>) -> Vec<String> {
    let mut placings = Vec::new();
    let mut seen = HashSet::new();

    for depth in 1..=tree.round_count() + 1 {
        let mut level = tree
            .nodes_at_depth(depth)
            .map(|id| tree.node(id))
            .filter_map(|node| match node.slot() {
                Slot::Entrant { id, .. } => Some((id.as_str(), node.elimination_time())),
                Slot::Bye | Slot::Pending => None,
            })
            .collect::<Vec<_>>();
        // stable: equal times keep bracket order
        level.sort_by_key(|&(_, time)| time);

        for (id, _) in level {
            if seen.insert(id) {
                placings.push(id.to_string());
            }
        }
    }
    placings
}

#[cfg(test)]
mod placement_tests {
    use std::{collections::HashMap, time::Duration};

    use super::*;
    use crate::board::Side;
    use crate::round_evaluator::{evaluate, MatchOutcome};

    fn build(names: &[&str]) -> BracketTree<()> {
        BracketTree::build(names.iter().map(|n| (n.to_string(), ())).collect()).unwrap()
    }

    /// Lower name wins; each entrant spends the time listed for it in every match.
    fn play(tree: &mut BracketTree<()>, times: &HashMap<&str, u64>) {
        let time = |slot: &Slot<()>| {
            Duration::from_millis(slot.id().map(|id| times[id]).unwrap_or_default())
        };
        let mut runner = |l: &Slot<()>, r: &Slot<()>| match (l.id(), r.id()) {
            (Some(_), None) => MatchOutcome::walkover(Side::One),
            (None, Some(_)) => MatchOutcome::walkover(Side::Two),
            (None, None) => MatchOutcome::no_winner(),
            (Some(a), Some(b)) => {
                let side = if a <= b { Side::One } else { Side::Two };
                MatchOutcome::won_by(side, time(l), time(r))
            }
        };
        evaluate(tree, &mut runner);
    }

    #[test]
    fn champion_first_then_by_round() {
        let mut tree = build(&["A", "B", "C", "D"]);
        let times = HashMap::from([("A", 3), ("B", 2), ("C", 5), ("D", 1)]);
        play(&mut tree, &times);
        // first round: (A, D) and (B, C); D spent less than C in its losing match
        assert_eq!(resolve(&tree), vec!["A", "B", "D", "C"]);
    }

    #[test]
    fn five_entrants_with_byes() {
        let mut tree = build(&["E", "D", "C", "B", "A"]);
        let times = HashMap::from([("A", 4), ("B", 1), ("C", 2), ("D", 3), ("E", 5)]);
        play(&mut tree, &times);
        // first round: (E, bye) (D, bye) (C, bye) (B, A)
        // second round: (E, D) -> D, (C, A) -> A; final: (D, A) -> A
        assert_eq!(resolve(&tree), vec!["A", "D", "C", "E", "B"]);
    }

    #[test]
    fn placings_are_a_permutation_of_entrants() {
        for n in 1..=40 {
            let names = (0..n).map(|i| format!("p{i:02}")).collect::<Vec<_>>();
            let refs = names.iter().map(String::as_str).collect::<Vec<_>>();
            let mut tree = build(&refs);
            let times = refs
                .iter()
                .enumerate()
                .map(|(i, name)| (*name, (i as u64 * 7) % 11))
                .collect::<HashMap<_, _>>();
            play(&mut tree, &times);

            let placings = resolve(&tree);
            assert_eq!(placings.first().map(String::as_str), Some("p00"));
            let mut sorted = placings.clone();
            sorted.sort();
            assert_eq!(sorted, names, "n = {n}");
        }
    }

    #[test]
    fn unevaluated_tree_only_lists_first_round() {
        let tree = build(&["A", "B", "C"]);
        assert_eq!(resolve(&tree), vec!["A", "B", "C"]);
    }
}
