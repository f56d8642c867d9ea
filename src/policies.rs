//! Baseline move policies, usable as in-process entrants or inside process agents.

use std::sync::Mutex;

use rand::{seq::IteratorRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::board::{Board, Side};
use crate::game_interface::{Capability, MovePolicy};

/// Always plays the leftmost column that is not full.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstLegalColumn;

impl MovePolicy for FirstLegalColumn {
    fn select_move(&self, board: &Board, _side: Side, _capability: Capability) -> usize {
        board.legal_columns().next().unwrap_or(0)
    }
}

/// Plays a uniformly random legal column. Seeded, so runs are reproducible.
#[derive(Debug)]
pub struct RandomMover {
    rng: Mutex<ChaCha8Rng>,
}

impl RandomMover {
    /// A random mover with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl MovePolicy for RandomMover {
    fn select_move(&self, board: &Board, _side: Side, _capability: Capability) -> usize {
        // a poisoned lock only means an earlier move panicked; the rng is still usable
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        board.legal_columns().choose(&mut *rng).unwrap_or(0)
    }
}
