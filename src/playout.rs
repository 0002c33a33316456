//! Random playouts as an evaluator.
//!
//! A playout plays uniformly random legal moves until the game ends or the
//! ply limit is hit, then scores the result for the side to move at the
//! start. Priors are uniform.

use log::trace;

use crate::constants::MAX_ROLLOUT_PLIES;
use crate::error::EvaluatorError;
use crate::evaluator::{Evaluation, Evaluator};
use crate::position::Position;

/// Evaluator that scores positions with one random playout each.
#[derive(Debug, Clone)]
pub struct RolloutEvaluator {
    rng: fastrand::Rng,
    max_plies: usize,
}

impl RolloutEvaluator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            max_plies: MAX_ROLLOUT_PLIES,
        }
    }

    /// Cap the playout length; a playout that reaches the cap scores 0.
    pub fn with_max_plies(mut self, plies: usize) -> Self {
        self.max_plies = plies;
        self
    }
}

impl Evaluator for RolloutEvaluator {
    fn evaluate_one(&mut self, fen: &str, moves: &[String]) -> Result<Evaluation, EvaluatorError> {
        let mut pos =
            Position::from_fen(fen).map_err(|e| EvaluatorError::Failed(format!("{fen}: {e}")))?;
        Ok(Evaluation {
            weights: vec![1.0; moves.len()],
            value: playout(&mut pos, &mut self.rng, self.max_plies),
        })
    }
}

/// Play random moves from `pos` and return the outcome for the side that
/// was to move when the playout started.
pub fn playout(pos: &mut Position, rng: &mut fastrand::Rng, max_plies: usize) -> f64 {
    let mut plies = 0;
    let value = loop {
        let moves = pos.legal_moves();
        if let Some(v) = pos.result_with_moves(&moves).value_for_side_to_move() {
            break v;
        }
        if plies >= max_plies {
            break 0.0;
        }
        pos.apply(moves[rng.usize(..moves.len())]);
        plies += 1;
    };
    trace!("playout ended after {plies} plies with {value}");

    // The result above is for whoever moves last; flip back to the start.
    if plies % 2 == 1 { -value } else { value }
}
