//! Monte Carlo Tree Search driver.
//!
//! This module runs PUCT search with:
//! - Root expansion from the evaluator's priors (its value is not backed up)
//! - Optional Dirichlet noise on the root priors
//! - Simulations in waves: one leaf per wave in synchronous mode, up to
//!   `batch_size` leaves per wave in batched mode
//! - Terminal leaves scored from the game result without an evaluator call
//!
//! Every simulation ends in exactly one backup, so after `iterations`
//! simulations the root has `iterations` visits spread over its edges.

use std::collections::HashMap;

use log::debug;
use rand_distr::{Distribution, Gamma};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

use crate::bridge::{EvaluationBridge, PendingEvaluation};
use crate::config::{EvalMode, SearchConfig};
use crate::error::{ConfigError, EvaluatorError, Result, StateError};
use crate::evaluator::{Callbacks, Evaluator};
use crate::movegen::Move;
use crate::position::Position;
use crate::tree::{NodeId, NodeState, SearchTree};

/// Counters collected during one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub simulations: u32,
    pub waves: u32,
    /// Round trips to the evaluator, including the root expansion.
    pub evaluator_calls: u64,
    /// Positions sent to the evaluator.
    pub positions_evaluated: u64,
    /// Repeated positions inside a wave answered by one request.
    pub duplicates_merged: u64,
    /// Simulations that stopped at a leaf already pending in the same wave.
    pub collisions: u64,
    /// Simulations scored from a finished game.
    pub terminal_hits: u64,
    /// Nodes allocated in the tree.
    pub nodes: usize,
}

/// Outcome of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Root moves in generator order with their visit counts.
    pub children: Vec<(Move, u32)>,
    /// Mean backed-up value at the root, from the side to move.
    pub root_value: f64,
    pub root_visits: u32,
    pub stats: SearchStats,
}

impl SearchResult {
    fn degenerate(root_value: f64) -> Self {
        Self {
            children: Vec::new(),
            root_value,
            root_visits: 0,
            stats: SearchStats::default(),
        }
    }

    /// Most visited root move; the earliest in move order wins ties.
    pub fn best_move(&self) -> Option<Move> {
        self.children
            .iter()
            .rev()
            .max_by_key(|(_, visits)| *visits)
            .map(|(mv, _)| *mv)
    }

    /// Sum of visits over the root moves.
    pub fn total_child_visits(&self) -> u64 {
        self.children.iter().map(|(_, n)| *n as u64).sum()
    }
}

/// PUCT search with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct MctsSearch {
    config: SearchConfig,
}

/// Where a simulation stopped.
enum LeafKind {
    Terminal(f64),
    Pending(usize),
}

impl MctsSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run `iterations` simulations from `root`.
    ///
    /// A finished game at the root returns no children, the result's value
    /// (-1 when the side to move is mated, 0 for draws) and zero visits,
    /// whatever `iterations` is. With `iterations == 0` the evaluator is not
    /// called at all.
    pub fn run(
        &self,
        root: &Position,
        iterations: u32,
        seed: u64,
        evaluator: &mut dyn Evaluator,
        mode: EvalMode,
    ) -> Result<SearchResult> {
        self.config.validate()?;

        let root_moves = root.legal_moves();
        let outcome = root.result_with_moves(&root_moves);
        if let Some(value) = outcome.value_for_side_to_move() {
            debug!("root is terminal ({outcome}), nothing to search");
            return Ok(SearchResult::degenerate(value));
        }
        if iterations == 0 {
            return Ok(SearchResult::degenerate(0.0));
        }

        let mut tree = SearchTree::new(&self.config);
        let mut bridge = EvaluationBridge::new(evaluator, mode, self.config.normalize_priors);
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut stats = SearchStats::default();

        let root_request = [PendingEvaluation::new(NodeId::ROOT, root.clone(), root_moves)];
        let Some(root_eval) = bridge.evaluate(&root_request)?.into_iter().next() else {
            return Err(EvaluatorError::Failed("no evaluation returned for the root".into()).into());
        };
        tree.expand(NodeId::ROOT, &root_request[0].moves, &root_eval.priors);

        if self.config.uses_dirichlet() {
            let noise = dirichlet_noise(
                tree.root().edges().len(),
                self.config.dirichlet_alpha,
                seed,
            )?;
            tree.mix_root_noise(&noise, self.config.dirichlet_epsilon);
        }

        let mut scratch = root.clone();
        let wave = mode.wave_size();
        while stats.simulations < iterations {
            let size = wave.min((iterations - stats.simulations) as usize);
            self.run_wave(&mut tree, &mut scratch, &mut rng, &mut bridge, size, &mut stats)?;
        }

        let bridge_stats = bridge.stats();
        stats.evaluator_calls = bridge_stats.calls();
        stats.positions_evaluated = bridge_stats.positions_sent;
        stats.duplicates_merged = bridge_stats.duplicates_merged;
        stats.nodes = tree.len();

        let result = SearchResult {
            children: tree.root_children(),
            root_value: tree.root_value(),
            root_visits: tree.root_visits(),
            stats,
        };
        debug!(
            "search done: {} simulations in {} waves, {} evaluator calls, {} nodes, root value {:.3}",
            stats.simulations,
            stats.waves,
            stats.evaluator_calls,
            stats.nodes,
            result.root_value
        );
        Ok(result)
    }

    /// Select `size` leaves, evaluate the new ones together, then back
    /// everything up.
    fn run_wave(
        &self,
        tree: &mut SearchTree,
        scratch: &mut Position,
        rng: &mut fastrand::Rng,
        bridge: &mut EvaluationBridge<'_>,
        size: usize,
        stats: &mut SearchStats,
    ) -> Result<()> {
        let mut pending: Vec<PendingEvaluation> = Vec::with_capacity(size);
        let mut pending_slot: HashMap<NodeId, usize> = HashMap::with_capacity(size);

        for _ in 0..size {
            let descent = tree.descend(scratch, rng);
            let leaf = descent.leaf;
            let kind = match tree.node(leaf).state() {
                NodeState::Terminal(value) => LeafKind::Terminal(value),
                _ => match pending_slot.get(&leaf) {
                    Some(&slot) => LeafKind::Pending(slot),
                    None => {
                        let moves = scratch.legal_moves();
                        match scratch.result_with_moves(&moves).value_for_side_to_move() {
                            Some(value) => {
                                tree.mark_terminal(leaf, value);
                                LeafKind::Terminal(value)
                            }
                            None => {
                                pending.push(PendingEvaluation::new(leaf, scratch.clone(), moves));
                                pending_slot.insert(leaf, pending.len() - 1);
                                LeafKind::Pending(pending.len() - 1)
                            }
                        }
                    }
                },
            };
            unwind(scratch, descent.depth())?;

            match kind {
                LeafKind::Terminal(value) => {
                    stats.terminal_hits += 1;
                    tree.backup(&descent, value);
                }
                LeafKind::Pending(slot) => {
                    if !pending[slot].leases.is_empty() {
                        stats.collisions += 1;
                    }
                    let lease = tree.apply_virtual_loss(descent);
                    pending[slot].leases.push(lease);
                }
            }
            stats.simulations += 1;
        }

        let evaluations = bridge.evaluate(&pending)?;
        for (leaf, eval) in pending.into_iter().zip(evaluations) {
            tree.expand(leaf.leaf, &leaf.moves, &eval.priors);
            for lease in leaf.leases {
                let descent = tree.release_virtual_loss(lease);
                tree.backup(&descent, eval.value);
            }
        }
        stats.waves += 1;
        Ok(())
    }
}

/// Undo the moves a descent made on the scratch position.
fn unwind(pos: &mut Position, plies: usize) -> std::result::Result<(), StateError> {
    for _ in 0..plies {
        pos.unmake()?;
    }
    Ok(())
}

/// Sample a normalized Dirichlet(alpha) vector of length `n`.
fn dirichlet_noise(n: usize, alpha: f64, seed: u64) -> std::result::Result<Vec<f64>, ConfigError> {
    let gamma = Gamma::new(alpha, 1.0).map_err(|_| ConfigError::DirichletAlpha(alpha))?;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut samples: Vec<f64> = (0..n).map(|_| gamma.sample(&mut rng)).collect();

    let sum: f64 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    }
    Ok(samples)
}

/// Convenience function: search with the default configuration, in the
/// mode the callbacks select.
pub fn run_mcts(
    position: &Position,
    iterations: u32,
    seed: u64,
    callbacks: &mut Callbacks<'_>,
) -> Result<SearchResult> {
    let mode = callbacks.mode();
    MctsSearch::default().run(position, iterations, seed, callbacks, mode)
}

/// Print the root moves with their statistics.
pub fn dump_children(result: &SearchResult) {
    let total = result.total_child_visits().max(1) as f64;
    for (mv, visits) in &result.children {
        eprintln!(
            "move {} n={} share={:.3}",
            mv,
            visits,
            *visits as f64 / total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::evaluator::UniformEvaluator;

    #[test]
    fn test_visits_match_iterations() {
        let pos = Position::new();
        let result = MctsSearch::default()
            .run(&pos, 50, 1, &mut UniformEvaluator, EvalMode::Synchronous)
            .unwrap();
        assert_eq!(result.children.len(), 20);
        assert_eq!(result.total_child_visits(), 50);
        assert_eq!(result.root_visits, 50);
        assert_eq!(result.stats.simulations, 50);
        assert_eq!(result.stats.waves, 50);
    }

    #[test]
    fn test_zero_iterations_skips_evaluator() {
        let mut calls = 0;
        let mut cb = Callbacks::new().value(|_| {
            calls += 1;
            0.0
        });
        let result = run_mcts(&Position::new(), 0, 1, &mut cb).unwrap();
        drop(cb);
        assert!(result.children.is_empty());
        assert_eq!(result.root_visits, 0);
        assert_eq!(result.root_value, 0.0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_root_value_is_discarded() {
        // Only the root is worth +1; every other position is worth 0.
        let root_fen = Position::new().to_fen();
        let mut cb = Callbacks::new().value(move |fen| if fen == root_fen { 1.0 } else { 0.0 });
        let result = run_mcts(&Position::new(), 30, 4, &mut cb).unwrap();
        assert_eq!(result.root_value, 0.0);
    }

    #[test]
    fn test_best_move_prefers_first_on_tie() {
        let pos = Position::new();
        let moves = pos.legal_moves();
        let result = SearchResult {
            children: vec![(moves[0], 3), (moves[1], 5), (moves[2], 5)],
            root_value: 0.0,
            root_visits: 13,
            stats: SearchStats::default(),
        };
        assert_eq!(result.best_move(), Some(moves[1]));
        assert_eq!(SearchResult::degenerate(0.0).best_move(), None);
    }

    #[test]
    fn test_dirichlet_noise_is_normalized_and_seeded() {
        let a = dirichlet_noise(20, 0.3, 9).unwrap();
        let b = dirichlet_noise(20, 0.3, 9).unwrap();
        assert_eq!(a, b);
        assert!((a.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(a.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_invalid_config_rejected_before_search() {
        let search = MctsSearch::new(SearchConfig::default().with_c_puct(-2.0));
        let err = search
            .run(&Position::new(), 10, 0, &mut UniformEvaluator, EvalMode::Synchronous)
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::CPuct(_))));
    }
}
