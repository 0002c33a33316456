//! Integration tests for the PUCT search.

use std::cell::Cell;

use puct_chess::config::{EvalMode, SearchConfig};
use puct_chess::error::{ContractError, Error};
use puct_chess::evaluator::{Callbacks, UniformEvaluator};
use puct_chess::mcts::{MctsSearch, SearchResult, run_mcts};
use puct_chess::playout::RolloutEvaluator;
use puct_chess::position::Position;

const FOOLS_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
const STALEMATE: &str = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";
const BACK_RANK_MATE: &str = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1";

// =============================================================================
// Helpers
// =============================================================================

fn search(pos: &Position, iterations: u32, seed: u64, mode: EvalMode) -> SearchResult {
    MctsSearch::default()
        .run(pos, iterations, seed, &mut UniformEvaluator, mode)
        .unwrap()
}

fn visits(result: &SearchResult) -> Vec<u32> {
    result.children.iter().map(|(_, n)| *n).collect()
}

// =============================================================================
// Visit accounting
// =============================================================================

#[test]
fn test_visits_conserved_in_every_mode() {
    let pos = Position::new();
    for mode in [
        EvalMode::Synchronous,
        EvalMode::batched(1),
        EvalMode::batched(3),
        EvalMode::batched(32),
        EvalMode::batched(1024),
    ] {
        let result = search(&pos, 97, 5, mode);
        assert_eq!(result.children.len(), 20, "{mode:?}");
        assert_eq!(result.total_child_visits(), 97, "{mode:?}");
        assert_eq!(result.root_visits, 97, "{mode:?}");
    }
}

#[test]
fn test_children_follow_move_order() {
    let pos = Position::from_fen(BACK_RANK_MATE).unwrap();
    let result = search(&pos, 40, 2, EvalMode::Synchronous);
    let moves: Vec<_> = result.children.iter().map(|(mv, _)| *mv).collect();
    assert_eq!(moves, pos.legal_moves());
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_same_seed_same_result() {
    let mut pos = Position::new();
    pos.push("d2d4").unwrap();
    for mode in [EvalMode::Synchronous, EvalMode::batched(8)] {
        let a = MctsSearch::default()
            .run(&pos, 150, 42, &mut RolloutEvaluator::new(3).with_max_plies(40), mode)
            .unwrap();
        let b = MctsSearch::default()
            .run(&pos, 150, 42, &mut RolloutEvaluator::new(3).with_max_plies(40), mode)
            .unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_batch_of_one_matches_synchronous() {
    let pos = Position::from_fen(BACK_RANK_MATE).unwrap();
    let sync = search(&pos, 120, 9, EvalMode::Synchronous);
    let batched = search(&pos, 120, 9, EvalMode::batched(1));
    assert_eq!(sync.children, batched.children);
    assert_eq!(sync.root_value, batched.root_value);
}

#[test]
fn test_synchronous_search_extends_shorter_search() {
    let pos = Position::new();
    let short = search(&pos, 60, 17, EvalMode::Synchronous);
    let long = search(&pos, 90, 17, EvalMode::Synchronous);
    for (a, b) in visits(&short).iter().zip(visits(&long)) {
        assert!(*a <= b);
    }
}

// =============================================================================
// Batching
// =============================================================================

#[test]
fn test_batched_mode_calls_evaluator_once_per_wave() {
    let pos = Position::new();
    let sync = search(&pos, 64, 1, EvalMode::Synchronous);
    let batched = search(&pos, 64, 1, EvalMode::batched(8));

    // Root expansion plus one call per simulation or per wave. No game ends
    // within two plies of the start, so every simulation needs the evaluator.
    assert_eq!(sync.stats.evaluator_calls, 65);
    assert_eq!(batched.stats.evaluator_calls, 9);
    assert_eq!(batched.stats.waves, 8);
    assert_eq!(batched.total_child_visits(), 64);
    assert_eq!(sync.root_value, 0.0);
    assert_eq!(batched.root_value, 0.0);
}

#[test]
fn test_batch_callbacks_drive_batched_search() {
    let calls = Cell::new(0);
    let largest = Cell::new(0);
    let mut cb = Callbacks::new()
        .batch_eval(|fens, moves| {
            calls.set(calls.get() + 1);
            largest.set(largest.get().max(fens.len()));
            (
                moves.iter().map(|m| vec![1.0; m.len()]).collect(),
                vec![0.0; fens.len()],
            )
        })
        .batch_size(16);
    let result = run_mcts(&Position::new(), 64, 3, &mut cb).unwrap();
    drop(cb);

    assert_eq!(result.root_visits, 64);
    assert_eq!(calls.get(), 5);
    assert!(largest.get() <= 16);
}

#[test]
fn test_single_callbacks_drive_synchronous_search() {
    let priors = Cell::new(0);
    let values = Cell::new(0);
    let mut cb = Callbacks::new()
        .prior(|_, moves| {
            priors.set(priors.get() + 1);
            vec![1.0; moves.len()]
        })
        .value(|_| {
            values.set(values.get() + 1);
            0.0
        });
    let result = run_mcts(&Position::new(), 25, 0, &mut cb).unwrap();
    drop(cb);

    assert_eq!(result.root_visits, 25);
    assert_eq!(priors.get(), 26);
    assert_eq!(values.get(), 26);
}

// =============================================================================
// Terminal positions
// =============================================================================

#[test]
fn test_checkmated_root() {
    let pos = Position::from_fen(FOOLS_MATE).unwrap();
    let called = Cell::new(false);
    for iterations in [0, 1, 500] {
        let mut cb = Callbacks::new().value(|_| {
            called.set(true);
            0.0
        });
        let result = run_mcts(&pos, iterations, 1, &mut cb).unwrap();
        assert!(result.children.is_empty());
        assert_eq!(result.root_value, -1.0);
        assert_eq!(result.root_visits, 0);
        assert_eq!(result.best_move(), None);
    }
    assert!(!called.get());
}

#[test]
fn test_stalemated_root() {
    let pos = Position::from_fen(STALEMATE).unwrap();
    let result = search(&pos, 100, 1, EvalMode::Synchronous);
    assert!(result.children.is_empty());
    assert_eq!(result.root_value, 0.0);
    assert_eq!(result.root_visits, 0);
}

#[test]
fn test_finds_mate_in_one() {
    let pos = Position::from_fen(BACK_RANK_MATE).unwrap();
    for mode in [EvalMode::Synchronous, EvalMode::batched(16)] {
        let result = search(&pos, 800, 4, mode);
        assert_eq!(result.best_move().map(|m| m.uci()), Some("a1a8".to_string()));
        assert!(result.root_value > 0.0);
        assert!(result.stats.terminal_hits > 0);
    }
}

// =============================================================================
// Evaluator contract
// =============================================================================

#[test]
fn test_wrong_prior_length_aborts_search() {
    let mut cb = Callbacks::new().prior(|_, moves| vec![1.0; moves.len() + 1]);
    let err = run_mcts(&Position::new(), 10, 0, &mut cb).unwrap_err();
    assert!(matches!(
        err,
        Error::Contract(ContractError::PriorLength {
            expected: 20,
            actual: 21
        })
    ));
}

#[test]
fn test_value_out_of_range_aborts_batched_search() {
    let mut cb = Callbacks::new().batch_value(|fens| vec![1.5; fens.len()]);
    let err = run_mcts(&Position::new(), 10, 0, &mut cb).unwrap_err();
    assert!(err.is_contract());
}

#[test]
fn test_negative_weight_aborts_search() {
    let mut cb = Callbacks::new().prior(|_, moves| {
        let mut w = vec![1.0; moves.len()];
        w[0] = -1.0;
        w
    });
    let err = run_mcts(&Position::new(), 10, 0, &mut cb).unwrap_err();
    assert!(err.is_contract());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_dirichlet_noise_keeps_accounting_and_determinism() {
    let pos = Position::new();
    let search = MctsSearch::new(SearchConfig::default().with_dirichlet(0.3, 0.25));
    let a = search
        .run(&pos, 80, 8, &mut UniformEvaluator, EvalMode::Synchronous)
        .unwrap();
    let b = search
        .run(&pos, 80, 8, &mut UniformEvaluator, EvalMode::Synchronous)
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a.total_child_visits(), 80);
}

#[test]
fn test_priors_steer_visits() {
    // All weight on the first move; with zero values it should dominate.
    let mut cb = Callbacks::new().prior(|_, moves| {
        let mut w = vec![0.01; moves.len()];
        w[0] = 10.0;
        w
    });
    let pos = Position::new();
    let result = run_mcts(&pos, 200, 0, &mut cb).unwrap();
    assert_eq!(result.best_move(), Some(pos.legal_moves()[0]));
}

#[test]
fn test_normalized_priors_and_fpu_run() {
    let search = MctsSearch::new(
        SearchConfig::default()
            .with_normalized_priors(true)
            .with_fpu_reduction(0.3),
    );
    let result = search
        .run(&Position::new(), 100, 6, &mut RolloutEvaluator::new(1).with_max_plies(30), EvalMode::batched(10))
        .unwrap();
    assert_eq!(result.root_visits, 100);
    assert!((-1.0..=1.0).contains(&result.root_value));
}
