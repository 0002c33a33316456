//! puct-chess: chess rules plus PUCT Monte Carlo Tree Search.
//!
//! The search is driven by a pluggable evaluator that answers with move
//! weights and a position value, either one leaf at a time or in batches
//! gathered under virtual loss.
//!
//! ## Modules
//!
//! - [`constants`] - Board geometry, rule limits and search defaults
//! - [`position`] - Board state, FEN, make/unmake
//! - [`movegen`] - Legal moves, game results, perft
//! - [`zobrist`] - Position hashing for repetition detection
//! - [`tree`] - Search tree arena, PUCT selection, virtual loss, backup
//! - [`evaluator`] - The evaluator trait and caller-supplied closures
//! - [`bridge`] - Contract checks and batching between search and evaluator
//! - [`mcts`] - The search driver
//! - [`playout`] - Random-playout evaluator
//! - [`config`] - Search configuration and evaluation mode
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use puct_chess::config::EvalMode;
//! use puct_chess::evaluator::UniformEvaluator;
//! use puct_chess::mcts::MctsSearch;
//! use puct_chess::position::Position;
//!
//! let mut pos = Position::new();
//! pos.push("e2e4").unwrap();
//!
//! let result = MctsSearch::default()
//!     .run(&pos, 100, 7, &mut UniformEvaluator, EvalMode::Synchronous)
//!     .unwrap();
//! assert_eq!(result.root_visits, 100);
//! println!("Best move: {}", result.best_move().unwrap());
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluator;
pub mod mcts;
pub mod movegen;
pub mod playout;
pub mod position;
pub mod tree;
pub mod zobrist;

pub use error::{Error, Result};
