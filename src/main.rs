//! puct-chess: PUCT search over chess positions.
//!
//! ## Usage
//!
//! - `puct-chess` - Show a demo
//! - `puct-chess search --fen <FEN>` - Search a position
//! - `puct-chess perft --depth 4` - Count leaf nodes of the move tree

use anyhow::Context;
use clap::{Parser, Subcommand};

use puct_chess::config::{EvalMode, SearchConfig};
use puct_chess::constants::{DEFAULT_DIRICHLET_EPSILON, DEFAULT_ITERATIONS, START_FEN};
use puct_chess::evaluator::{Evaluator, UniformEvaluator};
use puct_chess::mcts::{MctsSearch, SearchResult, dump_children};
use puct_chess::playout::RolloutEvaluator;
use puct_chess::position::Position;

/// puct-chess: chess move search with PUCT MCTS
#[derive(Parser)]
#[command(name = "puct-chess")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a position and print visit counts per move
    Search {
        /// Position to search
        #[arg(long, default_value = START_FEN)]
        fen: String,
        /// Number of simulations
        #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
        iterations: u32,
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        /// Evaluate leaves in waves of this size
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Score leaves with random playouts instead of a flat zero
        #[arg(long)]
        rollout: bool,
        /// Dirichlet noise concentration at the root (0 disables)
        #[arg(long, default_value_t = 0.0)]
        dirichlet: f64,
        #[arg(long)]
        c_puct: Option<f64>,
    },
    /// Count leaf nodes of the legal move tree, split by first move
    Perft {
        #[arg(long, default_value = START_FEN)]
        fen: String,
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
    },
    /// Run a short demo of the engine
    Demo,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Search {
            fen,
            iterations,
            seed,
            batch_size,
            rollout,
            dirichlet,
            c_puct,
        }) => {
            let pos = Position::from_fen(&fen).with_context(|| format!("invalid FEN: {fen}"))?;
            let mut config =
                SearchConfig::default().with_dirichlet(dirichlet, DEFAULT_DIRICHLET_EPSILON);
            if let Some(c) = c_puct {
                config = config.with_c_puct(c);
            }
            let mode = batch_size.map_or(EvalMode::Synchronous, EvalMode::batched);
            let mut evaluator: Box<dyn Evaluator> = if rollout {
                Box::new(RolloutEvaluator::new(seed))
            } else {
                Box::new(UniformEvaluator)
            };

            println!("{pos}\n");
            let result =
                MctsSearch::new(config).run(&pos, iterations, seed, evaluator.as_mut(), mode)?;
            report(&result);
        }
        Some(Commands::Perft { fen, depth }) => {
            let mut pos =
                Position::from_fen(&fen).with_context(|| format!("invalid FEN: {fen}"))?;
            let mut total = 0;
            for (mv, nodes) in pos.divide(depth) {
                println!("{mv}: {nodes}");
                total += nodes;
            }
            println!("\nNodes searched: {total}");
        }
        Some(Commands::Demo) | None => run_demo()?,
    }
    Ok(())
}

fn report(result: &SearchResult) {
    dump_children(result);
    match result.best_move() {
        Some(mv) => println!("Best move: {mv}"),
        None => println!("No legal moves"),
    }
    println!("Root value: {:+.3}", result.root_value);
    println!("Root visits: {}", result.root_visits);
    println!(
        "Evaluator calls: {}, nodes: {}",
        result.stats.evaluator_calls, result.stats.nodes
    );
}

fn run_demo() -> anyhow::Result<()> {
    println!("puct-chess: PUCT search over chess positions\n");

    println!("=== Move generation ===");
    let mut pos = Position::new();
    println!("Start position: {} legal moves", pos.legal_moves().len());
    println!("perft(3) = {}", pos.perft(3));

    println!("\n=== Synchronous search ===");
    let mut evaluator = RolloutEvaluator::new(1).with_max_plies(80);
    let result = MctsSearch::default().run(&pos, 200, 1, &mut evaluator, EvalMode::Synchronous)?;
    report(&result);

    println!("\n=== Batched search ===");
    pos.push("e2e4")?;
    pos.push("e7e5")?;
    println!("{pos}\n");
    let result =
        MctsSearch::default().run(&pos, 200, 1, &mut UniformEvaluator, EvalMode::batched(16))?;
    report(&result);
    Ok(())
}
