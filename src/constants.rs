//! Constants for board geometry, rules, and search parameters.
//!
//! Squares are numbered `0..64` with `a1 = 0`, `h1 = 7` and `h8 = 63`.
//! Sliding and leaping moves are generated on a 10x12 mailbox, where the two
//! padding ranks above and below the board and the padding file on each side
//! make every off-board step land on a sentinel.

// =============================================================================
// Board Geometry
// =============================================================================

/// Files (columns) on the board.
pub const FILES: usize = 8;

/// Ranks (rows) on the board.
pub const RANKS: usize = 8;

/// Playable squares.
pub const BOARD_SQUARES: usize = FILES * RANKS;

/// Size of the padded mailbox.
pub const MAILBOX_SIZE: usize = 120;

/// Sentinel stored in [`MAILBOX`] for off-board cells.
pub const OFF_BOARD: i8 = -1;

const fn build_mailbox() -> [i8; MAILBOX_SIZE] {
    let mut table = [OFF_BOARD; MAILBOX_SIZE];
    let mut sq = 0;
    while sq < BOARD_SQUARES {
        table[21 + (sq / FILES) * 10 + sq % FILES] = sq as i8;
        sq += 1;
    }
    table
}

const fn build_mailbox64() -> [usize; BOARD_SQUARES] {
    let mut table = [0; BOARD_SQUARES];
    let mut sq = 0;
    while sq < BOARD_SQUARES {
        table[sq] = 21 + (sq / FILES) * 10 + sq % FILES;
        sq += 1;
    }
    table
}

/// Mailbox cell -> square, or [`OFF_BOARD`].
pub const MAILBOX: [i8; MAILBOX_SIZE] = build_mailbox();

/// Square -> mailbox cell.
pub const MAILBOX64: [usize; BOARD_SQUARES] = build_mailbox64();

// =============================================================================
// Move Offsets (mailbox units, +10 is one rank towards rank 8)
// =============================================================================

pub const KNIGHT_OFFSETS: [i32; 8] = [-21, -19, -12, -8, 8, 12, 19, 21];
pub const KING_OFFSETS: [i32; 8] = [-11, -10, -9, -1, 1, 9, 10, 11];
pub const ROOK_OFFSETS: [i32; 4] = [-10, -1, 1, 10];
pub const BISHOP_OFFSETS: [i32; 4] = [-11, -9, 9, 11];

// =============================================================================
// Rules
// =============================================================================

/// Standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Halfmove clock value at which the fifty-move rule ends the game.
pub const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Occurrences of one position that end the game.
pub const REPETITION_LIMIT: usize = 3;

// =============================================================================
// Search Parameters
// =============================================================================

/// Default exploration constant in the PUCT score.
pub const DEFAULT_C_PUCT: f64 = std::f64::consts::SQRT_2;

/// Default provisional loss applied per in-flight simulation.
pub const DEFAULT_VIRTUAL_LOSS: f64 = 1.0;

/// Default number of leaves collected per evaluator wave.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Largest accepted batch size; larger requests are clamped.
pub const MAX_BATCH_SIZE: usize = 1024;

/// Default mixing weight of root Dirichlet noise (used when alpha > 0).
pub const DEFAULT_DIRICHLET_EPSILON: f64 = 0.25;

/// Plies a random playout may run before it is scored as a draw.
pub const MAX_ROLLOUT_PLIES: usize = 200;

/// Simulations used by the command-line demo.
pub const DEFAULT_ITERATIONS: u32 = 800;

/// Seed for the Zobrist key table. Fixed so hashes are stable across runs.
pub const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_roundtrip() {
        for sq in 0..BOARD_SQUARES {
            assert_eq!(MAILBOX[MAILBOX64[sq]], sq as i8);
        }
        let on_board = MAILBOX.iter().filter(|&&c| c != OFF_BOARD).count();
        assert_eq!(on_board, BOARD_SQUARES);
    }

    #[test]
    fn test_offsets_stay_on_board_from_center() {
        // d4 is far enough from every edge for a knight jump
        let d4 = MAILBOX64[3 * FILES + 3];
        for off in KNIGHT_OFFSETS {
            let cell = (d4 as i32 + off) as usize;
            assert_ne!(MAILBOX[cell], OFF_BOARD);
        }
    }
}
