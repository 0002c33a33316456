//! Zobrist hashing for repetition detection.
//!
//! The key table is generated once from a fixed seed and shared for the
//! lifetime of the process.

use std::sync::OnceLock;

use crate::constants::{BOARD_SQUARES, FILES, ZOBRIST_SEED};
use crate::position::{CastlingRights, Color, Piece, Position, Square};

/// Random keys for every hashed feature of a position.
pub struct ZobristKeys {
    /// Indexed by [`Piece::index`] then square.
    pieces: [[u64; BOARD_SQUARES]; 12],
    /// Present when Black is to move.
    black_to_move: u64,
    /// White king-side, white queen-side, black king-side, black queen-side.
    castling: [u64; 4],
    /// En-passant target file.
    en_passant: [u64; FILES],
}

static KEYS: OnceLock<ZobristKeys> = OnceLock::new();

/// The shared key table.
pub fn keys() -> &'static ZobristKeys {
    KEYS.get_or_init(|| ZobristKeys::generate(ZOBRIST_SEED))
}

impl ZobristKeys {
    fn generate(seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut pieces = [[0u64; BOARD_SQUARES]; 12];
        for row in pieces.iter_mut() {
            for key in row.iter_mut() {
                *key = rng.u64(..);
            }
        }
        let black_to_move = rng.u64(..);
        let castling = std::array::from_fn(|_| rng.u64(..));
        let en_passant = std::array::from_fn(|_| rng.u64(..));
        Self {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }

    #[inline]
    pub fn piece(&self, piece: Piece, sq: Square) -> u64 {
        self.pieces[piece.index()][sq]
    }

    #[inline]
    pub fn side(&self) -> u64 {
        self.black_to_move
    }

    /// Combined key of every right that is still held.
    pub fn castling(&self, rights: CastlingRights) -> u64 {
        rights
            .flags()
            .iter()
            .zip(self.castling.iter())
            .filter(|(held, _)| **held)
            .fold(0, |acc, (_, key)| acc ^ key)
    }

    #[inline]
    pub fn en_passant(&self, sq: Square) -> u64 {
        self.en_passant[sq % FILES]
    }
}

/// Hash a position from scratch. Incremental updates in `make` must agree
/// with this in every reachable position.
pub fn hash_position(pos: &Position) -> u64 {
    let keys = keys();
    let mut hash = 0;
    for sq in 0..BOARD_SQUARES {
        if let Some(piece) = pos.piece_at(sq) {
            hash ^= keys.piece(piece, sq);
        }
    }
    if pos.side_to_move() == Color::Black {
        hash ^= keys.side();
    }
    hash ^= keys.castling(pos.castling());
    if let Some(ep) = pos.en_passant() {
        hash ^= keys.en_passant(ep);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_stable() {
        let a = ZobristKeys::generate(ZOBRIST_SEED);
        let b = keys();
        assert_eq!(a.black_to_move, b.black_to_move);
        assert_eq!(a.pieces[3][17], b.pieces[3][17]);
    }

    #[test]
    fn test_start_hash_matches_scratch() {
        let pos = Position::new();
        assert_eq!(pos.hash(), hash_position(&pos));
        assert_ne!(pos.hash(), 0);
    }
}
