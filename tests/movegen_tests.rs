//! Integration tests for the chess rules.
//!
//! Perft counts are the published reference numbers for the standard test
//! positions; they exercise castling, en passant, promotions and pins.

use puct_chess::error::{Error, RulesError, StateError};
use puct_chess::movegen::{DrawReason, GameResult};
use puct_chess::position::{Color, Position};
use puct_chess::zobrist::hash_position;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
const POSITION_6: &str =
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

fn perft(fen: &str, depth: u32) -> u64 {
    Position::from_fen(fen).unwrap().perft(depth)
}

// =============================================================================
// Perft
// =============================================================================

#[test]
fn test_perft_start_position() {
    let mut pos = Position::new();
    assert_eq!(pos.perft(1), 20);
    assert_eq!(pos.perft(2), 400);
    assert_eq!(pos.perft(3), 8902);
}

#[test]
fn test_perft_kiwipete() {
    assert_eq!(perft(KIWIPETE, 1), 48);
    assert_eq!(perft(KIWIPETE, 2), 2039);
}

#[test]
fn test_perft_position_3() {
    assert_eq!(perft(POSITION_3, 1), 14);
    assert_eq!(perft(POSITION_3, 2), 191);
    assert_eq!(perft(POSITION_3, 3), 2812);
}

#[test]
fn test_perft_position_4() {
    assert_eq!(perft(POSITION_4, 1), 6);
    assert_eq!(perft(POSITION_4, 2), 264);
}

#[test]
fn test_perft_position_5() {
    assert_eq!(perft(POSITION_5, 1), 44);
    assert_eq!(perft(POSITION_5, 2), 1486);
}

#[test]
fn test_perft_position_6() {
    assert_eq!(perft(POSITION_6, 1), 46);
    assert_eq!(perft(POSITION_6, 2), 2079);
}

#[test]
fn test_divide_sums_to_perft() {
    let mut pos = Position::from_fen(KIWIPETE).unwrap();
    let split = pos.divide(2);
    assert_eq!(split.len(), 48);
    assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 2039);
}

// =============================================================================
// Make / unmake
// =============================================================================

#[test]
fn test_make_unmake_restores_everything() {
    for fen in [KIWIPETE, POSITION_3, POSITION_4, POSITION_5] {
        let mut pos = Position::from_fen(fen).unwrap();
        let before = pos.clone();
        for mv in before.legal_moves() {
            pos.make(mv).unwrap();
            assert_eq!(pos.hash(), hash_position(&pos), "{fen} after {mv}");
            for reply in pos.legal_moves() {
                pos.make(reply).unwrap();
                assert_eq!(pos.hash(), hash_position(&pos), "{fen} after {mv} {reply}");
                assert_eq!(pos.unmake().unwrap(), reply);
            }
            assert_eq!(pos.unmake().unwrap(), mv);
            assert_eq!(pos, before, "{fen} after unmaking {mv}");
        }
    }
}

#[test]
fn test_unmake_on_fresh_position_fails() {
    let mut pos = Position::new();
    assert_eq!(pos.unmake(), Err(StateError::EmptyUndoStack));
    pos.push("g1f3").unwrap();
    pos.pop().unwrap();
    assert_eq!(pos.pop(), Err(StateError::EmptyUndoStack));
}

#[test]
fn test_push_rejects_bad_moves() {
    let mut pos = Position::new();
    assert!(matches!(
        pos.push("e2e5"),
        Err(Error::Rules(RulesError::IllegalMove(_)))
    ));
    assert!(matches!(
        pos.push("zz"),
        Err(Error::Rules(RulesError::MalformedMove(_)))
    ));
    assert_eq!(pos.ply_count(), 0);
}

// =============================================================================
// FEN
// =============================================================================

#[test]
fn test_fen_round_trip() {
    for fen in [KIWIPETE, POSITION_3, POSITION_4, POSITION_5, POSITION_6] {
        assert_eq!(Position::from_fen(fen).unwrap().to_fen(), fen);
    }
}

#[test]
fn test_fen_after_moves() {
    let mut pos = Position::new();
    for mv in ["e2e4", "c7c5", "g1f3"] {
        pos.push(mv).unwrap();
    }
    assert_eq!(
        pos.to_fen(),
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
    );
    assert_eq!(pos.side_to_move(), Color::Black);
}

#[test]
fn test_fen_rejections() {
    let bad = [
        "",
        "8/8/8/8/8/8/8/8 w - - 0 1",
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1",
        "rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e4 0 1",
        "4k3/8/8/8/8/8/8/4K2R w Q - 0 1",
        "4k3/8/8/8/8/8/8/4K3 w - - x 1",
        // Side not to move is in check.
        "4k3/8/8/8/8/8/8/4RK2 w - - 0 1",
    ];
    for fen in bad {
        assert!(Position::from_fen(fen).is_err(), "accepted {fen:?}");
    }
}

// =============================================================================
// Game results
// =============================================================================

#[test]
fn test_scholars_mate() {
    let mut pos = Position::new();
    for mv in ["e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6", "h5f7"] {
        pos.push(mv).unwrap();
    }
    assert_eq!(
        pos.result(),
        GameResult::Checkmate {
            winner: Color::White
        }
    );
    assert_eq!(pos.result().value_for_side_to_move(), Some(-1.0));
}

#[test]
fn test_threefold_repetition_by_knight_shuffle() {
    let mut pos = Position::new();
    let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    for mv in shuffle {
        pos.push(mv).unwrap();
    }
    assert_eq!(pos.result(), GameResult::Ongoing);
    for mv in shuffle {
        pos.push(mv).unwrap();
    }
    assert_eq!(
        pos.result(),
        GameResult::Draw(DrawReason::ThreefoldRepetition)
    );
    pos.pop().unwrap();
    assert_eq!(pos.result(), GameResult::Ongoing);
}

#[test]
fn test_fifty_move_rule_from_fen() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 100 80").unwrap();
    assert_eq!(pos.result(), GameResult::Draw(DrawReason::FiftyMoveRule));
    let pos = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 99 80").unwrap();
    assert_eq!(pos.result(), GameResult::Ongoing);
}
