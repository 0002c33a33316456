//! Legal move generation and game-result detection.
//!
//! Moves are generated pseudo-legally on the 10x12 mailbox and then filtered
//! by playing each one on a copy of the board and testing the mover's king.
//! The result is sorted by origin, destination and promotion piece
//! (queen, rook, bishop, knight), so the order is stable for an unchanged
//! position.

use std::fmt;

use crate::constants::{
    BISHOP_OFFSETS, BOARD_SQUARES, FIFTY_MOVE_HALFMOVES, KING_OFFSETS, KNIGHT_OFFSETS, MAILBOX,
    MAILBOX64, OFF_BOARD, RANKS, REPETITION_LIMIT, ROOK_OFFSETS,
};
use crate::error::RulesError;
use crate::position::{
    A1, A8, B1, B8, C1, C8, Color, D1, D8, E1, E8, F1, F8, G1, G8, H1, H8, Piece, PieceKind,
    Position, Square, castle_rook_squares, en_passant_victim, file_of, parse_square, rank_of,
    square_name,
};

/// Tag for moves that need more than a from/to relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Special {
    Castle,
    EnPassant,
    DoublePush,
}

/// A move produced by the generator.
///
/// Moves cannot be built from outside the crate: obtain them from
/// [`Position::legal_moves`] or [`Position::parse_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    special: Option<Special>,
}

const PROMOTIONS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

impl Move {
    #[inline]
    fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
            special: None,
        }
    }

    #[inline]
    fn with_special(from: Square, to: Square, special: Special) -> Self {
        Self {
            special: Some(special),
            ..Self::new(from, to)
        }
    }

    #[inline]
    pub fn from_square(&self) -> Square {
        self.from
    }

    #[inline]
    pub fn to_square(&self) -> Square {
        self.to
    }

    #[inline]
    pub fn promotion(&self) -> Option<PieceKind> {
        self.promotion
    }

    #[inline]
    pub fn special(&self) -> Option<Special> {
        self.special
    }

    /// Long algebraic text, e.g. `e2e4` or `e7e8q`.
    pub fn uci(&self) -> String {
        self.to_string()
    }

    fn sort_key(&self) -> (Square, Square, usize) {
        let promo = self
            .promotion
            .and_then(|p| PROMOTIONS.iter().position(|&k| k == p))
            .unwrap_or(0);
        (self.from, self.to, promo)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", square_name(self.from), square_name(self.to))?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.to_char())?;
        }
        Ok(())
    }
}

/// Why a game ended in a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    FiftyMoveRule,
    InsufficientMaterial,
    ThreefoldRepetition,
}

/// Outcome of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    Draw(DrawReason),
}

impl GameResult {
    pub fn is_terminal(self) -> bool {
        self != GameResult::Ongoing
    }

    /// Terminal value from the perspective of the side to move: -1 when it
    /// has been mated, 0 for any draw. `None` while the game is ongoing.
    pub fn value_for_side_to_move(self) -> Option<f64> {
        match self {
            GameResult::Ongoing => None,
            GameResult::Checkmate { .. } => Some(-1.0),
            GameResult::Stalemate | GameResult::Draw(_) => Some(0.0),
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Ongoing => write!(f, "ongoing"),
            GameResult::Checkmate { winner } => write!(f, "checkmate, {winner} wins"),
            GameResult::Stalemate => write!(f, "stalemate"),
            GameResult::Draw(DrawReason::FiftyMoveRule) => write!(f, "draw by fifty-move rule"),
            GameResult::Draw(DrawReason::InsufficientMaterial) => {
                write!(f, "draw by insufficient material")
            }
            GameResult::Draw(DrawReason::ThreefoldRepetition) => {
                write!(f, "draw by threefold repetition")
            }
        }
    }
}

/// Step from `sq` by a mailbox offset, or `None` when it leaves the board.
#[inline]
fn step(sq: Square, offset: i32) -> Option<Square> {
    let cell = MAILBOX[(MAILBOX64[sq] as i32 + offset) as usize];
    (cell != OFF_BOARD).then_some(cell as Square)
}

/// Is `sq` attacked by any piece of color `by` on `board`?
fn attacked(board: &[Option<Piece>; BOARD_SQUARES], sq: Square, by: Color) -> bool {
    let holds = |s: Option<Square>, kinds: &[PieceKind]| {
        s.and_then(|s| board[s])
            .is_some_and(|p| p.color == by && kinds.contains(&p.kind))
    };

    // A pawn of `by` attacks diagonally forward, so look diagonally backward.
    let pawn_sources: [i32; 2] = match by {
        Color::White => [-9, -11],
        Color::Black => [9, 11],
    };
    if pawn_sources
        .iter()
        .any(|&off| holds(step(sq, off), &[PieceKind::Pawn]))
    {
        return true;
    }
    if KNIGHT_OFFSETS
        .iter()
        .any(|&off| holds(step(sq, off), &[PieceKind::Knight]))
    {
        return true;
    }
    if KING_OFFSETS
        .iter()
        .any(|&off| holds(step(sq, off), &[PieceKind::King]))
    {
        return true;
    }

    let slider_hits = |offsets: &[i32], kinds: &[PieceKind]| {
        offsets.iter().any(|&off| {
            let mut cur = step(sq, off);
            while let Some(s) = cur {
                if let Some(p) = board[s] {
                    return p.color == by && kinds.contains(&p.kind);
                }
                cur = step(s, off);
            }
            false
        })
    };
    slider_hits(&ROOK_OFFSETS, &[PieceKind::Rook, PieceKind::Queen])
        || slider_hits(&BISHOP_OFFSETS, &[PieceKind::Bishop, PieceKind::Queen])
}

impl Position {
    /// Is `sq` attacked by `by`?
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        attacked(self.board(), sq, by)
    }

    /// Is the side to move in check?
    pub fn is_in_check(&self) -> bool {
        let us = self.side_to_move();
        self.is_attacked(self.king_square(us), us.opposite())
    }

    /// Every legal move, in a stable order.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = self.pseudo_legal_moves();
        moves.retain(|&mv| self.keeps_king_safe(mv));
        moves.sort_by_key(Move::sort_key);
        moves
    }

    /// Resolve move text against the legal moves of this position.
    pub fn parse_move(&self, text: &str) -> Result<Move, RulesError> {
        let text = text.trim().to_ascii_lowercase();
        let malformed = || RulesError::MalformedMove(text.clone());
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(malformed());
        }
        let from = parse_square(&text[0..2]).ok_or_else(malformed)?;
        let to = parse_square(&text[2..4]).ok_or_else(malformed)?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_char(c) {
                Some(kind) if PROMOTIONS.contains(&kind) => Some(kind),
                _ => return Err(malformed()),
            },
        };
        self.legal_moves()
            .into_iter()
            .find(|mv| mv.from == from && mv.to == to && mv.promotion == promotion)
            .ok_or(RulesError::IllegalMove(text))
    }

    /// The game state. Checkmate and stalemate take precedence over draws.
    pub fn result(&self) -> GameResult {
        self.result_with_moves(&self.legal_moves())
    }

    /// [`Position::result`] for callers that already hold the legal moves.
    pub fn result_with_moves(&self, legal: &[Move]) -> GameResult {
        if legal.is_empty() {
            return if self.is_in_check() {
                GameResult::Checkmate {
                    winner: self.side_to_move().opposite(),
                }
            } else {
                GameResult::Stalemate
            };
        }
        if self.halfmove_clock() >= FIFTY_MOVE_HALFMOVES {
            GameResult::Draw(DrawReason::FiftyMoveRule)
        } else if self.has_insufficient_material() {
            GameResult::Draw(DrawReason::InsufficientMaterial)
        } else if self.repetition_count() >= REPETITION_LIMIT {
            GameResult::Draw(DrawReason::ThreefoldRepetition)
        } else {
            GameResult::Ongoing
        }
    }

    /// Neither side can possibly mate: bare kings, a single minor piece, or
    /// only bishops that all stand on one square colour.
    pub fn has_insufficient_material(&self) -> bool {
        let mut minors = 0;
        let mut knights = 0;
        let mut bishop_colors = [false; 2];
        for sq in 0..BOARD_SQUARES {
            let Some(piece) = self.piece_at(sq) else { continue };
            match piece.kind {
                PieceKind::King => {}
                PieceKind::Knight => {
                    minors += 1;
                    knights += 1;
                }
                PieceKind::Bishop => {
                    minors += 1;
                    bishop_colors[(file_of(sq) + rank_of(sq)) % 2] = true;
                }
                _ => return false,
            }
        }
        minors <= 1 || (knights == 0 && !(bishop_colors[0] && bishop_colors[1]))
    }

    /// Count leaf nodes of the legal move tree to `depth`.
    pub fn perft(&mut self, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves = self.legal_moves();
        if depth == 1 {
            return moves.len() as u64;
        }
        let mut nodes = 0;
        for mv in moves {
            self.apply(mv);
            nodes += self.perft(depth - 1);
            self.retract();
        }
        nodes
    }

    /// Per-root-move perft counts, for locating generator bugs.
    pub fn divide(&mut self, depth: u32) -> Vec<(Move, u64)> {
        let moves = self.legal_moves();
        let mut counts = Vec::with_capacity(moves.len());
        for mv in moves {
            self.apply(mv);
            counts.push((mv, self.perft(depth.saturating_sub(1))));
            self.retract();
        }
        counts
    }

    fn keeps_king_safe(&self, mv: Move) -> bool {
        let us = self.side_to_move();
        let mut board = *self.board();
        let Some(piece) = board[mv.from].take() else {
            return false;
        };
        if mv.special == Some(Special::EnPassant) {
            board[en_passant_victim(mv.to, us)] = None;
        }
        board[mv.to] = Some(piece);
        if mv.special == Some(Special::Castle) {
            if let Some((rook_from, rook_to)) = castle_rook_squares(mv.to) {
                board[rook_to] = board[rook_from].take();
            }
        }
        let king = if piece.kind == PieceKind::King {
            mv.to
        } else {
            self.king_square(us)
        };
        !attacked(&board, king, us.opposite())
    }

    fn pseudo_legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        let us = self.side_to_move();
        for sq in 0..BOARD_SQUARES {
            let Some(piece) = self.piece_at(sq) else { continue };
            if piece.color != us {
                continue;
            }
            match piece.kind {
                PieceKind::Pawn => self.pawn_moves(sq, us, &mut moves),
                PieceKind::Knight => self.leaper_moves(sq, us, &KNIGHT_OFFSETS, &mut moves),
                PieceKind::King => {
                    self.leaper_moves(sq, us, &KING_OFFSETS, &mut moves);
                    self.castling_moves(us, &mut moves);
                }
                PieceKind::Bishop => self.slider_moves(sq, us, &BISHOP_OFFSETS, &mut moves),
                PieceKind::Rook => self.slider_moves(sq, us, &ROOK_OFFSETS, &mut moves),
                PieceKind::Queen => {
                    self.slider_moves(sq, us, &ROOK_OFFSETS, &mut moves);
                    self.slider_moves(sq, us, &BISHOP_OFFSETS, &mut moves);
                }
            }
        }
        moves
    }

    fn pawn_moves(&self, sq: Square, us: Color, moves: &mut Vec<Move>) {
        let (push, captures, start_rank, last_rank) = match us {
            Color::White => (10, [9, 11], 1, RANKS - 1),
            Color::Black => (-10, [-9, -11], RANKS - 2, 0),
        };
        let add = |moves: &mut Vec<Move>, to: Square, special: Option<Special>| {
            if rank_of(to) == last_rank {
                moves.extend(PROMOTIONS.iter().map(|&kind| Move {
                    promotion: Some(kind),
                    ..Move::new(sq, to)
                }));
            } else {
                moves.push(Move {
                    special,
                    ..Move::new(sq, to)
                });
            }
        };

        if let Some(one) = step(sq, push).filter(|&t| self.piece_at(t).is_none()) {
            add(moves, one, None);
            if rank_of(sq) == start_rank {
                if let Some(two) = step(one, push).filter(|&t| self.piece_at(t).is_none()) {
                    moves.push(Move::with_special(sq, two, Special::DoublePush));
                }
            }
        }
        for off in captures {
            let Some(to) = step(sq, off) else { continue };
            match self.piece_at(to) {
                Some(target) if target.color != us => add(moves, to, None),
                None if self.en_passant() == Some(to) => {
                    add(moves, to, Some(Special::EnPassant))
                }
                _ => {}
            }
        }
    }

    fn leaper_moves(&self, sq: Square, us: Color, offsets: &[i32], moves: &mut Vec<Move>) {
        for &off in offsets {
            let Some(to) = step(sq, off) else { continue };
            if self.piece_at(to).is_none_or(|p| p.color != us) {
                moves.push(Move::new(sq, to));
            }
        }
    }

    fn slider_moves(&self, sq: Square, us: Color, offsets: &[i32], moves: &mut Vec<Move>) {
        for &off in offsets {
            let mut cur = step(sq, off);
            while let Some(to) = cur {
                match self.piece_at(to) {
                    None => moves.push(Move::new(sq, to)),
                    Some(p) => {
                        if p.color != us {
                            moves.push(Move::new(sq, to));
                        }
                        break;
                    }
                }
                cur = step(to, off);
            }
        }
    }

    fn castling_moves(&self, us: Color, moves: &mut Vec<Move>) {
        let rights = self.castling();
        let options = match us {
            Color::White => [
                (rights.white_king_side, &WHITE_KING_SIDE),
                (rights.white_queen_side, &WHITE_QUEEN_SIDE),
            ],
            Color::Black => [
                (rights.black_king_side, &BLACK_KING_SIDE),
                (rights.black_queen_side, &BLACK_QUEEN_SIDE),
            ],
        };
        let them = us.opposite();
        for (held, rule) in options {
            if !held
                || self.king_square(us) != rule.king
                || self.piece_at(rule.rook) != Some(Piece::new(us, PieceKind::Rook))
                || rule.between.iter().any(|&s| self.piece_at(s).is_some())
                || rule.king_path.iter().any(|&s| self.is_attacked(s, them))
            {
                continue;
            }
            moves.push(Move::with_special(rule.king, rule.king_path[2], Special::Castle));
        }
    }
}

/// Squares involved in one castling option.
struct CastleRule {
    king: Square,
    rook: Square,
    /// Must be empty.
    between: &'static [Square],
    /// Must not be attacked; the last entry is the king's destination.
    king_path: [Square; 3],
}

const WHITE_KING_SIDE: CastleRule = CastleRule {
    king: E1,
    rook: H1,
    between: &[F1, G1],
    king_path: [E1, F1, G1],
};

const WHITE_QUEEN_SIDE: CastleRule = CastleRule {
    king: E1,
    rook: A1,
    between: &[D1, C1, B1],
    king_path: [E1, D1, C1],
};

const BLACK_KING_SIDE: CastleRule = CastleRule {
    king: E8,
    rook: H8,
    between: &[F8, G8],
    king_path: [E8, F8, G8],
};

const BLACK_QUEEN_SIDE: CastleRule = CastleRule {
    king: E8,
    rook: A8,
    between: &[D8, C8, B8],
    king_path: [E8, D8, C8],
};
