//! Chess position representation with make/unmake.
//!
//! This module provides the board state and the undo discipline:
//! - Square-indexed piece occupancy (`a1 = 0`, `h8 = 63`)
//! - Castling rights, en-passant target and move counters
//! - An incrementally maintained Zobrist hash
//! - FEN parsing and formatting
//!
//! Every `make` pushes an undo record, and `unmake` restores the position to
//! exactly the state it had before the matching `make`. Move generation and
//! game-result detection live in [`crate::movegen`].

use std::fmt;

use crate::constants::{BOARD_SQUARES, FILES, RANKS, START_FEN};
use crate::error::{Error, RulesError, StateError};
use crate::movegen::{Move, Special};
use crate::zobrist::{self, keys};

/// A square index in `0..64`.
pub type Square = usize;

#[inline]
pub const fn file_of(sq: Square) -> usize {
    sq % FILES
}

#[inline]
pub const fn rank_of(sq: Square) -> usize {
    sq / FILES
}

#[inline]
pub const fn make_square(file: usize, rank: usize) -> Square {
    rank * FILES + file
}

/// Parse a square name such as `"e4"`.
pub fn parse_square(s: &str) -> Option<Square> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].wrapping_sub(b'a') as usize;
    let rank = bytes[1].wrapping_sub(b'1') as usize;
    (file < FILES && rank < RANKS).then(|| make_square(file, rank))
}

/// Format a square as its name, e.g. `12` -> `"e2"`.
pub fn square_name(sq: Square) -> String {
    let file = (b'a' + file_of(sq) as u8) as char;
    let rank = (b'1' + rank_of(sq) as u8) as char;
    format!("{file}{rank}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Lowercase letter used in FEN and move text.
    pub fn to_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    /// Index in `0..12`, white pieces first.
    #[inline]
    pub fn index(self) -> usize {
        self.color.index() * 6 + self.kind as usize
    }

    /// FEN letter: uppercase for White, lowercase for Black.
    pub fn to_char(self) -> char {
        let c = self.kind.to_char();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        let kind = PieceKind::from_char(c)?;
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self { color, kind })
    }
}

/// The four independent castling rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub const ALL: Self = Self {
        white_king_side: true,
        white_queen_side: true,
        black_king_side: true,
        black_queen_side: true,
    };

    /// Rights in `KQkq` order.
    pub fn flags(self) -> [bool; 4] {
        [
            self.white_king_side,
            self.white_queen_side,
            self.black_king_side,
            self.black_queen_side,
        ]
    }

    pub fn is_empty(self) -> bool {
        self == Self::default()
    }

    /// Drop every right that depends on a piece standing on `sq`.
    fn clear_for_square(&mut self, sq: Square) {
        match sq {
            E1 => {
                self.white_king_side = false;
                self.white_queen_side = false;
            }
            H1 => self.white_king_side = false,
            A1 => self.white_queen_side = false,
            E8 => {
                self.black_king_side = false;
                self.black_queen_side = false;
            }
            H8 => self.black_king_side = false,
            A8 => self.black_queen_side = false,
            _ => {}
        }
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        for (held, c) in self.flags().iter().zip(['K', 'Q', 'k', 'q']) {
            if *held {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

pub(crate) const A1: Square = 0;
pub(crate) const B1: Square = 1;
pub(crate) const C1: Square = 2;
pub(crate) const D1: Square = 3;
pub(crate) const E1: Square = 4;
pub(crate) const F1: Square = 5;
pub(crate) const G1: Square = 6;
pub(crate) const H1: Square = 7;
pub(crate) const A8: Square = 56;
pub(crate) const B8: Square = 57;
pub(crate) const C8: Square = 58;
pub(crate) const D8: Square = 59;
pub(crate) const E8: Square = 60;
pub(crate) const F8: Square = 61;
pub(crate) const G8: Square = 62;
pub(crate) const H8: Square = 63;

/// Rook origin and destination for a castling king destination.
pub(crate) fn castle_rook_squares(king_to: Square) -> Option<(Square, Square)> {
    match king_to {
        G1 => Some((H1, F1)),
        C1 => Some((A1, D1)),
        G8 => Some((H8, F8)),
        C8 => Some((A8, D8)),
        _ => None,
    }
}

/// Square of the pawn removed by an en-passant capture landing on `to`.
#[inline]
pub(crate) fn en_passant_victim(to: Square, mover: Color) -> Square {
    match mover {
        Color::White => to - FILES,
        Color::Black => to + FILES,
    }
}

/// Everything `make` overwrites that cannot be recomputed from the move.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Undo {
    mv: Move,
    captured: Option<Piece>,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove: u32,
    fullmove: u32,
    hash: u64,
}

/// A chess position.
///
/// Fields are private so the hash, king squares and undo stack always agree
/// with the board. Equality compares every field, including the undo stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    board: [Option<Piece>; BOARD_SQUARES],
    side: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove: u32,
    fullmove: u32,
    kings: [Square; 2],
    hash: u64,
    history: Vec<Undo>,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    /// The standard starting position.
    pub fn new() -> Self {
        use PieceKind::*;
        const BACK_RANK: [PieceKind; 8] = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];

        let mut board = [None; BOARD_SQUARES];
        for (file, &kind) in BACK_RANK.iter().enumerate() {
            board[make_square(file, 0)] = Some(Piece::new(Color::White, kind));
            board[make_square(file, 1)] = Some(Piece::new(Color::White, Pawn));
            board[make_square(file, 6)] = Some(Piece::new(Color::Black, Pawn));
            board[make_square(file, 7)] = Some(Piece::new(Color::Black, kind));
        }
        let mut pos = Position {
            board,
            side: Color::White,
            castling: CastlingRights::ALL,
            en_passant: None,
            halfmove: 0,
            fullmove: 1,
            kings: [E1, E8],
            hash: 0,
            history: Vec::new(),
        };
        pos.hash = zobrist::hash_position(&pos);
        pos
    }

    /// Parse a FEN string.
    ///
    /// The move counters may be omitted (they default to `0 1`). The
    /// position is rejected unless each side has exactly one king, no pawn
    /// stands on the first or last rank, the side not to move is not in
    /// check, every castling right has its king and rook at home, and the
    /// en-passant square sits behind a pawn that could have just
    /// double-stepped from an empty home square.
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if !(4..=6).contains(&fields.len()) {
            return Err(RulesError::FenFieldCount(fields.len()));
        }

        let board = parse_placement(fields[0])?;
        let side = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(RulesError::FenSideToMove(other.to_string())),
        };
        let castling = parse_castling(fields[2])?;
        let en_passant = match fields[3] {
            "-" => None,
            s => Some(parse_square(s).ok_or_else(|| RulesError::FenEnPassant(s.to_string()))?),
        };
        let halfmove = parse_counter(fields.get(4).copied(), 0)?;
        let fullmove = parse_counter(fields.get(5).copied(), 1)?;

        let mut kings = [None, None];
        for (sq, piece) in board.iter().enumerate() {
            let Some(piece) = piece else { continue };
            match piece.kind {
                PieceKind::King => {
                    if kings[piece.color.index()].replace(sq).is_some() {
                        return Err(RulesError::IllegalPosition(format!(
                            "more than one {} king",
                            piece.color
                        )));
                    }
                }
                PieceKind::Pawn if rank_of(sq) == 0 || rank_of(sq) == RANKS - 1 => {
                    return Err(RulesError::IllegalPosition(format!(
                        "pawn on {}",
                        square_name(sq)
                    )));
                }
                _ => {}
            }
        }
        let [Some(white_king), Some(black_king)] = kings else {
            return Err(RulesError::IllegalPosition(
                "each side needs exactly one king".into(),
            ));
        };

        let mut pos = Position {
            board,
            side,
            castling,
            en_passant,
            halfmove,
            fullmove,
            kings: [white_king, black_king],
            hash: 0,
            history: Vec::new(),
        };
        pos.validate_castling()?;
        pos.validate_en_passant()?;
        if pos.is_attacked(pos.king_square(side.opposite()), side) {
            return Err(RulesError::IllegalPosition(format!(
                "{} is in check but it is {} to move",
                side.opposite(),
                side
            )));
        }
        pos.hash = zobrist::hash_position(&pos);
        Ok(pos)
    }

    fn validate_castling(&self) -> Result<(), RulesError> {
        let requirements = [
            (self.castling.white_king_side, 'K', Color::White, E1, H1),
            (self.castling.white_queen_side, 'Q', Color::White, E1, A1),
            (self.castling.black_king_side, 'k', Color::Black, E8, H8),
            (self.castling.black_queen_side, 'q', Color::Black, E8, A8),
        ];
        for (held, flag, color, king_sq, rook_sq) in requirements {
            if !held {
                continue;
            }
            let king_home = self.board[king_sq] == Some(Piece::new(color, PieceKind::King));
            let rook_home = self.board[rook_sq] == Some(Piece::new(color, PieceKind::Rook));
            if !king_home || !rook_home {
                return Err(RulesError::IllegalPosition(format!(
                    "castling right {flag} without king and rook on their home squares"
                )));
            }
        }
        Ok(())
    }

    fn validate_en_passant(&self) -> Result<(), RulesError> {
        let Some(ep) = self.en_passant else {
            return Ok(());
        };
        // The pawn that just moved belongs to the side not to move.
        let target_rank = match self.side {
            Color::White => 5,
            Color::Black => 2,
        };
        if rank_of(ep) != target_rank || self.board[ep].is_some() {
            return Err(RulesError::FenEnPassant(square_name(ep)));
        }
        let pawn_sq = en_passant_victim(ep, self.side);
        if self.board[pawn_sq] != Some(Piece::new(self.side.opposite(), PieceKind::Pawn)) {
            return Err(RulesError::FenEnPassant(square_name(ep)));
        }
        // The pawn has just left its home square.
        let origin = match self.side {
            Color::White => ep + FILES,
            Color::Black => ep - FILES,
        };
        if self.board[origin].is_some() {
            return Err(RulesError::FenEnPassant(square_name(ep)));
        }
        Ok(())
    }

    /// Format the position as FEN.
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);
        for rank in (0..RANKS).rev() {
            let mut empty = 0;
            for file in 0..FILES {
                match self.board[make_square(file, rank)] {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        fen.push(piece.to_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                fen.push('/');
            }
        }
        let side = match self.side {
            Color::White => 'w',
            Color::Black => 'b',
        };
        let ep = self.en_passant.map_or_else(|| "-".to_string(), square_name);
        fen.push_str(&format!(
            " {side} {} {ep} {} {}",
            self.castling, self.halfmove, self.fullmove
        ));
        fen
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board[sq]
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.kings[color.index()]
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub(crate) fn board(&self) -> &[Option<Piece>; BOARD_SQUARES] {
        &self.board
    }

    /// Number of moves that can be unmade.
    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|u| u.mv)
    }

    /// How many times the current position has occurred since the last
    /// capture or pawn move, counting the current occurrence.
    pub fn repetition_count(&self) -> usize {
        let reach = (self.halfmove as usize).min(self.history.len());
        1 + (2..=reach)
            .step_by(2)
            .filter(|&back| self.history[self.history.len() - back].hash == self.hash)
            .count()
    }

    // -------------------------------------------------------------------------
    // Make / unmake
    // -------------------------------------------------------------------------

    /// Apply a move, which must be one of this position's legal moves.
    ///
    /// A move generated for some other position is rejected with
    /// [`StateError::MoveNotApplicable`] and the position is left untouched.
    /// Use [`Position::push`] for caller-supplied move text.
    pub fn make(&mut self, mv: Move) -> Result<(), StateError> {
        if !self.legal_moves().contains(&mv) {
            return Err(StateError::MoveNotApplicable(mv.to_string()));
        }
        self.apply(mv);
        Ok(())
    }

    /// Undo the most recent `make`, returning the move that was undone.
    pub fn unmake(&mut self) -> Result<Move, StateError> {
        self.retract().ok_or(StateError::EmptyUndoStack)
    }

    /// Validate move text against the legal moves and apply it.
    pub fn push(&mut self, text: &str) -> Result<Move, Error> {
        let mv = self.parse_move(text)?;
        self.apply(mv);
        Ok(mv)
    }

    /// Undo the most recent move.
    pub fn pop(&mut self) -> Result<Move, StateError> {
        self.unmake()
    }

    /// Make a move known to be legal here, skipping validation.
    pub(crate) fn apply(&mut self, mv: Move) {
        let keys = keys();
        let (from, to) = (mv.from_square(), mv.to_square());
        let Some(piece) = self.board[from] else {
            return;
        };
        let us = self.side;

        let capture_sq = match mv.special() {
            Some(Special::EnPassant) => en_passant_victim(to, us),
            _ => to,
        };
        let captured = self.board[capture_sq];

        self.history.push(Undo {
            mv,
            captured,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove: self.halfmove,
            fullmove: self.fullmove,
            hash: self.hash,
        });

        if let Some(ep) = self.en_passant.take() {
            self.hash ^= keys.en_passant(ep);
        }
        self.hash ^= keys.castling(self.castling);

        if captured.is_some() {
            self.take(capture_sq);
        }
        self.take(from);
        let placed = match mv.promotion() {
            Some(kind) => Piece::new(us, kind),
            None => piece,
        };
        self.put(to, placed);

        if mv.special() == Some(Special::Castle) {
            if let Some((rook_from, rook_to)) = castle_rook_squares(to) {
                if let Some(rook) = self.take(rook_from) {
                    self.put(rook_to, rook);
                }
            }
        }
        if piece.kind == PieceKind::King {
            self.kings[us.index()] = to;
        }

        self.castling.clear_for_square(from);
        self.castling.clear_for_square(to);
        self.hash ^= keys.castling(self.castling);

        if mv.special() == Some(Special::DoublePush) {
            let ep = (from + to) / 2;
            self.en_passant = Some(ep);
            self.hash ^= keys.en_passant(ep);
        }

        if piece.kind == PieceKind::Pawn || captured.is_some() {
            self.halfmove = 0;
        } else {
            self.halfmove = self.halfmove.saturating_add(1);
        }
        if us == Color::Black {
            self.fullmove = self.fullmove.saturating_add(1);
        }
        self.side = us.opposite();
        self.hash ^= keys.side();
    }

    pub(crate) fn retract(&mut self) -> Option<Move> {
        let undo = self.history.pop()?;
        let mv = undo.mv;
        let (from, to) = (mv.from_square(), mv.to_square());
        let us = self.side.opposite();

        if let Some(moved) = self.board[to].take() {
            let original = if mv.promotion().is_some() {
                Piece::new(us, PieceKind::Pawn)
            } else {
                moved
            };
            self.board[from] = Some(original);
            if original.kind == PieceKind::King {
                self.kings[us.index()] = from;
            }
        }
        if mv.special() == Some(Special::Castle) {
            if let Some((rook_from, rook_to)) = castle_rook_squares(to) {
                self.board[rook_from] = self.board[rook_to].take();
            }
        }
        if let Some(captured) = undo.captured {
            let capture_sq = match mv.special() {
                Some(Special::EnPassant) => en_passant_victim(to, us),
                _ => to,
            };
            self.board[capture_sq] = Some(captured);
        }

        self.side = us;
        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove = undo.halfmove;
        self.fullmove = undo.fullmove;
        self.hash = undo.hash;
        Some(mv)
    }

    #[inline]
    fn put(&mut self, sq: Square, piece: Piece) {
        self.board[sq] = Some(piece);
        self.hash ^= keys().piece(piece, sq);
    }

    #[inline]
    fn take(&mut self, sq: Square) -> Option<Piece> {
        let piece = self.board[sq].take()?;
        self.hash ^= keys().piece(piece, sq);
        Some(piece)
    }
}

fn parse_placement(field: &str) -> Result<[Option<Piece>; BOARD_SQUARES], RulesError> {
    let rows: Vec<&str> = field.split('/').collect();
    if rows.len() != RANKS {
        return Err(RulesError::FenPlacement(format!(
            "expected {RANKS} ranks, found {}",
            rows.len()
        )));
    }
    let mut board = [None; BOARD_SQUARES];
    for (i, row) in rows.iter().enumerate() {
        let rank = RANKS - 1 - i;
        let mut file = 0;
        for c in row.chars() {
            if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                file += skip as usize;
                continue;
            }
            let piece = Piece::from_char(c)
                .ok_or_else(|| RulesError::FenPlacement(format!("unexpected character {c:?}")))?;
            if file >= FILES {
                return Err(RulesError::FenPlacement(format!("rank {} overflows", rank + 1)));
            }
            board[make_square(file, rank)] = Some(piece);
            file += 1;
        }
        if file != FILES {
            return Err(RulesError::FenPlacement(format!(
                "rank {} does not describe {FILES} files",
                rank + 1
            )));
        }
    }
    Ok(board)
}

fn parse_castling(field: &str) -> Result<CastlingRights, RulesError> {
    let mut rights = CastlingRights::default();
    if field == "-" {
        return Ok(rights);
    }
    for c in field.chars() {
        let slot = match c {
            'K' => &mut rights.white_king_side,
            'Q' => &mut rights.white_queen_side,
            'k' => &mut rights.black_king_side,
            'q' => &mut rights.black_queen_side,
            _ => return Err(RulesError::FenCastling(field.to_string())),
        };
        if *slot {
            return Err(RulesError::FenCastling(field.to_string()));
        }
        *slot = true;
    }
    Ok(rights)
}

fn parse_counter(field: Option<&str>, default: u32) -> Result<u32, RulesError> {
    match field {
        None => Ok(default),
        Some(s) => s.parse().map_err(|_| RulesError::FenCounter(s.to_string())),
    }
}

impl std::str::FromStr for Position {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..RANKS).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..FILES {
                let c = self.board[make_square(file, rank)].map_or('.', Piece::to_char);
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "   a b c d e f g h")?;
        write!(f, "{} to move", self.side)
    }
}
