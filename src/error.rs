//! Error types.
//!
//! Rules violations come back as [`RulesError`], misuse of the undo stack as
//! [`StateError`], and evaluator output that breaks the prior/value contract
//! as [`ContractError`]. [`Error`] wraps all of them for the search entry
//! points.

use thiserror::Error;

/// Malformed or illegal input from the caller (position strings, move text).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("malformed FEN: expected at least 4 fields, found {0}")]
    FenFieldCount(usize),

    #[error("malformed FEN placement: {0}")]
    FenPlacement(String),

    #[error("malformed FEN side to move: {0:?}")]
    FenSideToMove(String),

    #[error("malformed FEN castling field: {0:?}")]
    FenCastling(String),

    #[error("malformed FEN en-passant field: {0:?}")]
    FenEnPassant(String),

    #[error("malformed FEN move counter: {0:?}")]
    FenCounter(String),

    #[error("illegal position: {0}")]
    IllegalPosition(String),

    #[error("malformed move text: {0:?}")]
    MalformedMove(String),

    #[error("illegal move in this position: {0}")]
    IllegalMove(String),
}

/// Misuse of the make/unmake protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("unmake called with an empty undo stack")]
    EmptyUndoStack,

    #[error("move {0} does not apply to this position")]
    MoveNotApplicable(String),
}

/// Evaluator output that violates the prior/value contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("prior has {actual} weights for {expected} candidate moves")]
    PriorLength { expected: usize, actual: usize },

    #[error("prior weight {weight} at index {index} is negative or not finite")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("value {0} is outside [-1, 1]")]
    ValueOutOfRange(f64),

    #[error("{kind} batch has {actual} entries for {expected} positions")]
    BatchLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failure reported by an evaluator.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("evaluation failed: {0}")]
    Failed(String),
}

/// Invalid search configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("c_puct must be finite and non-negative, got {0}")]
    CPuct(f64),

    #[error("virtual loss must be finite and non-negative, got {0}")]
    VirtualLoss(f64),

    #[error("dirichlet alpha must be finite and non-negative, got {0}")]
    DirichletAlpha(f64),

    #[error("dirichlet epsilon must lie in [0, 1], got {0}")]
    DirichletEpsilon(f64),

    #[error("fpu reduction must be finite and non-negative, got {0}")]
    FpuReduction(f64),
}

/// Any error the crate can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An evaluator failure other than a contract violation.
    #[error("evaluator error")]
    Evaluator(#[source] EvaluatorError),
}

impl From<EvaluatorError> for Error {
    fn from(err: EvaluatorError) -> Self {
        // Contract violations keep their own variant whichever layer raised them.
        match err {
            EvaluatorError::Contract(c) => Error::Contract(c),
            other => Error::Evaluator(other),
        }
    }
}

impl Error {
    /// True when the error is an evaluator contract violation.
    pub fn is_contract(&self) -> bool {
        matches!(self, Error::Contract(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
