//! Evaluator trait for prior and value estimates.
//!
//! An evaluator sees positions as FEN text and candidate moves as UCI text,
//! and answers with one non-negative weight per move (in the order given)
//! plus a value in [-1, 1] from the side to move. It may be asked one
//! position at a time or for a whole wave of positions at once.
//!
//! Implementations could be:
//! - [`UniformEvaluator`]: equal weights and a zero value (for testing)
//! - [`Callbacks`]: closures supplied by the caller, in either convention
//! - [`crate::playout::RolloutEvaluator`]: random playouts to a result

use crate::constants::DEFAULT_BATCH_SIZE;
use crate::config::EvalMode;
use crate::error::{ContractError, EvaluatorError};

/// Evaluator output for one position.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// One weight per candidate move.
    pub weights: Vec<f64>,
    /// Value for the side to move.
    pub value: f64,
}

/// Evaluator output for a batch, index-aligned with the request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchEvaluation {
    pub weights: Vec<Vec<f64>>,
    pub values: Vec<f64>,
}

/// Trait for position evaluators.
pub trait Evaluator {
    /// Evaluate a single position.
    fn evaluate_one(&mut self, fen: &str, moves: &[String]) -> Result<Evaluation, EvaluatorError>;

    /// Evaluate several positions in one call.
    /// Default implementation calls `evaluate_one()` in a loop.
    fn evaluate_batch(
        &mut self,
        fens: &[String],
        moves: &[Vec<String>],
    ) -> Result<BatchEvaluation, EvaluatorError> {
        let mut out = BatchEvaluation {
            weights: Vec::with_capacity(fens.len()),
            values: Vec::with_capacity(fens.len()),
        };
        for (fen, mv) in fens.iter().zip(moves) {
            let eval = self.evaluate_one(fen, mv)?;
            out.weights.push(eval.weights);
            out.values.push(eval.value);
        }
        Ok(out)
    }
}

/// Weight 1 for every move and a value of 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn evaluate_one(&mut self, _fen: &str, moves: &[String]) -> Result<Evaluation, EvaluatorError> {
        Ok(Evaluation {
            weights: uniform(moves.len()),
            value: 0.0,
        })
    }
}

fn uniform(n: usize) -> Vec<f64> {
    vec![1.0; n]
}

pub type PriorFn<'a> = Box<dyn FnMut(&str, &[String]) -> Vec<f64> + 'a>;
pub type ValueFn<'a> = Box<dyn FnMut(&str) -> f64 + 'a>;
pub type BatchPriorFn<'a> = Box<dyn FnMut(&[String], &[Vec<String>]) -> Vec<Vec<f64>> + 'a>;
pub type BatchValueFn<'a> = Box<dyn FnMut(&[String]) -> Vec<f64> + 'a>;
pub type BatchEvalFn<'a> =
    Box<dyn FnMut(&[String], &[Vec<String>]) -> (Vec<Vec<f64>>, Vec<f64>) + 'a>;

/// Caller-supplied evaluation closures.
///
/// Any subset may be given. Supplying a batch closure selects batched mode
/// (see [`Callbacks::mode`]); whatever convention is missing is derived
/// from the other one, and with nothing at all the prior is uniform and the
/// value is 0.
#[derive(Default)]
pub struct Callbacks<'a> {
    prior: Option<PriorFn<'a>>,
    value: Option<ValueFn<'a>>,
    batch_prior: Option<BatchPriorFn<'a>>,
    batch_value: Option<BatchValueFn<'a>>,
    batch_eval: Option<BatchEvalFn<'a>>,
    batch_size: Option<usize>,
}

impl<'a> Callbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `prior(fen, moves) -> weights`
    pub fn prior(mut self, f: impl FnMut(&str, &[String]) -> Vec<f64> + 'a) -> Self {
        self.prior = Some(Box::new(f));
        self
    }

    /// `value(fen) -> scalar`
    pub fn value(mut self, f: impl FnMut(&str) -> f64 + 'a) -> Self {
        self.value = Some(Box::new(f));
        self
    }

    /// `batch_prior(fens, moves_per_fen) -> weights_per_fen`
    pub fn batch_prior(
        mut self,
        f: impl FnMut(&[String], &[Vec<String>]) -> Vec<Vec<f64>> + 'a,
    ) -> Self {
        self.batch_prior = Some(Box::new(f));
        self
    }

    /// `batch_value(fens) -> values`
    pub fn batch_value(mut self, f: impl FnMut(&[String]) -> Vec<f64> + 'a) -> Self {
        self.batch_value = Some(Box::new(f));
        self
    }

    /// `batch_eval(fens, moves_per_fen) -> (weights_per_fen, values)`.
    /// Takes precedence over `batch_prior` and `batch_value`.
    pub fn batch_eval(
        mut self,
        f: impl FnMut(&[String], &[Vec<String>]) -> (Vec<Vec<f64>>, Vec<f64>) + 'a,
    ) -> Self {
        self.batch_eval = Some(Box::new(f));
        self
    }

    /// Leaves per wave in batched mode.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }

    fn has_batch(&self) -> bool {
        self.batch_eval.is_some() || self.batch_prior.is_some() || self.batch_value.is_some()
    }

    /// Batched when any batch closure is present, synchronous otherwise.
    pub fn mode(&self) -> EvalMode {
        if self.has_batch() {
            EvalMode::batched(self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE))
        } else {
            EvalMode::Synchronous
        }
    }
}

impl Evaluator for Callbacks<'_> {
    fn evaluate_one(&mut self, fen: &str, moves: &[String]) -> Result<Evaluation, EvaluatorError> {
        if self.has_batch() && (self.prior.is_none() || self.value.is_none()) {
            let batch = self.evaluate_batch(&[fen.to_string()], &[moves.to_vec()])?;
            return single_from_batch(batch);
        }
        let weights = match self.prior.as_mut() {
            Some(f) => f(fen, moves),
            None => uniform(moves.len()),
        };
        let value = match self.value.as_mut() {
            Some(f) => f(fen),
            None => 0.0,
        };
        Ok(Evaluation { weights, value })
    }

    fn evaluate_batch(
        &mut self,
        fens: &[String],
        moves: &[Vec<String>],
    ) -> Result<BatchEvaluation, EvaluatorError> {
        if let Some(f) = self.batch_eval.as_mut() {
            let (weights, values) = f(fens, moves);
            return Ok(BatchEvaluation { weights, values });
        }
        let weights = match (self.batch_prior.as_mut(), self.prior.as_mut()) {
            (Some(f), _) => f(fens, moves),
            (None, Some(f)) => fens
                .iter()
                .zip(moves)
                .map(|(fen, m)| f(fen.as_str(), m.as_slice()))
                .collect(),
            (None, None) => moves.iter().map(|m| uniform(m.len())).collect(),
        };
        let values = match (self.batch_value.as_mut(), self.value.as_mut()) {
            (Some(f), _) => f(fens),
            (None, Some(f)) => fens.iter().map(|fen| f(fen.as_str())).collect(),
            (None, None) => vec![0.0; fens.len()],
        };
        Ok(BatchEvaluation { weights, values })
    }
}

fn single_from_batch(batch: BatchEvaluation) -> Result<Evaluation, EvaluatorError> {
    let BatchEvaluation { weights, values } = batch;
    if weights.len() != 1 {
        return Err(ContractError::BatchLength {
            kind: "prior",
            expected: 1,
            actual: weights.len(),
        }
        .into());
    }
    if values.len() != 1 {
        return Err(ContractError::BatchLength {
            kind: "value",
            expected: 1,
            actual: values.len(),
        }
        .into());
    }
    let (Some(weights), Some(&value)) = (weights.into_iter().next(), values.first()) else {
        return Err(EvaluatorError::Failed("empty batch response".into()));
    };
    Ok(Evaluation { weights, value })
}
