//! Bridge between the search and an [`Evaluator`].
//!
//! The bridge turns leaves into the evaluator's text interface, checks that
//! every answer honours the prior/value contract, and converts weights into
//! edge priors. In batched mode a whole wave of pending leaves goes out in
//! one call, with positions that occur more than once sent only once.

use std::collections::HashMap;

use log::trace;

use crate::config::EvalMode;
use crate::error::{ContractError, Error};
use crate::evaluator::{BatchEvaluation, Evaluator};
use crate::movegen::Move;
use crate::position::Position;
use crate::tree::{NodeId, VirtualLoss, priors_from_weights};

/// A selected leaf waiting for its evaluation.
#[derive(Debug)]
pub struct PendingEvaluation {
    pub leaf: NodeId,
    /// Snapshot of the leaf position; the scratch board keeps moving.
    pub position: Position,
    /// Legal moves at the leaf, in generator order.
    pub moves: Vec<Move>,
    /// One lease per simulation of this wave that stopped at `leaf`.
    pub leases: Vec<VirtualLoss>,
}

impl PendingEvaluation {
    pub fn new(leaf: NodeId, position: Position, moves: Vec<Move>) -> Self {
        Self {
            leaf,
            position,
            moves,
            leases: Vec::new(),
        }
    }

    fn request(&self) -> (String, Vec<String>) {
        (
            self.position.to_fen(),
            self.moves.iter().map(Move::uci).collect(),
        )
    }
}

/// Validated evaluator output for one leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafEvaluation {
    /// Edge priors, index-aligned with the leaf's moves.
    pub priors: Vec<f64>,
    /// Value for the side to move at the leaf.
    pub value: f64,
}

/// Evaluator traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Calls to `evaluate_one`.
    pub single_calls: u64,
    /// Calls to `evaluate_batch`.
    pub batch_calls: u64,
    /// Positions sent to the evaluator.
    pub positions_sent: u64,
    /// Leaves answered by another leaf's request in the same wave.
    pub duplicates_merged: u64,
}

impl BridgeStats {
    /// Round trips to the evaluator.
    pub fn calls(&self) -> u64 {
        self.single_calls + self.batch_calls
    }
}

pub struct EvaluationBridge<'e> {
    evaluator: &'e mut dyn Evaluator,
    mode: EvalMode,
    normalize_priors: bool,
    stats: BridgeStats,
}

impl<'e> EvaluationBridge<'e> {
    pub fn new(evaluator: &'e mut dyn Evaluator, mode: EvalMode, normalize_priors: bool) -> Self {
        Self {
            evaluator,
            mode,
            normalize_priors,
            stats: BridgeStats::default(),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Evaluate every pending leaf, returning results in the same order.
    ///
    /// Fails on the first contract violation; nothing is returned for the
    /// rest of the wave.
    pub fn evaluate(&mut self, pending: &[PendingEvaluation]) -> Result<Vec<LeafEvaluation>, Error> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        match self.mode {
            EvalMode::Synchronous => pending.iter().map(|p| self.evaluate_single(p)).collect(),
            EvalMode::Batched { .. } => self.evaluate_wave(pending),
        }
    }

    fn evaluate_single(&mut self, pending: &PendingEvaluation) -> Result<LeafEvaluation, Error> {
        let (fen, moves) = pending.request();
        self.stats.single_calls += 1;
        self.stats.positions_sent += 1;
        let eval = self.evaluator.evaluate_one(&fen, &moves)?;
        validate_weights(&eval.weights, moves.len())?;
        validate_value(eval.value)?;
        Ok(LeafEvaluation {
            priors: priors_from_weights(&eval.weights, self.normalize_priors),
            value: eval.value,
        })
    }

    fn evaluate_wave(&mut self, pending: &[PendingEvaluation]) -> Result<Vec<LeafEvaluation>, Error> {
        let mut fens: Vec<String> = Vec::with_capacity(pending.len());
        let mut moves: Vec<Vec<String>> = Vec::with_capacity(pending.len());
        let mut slot_of: HashMap<String, usize> = HashMap::with_capacity(pending.len());
        let mut slots = Vec::with_capacity(pending.len());

        for p in pending {
            let (fen, texts) = p.request();
            let slot = match slot_of.get(&fen) {
                Some(&slot) => {
                    self.stats.duplicates_merged += 1;
                    slot
                }
                None => {
                    let slot = fens.len();
                    slot_of.insert(fen.clone(), slot);
                    fens.push(fen);
                    moves.push(texts);
                    slot
                }
            };
            slots.push(slot);
        }

        trace!(
            "evaluating wave of {} leaves as {} positions",
            pending.len(),
            fens.len()
        );
        self.stats.batch_calls += 1;
        self.stats.positions_sent += fens.len() as u64;
        let BatchEvaluation { weights, values } = self.evaluator.evaluate_batch(&fens, &moves)?;

        if weights.len() != fens.len() {
            return Err(ContractError::BatchLength {
                kind: "prior",
                expected: fens.len(),
                actual: weights.len(),
            }
            .into());
        }
        if values.len() != fens.len() {
            return Err(ContractError::BatchLength {
                kind: "value",
                expected: fens.len(),
                actual: values.len(),
            }
            .into());
        }

        let mut answers = Vec::with_capacity(fens.len());
        for ((w, &v), m) in weights.iter().zip(&values).zip(&moves) {
            validate_weights(w, m.len())?;
            validate_value(v)?;
            answers.push(LeafEvaluation {
                priors: priors_from_weights(w, self.normalize_priors),
                value: v,
            });
        }
        Ok(slots.into_iter().map(|s| answers[s].clone()).collect())
    }
}

/// One finite, non-negative weight per candidate move.
pub fn validate_weights(weights: &[f64], expected: usize) -> Result<(), ContractError> {
    if weights.len() != expected {
        return Err(ContractError::PriorLength {
            expected,
            actual: weights.len(),
        });
    }
    match weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        Some((index, &weight)) => Err(ContractError::InvalidWeight { index, weight }),
        None => Ok(()),
    }
}

/// A finite value in [-1, 1].
pub fn validate_value(value: f64) -> Result<(), ContractError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ContractError::ValueOutOfRange(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Callbacks, UniformEvaluator};

    fn pending_at(pos: &Position) -> PendingEvaluation {
        PendingEvaluation::new(NodeId::ROOT, pos.clone(), pos.legal_moves())
    }

    #[test]
    fn test_validate_weights() {
        assert!(validate_weights(&[0.0, 1.0], 2).is_ok());
        assert_eq!(
            validate_weights(&[1.0], 2),
            Err(ContractError::PriorLength {
                expected: 2,
                actual: 1
            })
        );
        assert!(matches!(
            validate_weights(&[1.0, -0.1], 2),
            Err(ContractError::InvalidWeight { index: 1, .. })
        ));
        assert!(validate_weights(&[f64::NAN], 1).is_err());
    }

    #[test]
    fn test_validate_value() {
        assert!(validate_value(1.0).is_ok());
        assert!(validate_value(-1.0).is_ok());
        assert_eq!(validate_value(1.5), Err(ContractError::ValueOutOfRange(1.5)));
        assert!(validate_value(f64::NAN).is_err());
    }

    #[test]
    fn test_synchronous_one_call_per_leaf() {
        let pos = Position::new();
        let pending = vec![pending_at(&pos), pending_at(&pos)];
        let mut eval = UniformEvaluator;
        let mut bridge = EvaluationBridge::new(&mut eval, EvalMode::Synchronous, false);
        let out = bridge.evaluate(&pending).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].priors, vec![1.0; 20]);
        assert_eq!(bridge.stats().single_calls, 2);
        assert_eq!(bridge.stats().batch_calls, 0);
    }

    #[test]
    fn test_wave_deduplicates_positions() {
        let start = Position::new();
        let mut other = Position::new();
        other.push("e2e4").unwrap();
        let pending = vec![
            pending_at(&start),
            pending_at(&other),
            pending_at(&start),
        ];

        let mut seen = Vec::new();
        let mut cb = Callbacks::new().batch_eval(|fens, moves| {
            seen.push(fens.len());
            (
                moves.iter().map(|m| vec![1.0; m.len()]).collect(),
                fens.iter().map(|f| if f.contains(" b ") { 0.5 } else { -0.5 }).collect(),
            )
        });
        let mut bridge = EvaluationBridge::new(&mut cb, EvalMode::batched(8), true);
        let out = bridge.evaluate(&pending).unwrap();
        let stats = bridge.stats();
        drop(bridge);
        drop(cb);

        assert_eq!(seen, vec![2]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], out[2]);
        assert_eq!(out[0].value, -0.5);
        assert_eq!(out[1].value, 0.5);
        assert!((out[0].priors.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(stats.batch_calls, 1);
        assert_eq!(stats.positions_sent, 2);
        assert_eq!(stats.duplicates_merged, 1);
    }

    #[test]
    fn test_wave_contract_violations() {
        let pos = Position::new();
        let pending = vec![pending_at(&pos)];

        let mut short = Callbacks::new().batch_prior(|_, _| vec![vec![1.0; 19]]);
        let err = EvaluationBridge::new(&mut short, EvalMode::batched(4), false)
            .evaluate(&pending)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Contract(ContractError::PriorLength {
                expected: 20,
                actual: 19
            })
        ));

        let mut missing = Callbacks::new().batch_value(|_| Vec::new());
        let err = EvaluationBridge::new(&mut missing, EvalMode::batched(4), false)
            .evaluate(&pending)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Contract(ContractError::BatchLength { kind: "value", .. })
        ));

        let mut hot = Callbacks::new().value(|_| 2.0);
        let err = EvaluationBridge::new(&mut hot, EvalMode::Synchronous, false)
            .evaluate(&pending)
            .unwrap_err();
        assert!(err.is_contract());
    }
}
