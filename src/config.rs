//! Search configuration.

use log::warn;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_C_PUCT, DEFAULT_DIRICHLET_EPSILON, DEFAULT_VIRTUAL_LOSS,
    MAX_BATCH_SIZE,
};
use crate::error::ConfigError;

/// Tunable parameters of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Exploration constant in the PUCT score.
    pub c_puct: f64,

    /// Rescale evaluator weights to sum to 1 before use. When off, weights
    /// are used as raw relative strengths.
    pub normalize_priors: bool,

    /// Provisional loss charged per in-flight simulation on every edge of
    /// its path. Only matters in batched mode.
    pub virtual_loss: f64,

    /// Dirichlet noise concentration at the root. 0 disables noise.
    pub dirichlet_alpha: f64,

    /// Share of each root prior replaced by noise.
    pub dirichlet_epsilon: f64,

    /// First-play urgency: an unvisited edge is valued at
    /// `parent_q - fpu_reduction / sqrt(parent_n)`, clipped to [-1, 1].
    /// 0 values unvisited edges at 0.
    pub fpu_reduction: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            c_puct: DEFAULT_C_PUCT,
            normalize_priors: false,
            virtual_loss: DEFAULT_VIRTUAL_LOSS,
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: DEFAULT_DIRICHLET_EPSILON,
            fpu_reduction: 0.0,
        }
    }
}

impl SearchConfig {
    /// Builder pattern: set c_puct exploration constant.
    pub fn with_c_puct(mut self, c: f64) -> Self {
        self.c_puct = c;
        self
    }

    /// Builder pattern: renormalize priors.
    pub fn with_normalized_priors(mut self, normalize: bool) -> Self {
        self.normalize_priors = normalize;
        self
    }

    /// Builder pattern: set the virtual loss per in-flight simulation.
    pub fn with_virtual_loss(mut self, loss: f64) -> Self {
        self.virtual_loss = loss;
        self
    }

    /// Builder pattern: enable root Dirichlet noise.
    pub fn with_dirichlet(mut self, alpha: f64, epsilon: f64) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    /// Builder pattern: set the first-play urgency reduction.
    pub fn with_fpu_reduction(mut self, reduction: f64) -> Self {
        self.fpu_reduction = reduction;
        self
    }

    /// Whether root noise will be mixed in.
    pub fn uses_dirichlet(&self) -> bool {
        self.dirichlet_alpha > 0.0 && self.dirichlet_epsilon > 0.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = |x: f64| x.is_finite() && x >= 0.0;
        if !non_negative(self.c_puct) {
            return Err(ConfigError::CPuct(self.c_puct));
        }
        if !non_negative(self.virtual_loss) {
            return Err(ConfigError::VirtualLoss(self.virtual_loss));
        }
        if !non_negative(self.dirichlet_alpha) {
            return Err(ConfigError::DirichletAlpha(self.dirichlet_alpha));
        }
        if !(0.0..=1.0).contains(&self.dirichlet_epsilon) {
            return Err(ConfigError::DirichletEpsilon(self.dirichlet_epsilon));
        }
        if !non_negative(self.fpu_reduction) {
            return Err(ConfigError::FpuReduction(self.fpu_reduction));
        }
        Ok(())
    }
}

/// How leaves are handed to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    /// One leaf at a time.
    #[default]
    Synchronous,
    /// Waves of up to `batch_size` leaves per evaluator call.
    Batched { batch_size: usize },
}

impl EvalMode {
    /// Batched mode with `batch_size` clamped into `[1, MAX_BATCH_SIZE]`.
    pub fn batched(batch_size: usize) -> Self {
        let clamped = batch_size.clamp(1, MAX_BATCH_SIZE);
        if clamped != batch_size {
            warn!("batch size {batch_size} clamped to {clamped}");
        }
        EvalMode::Batched {
            batch_size: clamped,
        }
    }

    /// Batched mode with the default wave size.
    pub fn default_batched() -> Self {
        Self::batched(DEFAULT_BATCH_SIZE)
    }

    /// Leaves per wave: 1 in synchronous mode.
    pub fn wave_size(self) -> usize {
        match self {
            EvalMode::Synchronous => 1,
            EvalMode::Batched { batch_size } => batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    pub fn is_batched(self) -> bool {
        matches!(self, EvalMode::Batched { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert!((config.c_puct - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!(!config.normalize_priors);
        assert!(!config.uses_dirichlet());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = SearchConfig::default()
            .with_c_puct(2.5)
            .with_dirichlet(0.3, 0.25)
            .with_fpu_reduction(0.2)
            .with_normalized_priors(true);
        assert_eq!(config.c_puct, 2.5);
        assert!(config.uses_dirichlet());
        assert!(config.normalize_priors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert_eq!(
            SearchConfig::default().with_c_puct(-1.0).validate(),
            Err(ConfigError::CPuct(-1.0))
        );
        assert!(SearchConfig::default().with_c_puct(f64::NAN).validate().is_err());
        assert!(SearchConfig::default().with_virtual_loss(-0.5).validate().is_err());
        assert!(SearchConfig::default().with_dirichlet(0.3, 1.5).validate().is_err());
        assert!(SearchConfig::default().with_fpu_reduction(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_batch_size_clamped() {
        assert_eq!(EvalMode::batched(0), EvalMode::Batched { batch_size: 1 });
        assert_eq!(
            EvalMode::batched(5000),
            EvalMode::Batched {
                batch_size: MAX_BATCH_SIZE
            }
        );
        assert_eq!(EvalMode::batched(16).wave_size(), 16);
        assert_eq!(EvalMode::Synchronous.wave_size(), 1);
        assert_eq!(EvalMode::Batched { batch_size: 0 }.wave_size(), 1);
    }
}
