// SPDX-License-Identifier: PMPL-1.0-or-later

//! MDL-style scoring: complexity + residual + correctness penalty,
//! combined as a weighted sum where lower is better.
//!
//! Invoked by the closure façade only when the caller supplies an
//! evaluation context; otherwise results are returned unscored.

use crate::budget::Budget;
use crate::conflict::Conflict;
use crate::mode::Mode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub complexity: f64,
    pub residual: f64,
    pub correctness: f64,
    pub budget: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            complexity: 1.0,
            residual: 1.0,
            correctness: 2.0,
            budget: 0.5,
        }
    }
}

/// Description-length inputs for a program/rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityInputs {
    pub instr_count: u64,
    pub unique_symbols: u64,
    pub max_nesting: u64,
    pub var_count: u64,
    pub literal_count: u64,
    pub macro_uses: u64,
}

impl ComplexityInputs {
    pub fn score(&self) -> f64 {
        let raw = self.instr_count as f64
            + (self.unique_symbols as f64 + 1.0).log2() * 0.5
            + self.max_nesting as f64 * 0.3
            + self.var_count as f64 * 0.1
            + self.literal_count as f64 * 0.2
            - self.macro_uses as f64 * 0.2;
        raw.max(0.1)
    }
}

/// Prediction-loss inputs vs supplied examples.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidualInputs {
    pub mismatches: u64,
    pub missing: u64,
    pub extras: u64,
    pub mean_confidence_diff: f64,
}

impl ResidualInputs {
    pub fn score(&self) -> f64 {
        self.mismatches as f64 * 1.0
            + self.missing as f64 * 0.5
            + self.extras as f64 * 0.3
            + self.mean_confidence_diff * 0.2
    }
}

/// Correctness-penalty inputs: conflicts, budget state, resolved mode.
#[derive(Debug, Clone)]
pub struct PenaltyInputs<'a> {
    pub conflicts: &'a [Conflict],
    pub budget: &'a Budget,
    pub mode: Mode,
    pub low_confidence_claims: u64,
}

impl PenaltyInputs<'_> {
    /// Budget-exhaustion flat penalty plus high-utilization sub-terms —
    /// the slice of the penalty that `ScorerWeights.budget` scales.
    pub fn budget_penalty(&self) -> f64 {
        let exhaustion_penalty = if self.budget.is_exhausted() { 2.0 } else { 0.0 };

        let step_ratio = self.budget.step_utilization();
        let step_penalty = if step_ratio > 0.9 {
            (step_ratio - 0.9) * 10.0
        } else {
            0.0
        };
        let branch_ratio = self.budget.branch_utilization();
        let branch_penalty = if branch_ratio > 0.9 {
            (branch_ratio - 0.9) * 10.0 * 0.5
        } else {
            0.0
        };

        exhaustion_penalty + step_penalty + branch_penalty
    }

    /// Conflict-severity and resolved-mode sub-terms — scaled by
    /// `ScorerWeights.correctness`, unaffected by budget state.
    pub fn conflict_and_mode_penalty(&self) -> f64 {
        let conflict_penalty: f64 = self.conflicts.iter().map(|c| c.conflict_type.severity()).sum();
        let mode_penalty = match self.mode {
            Mode::Indeterminate => 1.5,
            Mode::Conditional => 0.5 + 0.3 * self.low_confidence_claims as f64,
            Mode::Strict => 0.0,
        };
        conflict_penalty + mode_penalty
    }

    pub fn score(&self) -> f64 {
        self.conflict_and_mode_penalty() + self.budget_penalty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub complexity: f64,
    pub residual: f64,
    pub penalty: f64,
    pub total: f64,
}

pub struct MdlScorer {
    pub weights: ScorerWeights,
}

impl MdlScorer {
    pub fn new(weights: ScorerWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        complexity: &ComplexityInputs,
        residual: &ResidualInputs,
        penalty: &PenaltyInputs,
    ) -> ScoreBreakdown {
        let complexity_score = complexity.score();
        let residual_score = residual.score();
        let penalty_score = penalty.score();

        let total = self.weights.complexity * complexity_score
            + self.weights.residual * residual_score
            + self.weights.correctness * penalty.conflict_and_mode_penalty()
            + self.weights.budget * penalty.budget_penalty();

        ScoreBreakdown {
            complexity: complexity_score,
            residual: residual_score,
            penalty: penalty_score,
            total,
        }
    }
}
