// SPDX-License-Identifier: PMPL-1.0-or-later

//! Engine configuration.
//!
//! An immutable record constructed once per run rather than a
//! shared-mutable settings object threaded through every call — the
//! façade owns one `EngineConfig` and every subordinate module reads
//! from it by value or shared reference.

use crate::budget::BudgetLimits;
use crate::fact::TimeOverlapPolicy;
use crate::mode::Mode;
use crate::scorer::ScorerWeights;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineConfig {
    pub budget_limits: BudgetLimits,
    pub time_overlap_policy: TimeOverlapPolicy,
    pub deterministic_time: bool,
    pub default_mode: Mode,
    /// Confidence multiplier applied to every claim in `Conditional`
    /// mode, reflecting the cost of resting on unproven assumptions.
    pub conditional_discount: f64,
    /// Below this confidence, `Conditional` degrades to `Indeterminate`.
    pub min_confidence: f64,
    pub max_claims_per_result: usize,
    /// Disables the automatic budget-doubling retry (spec §6 retry
    /// policy) — set when a caller wants a single deterministic pass.
    pub disable_budget_retry: bool,
    pub scorer_weights: ScorerWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget_limits: BudgetLimits {
                max_depth: 50,
                max_steps: 10_000,
                max_branches: 32,
                max_time_ms: Some(5_000),
            },
            time_overlap_policy: TimeOverlapPolicy::Strict,
            deterministic_time: true,
            default_mode: Mode::Strict,
            conditional_discount: 0.85,
            min_confidence: 0.2,
            max_claims_per_result: 100,
            disable_budget_retry: false,
            scorer_weights: ScorerWeights::default(),
        }
    }
}
