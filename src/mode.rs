// SPDX-License-Identifier: PMPL-1.0-or-later

//! Three-mode result builder: strict / conditional / indeterminate.
//!
//! `Mode` is a closed sum type, not a trait object hierarchy — the
//! façade dispatches once, with `Indeterminate` as the universal
//! fallback (design notes §9).

use crate::chainer::ForwardChainResult;
use crate::conflict::Conflict;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Strict,
    Conditional,
    Indeterminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub fact_id: String,
    pub summary: String,
    pub confidence: f64,
    pub supporting_facts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assumption {
    pub kind: String,
    pub detail: String,
    pub fact_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorationStats {
    pub iterations: u64,
    pub rules_applied: u64,
    pub derived_count: u64,
    pub conflict_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub mode: Mode,
    pub budget_used: crate::budget::BudgetUsage,
    pub claims: Vec<Claim>,
    pub assumptions: Vec<Assumption>,
    pub conflicts: Vec<Conflict>,
    pub trace_refs: Vec<String>,
    pub execution_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploration_stats: Option<ExplorationStats>,
}

/// Everything a mode handler needs: the chain result, the conflicts
/// merged in by `check_consistency`, the mutated budget, and an
/// optional reason already decided upstream (e.g. `execution_error`).
pub struct ResolveContext<'a> {
    pub chain_result: &'a ForwardChainResult,
    pub conflicts: &'a [Conflict],
    pub budget: &'a crate::budget::Budget,
    pub execution_ms: u64,
    pub mode_preference: Mode,
    pub conditional_discount: f64,
    pub min_confidence: f64,
    pub max_claims_per_result: usize,
    pub forced_reason: Option<String>,
}

pub trait ModeHandler {
    fn resolve(&self, ctx: &ResolveContext) -> QueryResult;
}

pub struct StrictHandler;
pub struct ConditionalHandler;
pub struct IndeterminateHandler;

impl ModeHandler for StrictHandler {
    fn resolve(&self, ctx: &ResolveContext) -> QueryResult {
        if !ctx.conflicts.is_empty() {
            return IndeterminateHandler.resolve(&ResolveContext {
                forced_reason: Some("conflicts_detected".to_string()),
                ..clone_ctx(ctx)
            });
        }

        let mut builder = ResultBuilder::new(Mode::Strict, ctx.max_claims_per_result);
        for fact in ctx.chain_result.newly_derived.iter() {
            let supporting = if fact.provenance.is_empty() {
                vec![fact.fact_id.clone()]
            } else {
                fact.provenance.iter().map(|p| p.source_id.clone()).collect()
            };
            builder.add_claim(Claim {
                fact_id: fact.fact_id.clone(),
                summary: format!("{} holds", fact.predicate.qualified()),
                confidence: 1.0,
                supporting_facts: supporting,
            });
        }
        builder.add_trace_refs(ctx.chain_result.trace.clone());
        builder.build(ctx.budget.used, ctx.execution_ms, None)
    }
}

impl ModeHandler for ConditionalHandler {
    fn resolve(&self, ctx: &ResolveContext) -> QueryResult {
        let mut builder = ResultBuilder::new(Mode::Conditional, ctx.max_claims_per_result);
        let mut remaining_confidence = 1.0f64;
        let mut low_confidence = 0u64;

        for fact in ctx.chain_result.newly_derived.iter() {
            let confidence = (fact.confidence * ctx.conditional_discount).clamp(0.0, 1.0);
            remaining_confidence = remaining_confidence.min(confidence);
            if confidence < 0.5 {
                low_confidence += 1;
            }
            builder.add_claim(Claim {
                fact_id: fact.fact_id.clone(),
                summary: format!("{} holds, under assumptions", fact.predicate.qualified()),
                confidence,
                supporting_facts: vec![fact.fact_id.clone()],
            });
        }

        let mut seen_types = std::collections::BTreeSet::new();
        for conflict in ctx.conflicts {
            let key = format!("{:?}", conflict.conflict_type);
            if seen_types.insert(key.clone()) {
                let fact_ids: Vec<String> = ctx
                    .conflicts
                    .iter()
                    .filter(|c| format!("{:?}", c.conflict_type) == key)
                    .flat_map(|c| c.fact_ids.clone())
                    .collect();
                builder.add_assumption(Assumption {
                    kind: key,
                    detail: conflict.reason.clone(),
                    fact_ids,
                });
            }
        }
        builder.add_trace_refs(ctx.chain_result.trace.clone());

        if remaining_confidence < ctx.min_confidence {
            return IndeterminateHandler.resolve(&ResolveContext {
                forced_reason: Some("confidence_below_minimum".to_string()),
                ..clone_ctx(ctx)
            });
        }
        let _ = low_confidence;
        builder.build(ctx.budget.used, ctx.execution_ms, None)
    }
}

impl ModeHandler for IndeterminateHandler {
    fn resolve(&self, ctx: &ResolveContext) -> QueryResult {
        let reason = ctx.forced_reason.clone().unwrap_or_else(|| {
            if !ctx.conflicts.is_empty() {
                "conflicts_detected".to_string()
            } else if ctx.budget.is_exhausted() {
                "budget_exhausted".to_string()
            } else if ctx.chain_result.newly_derived.is_empty() {
                "no_derivations".to_string()
            } else {
                "incomplete_closure".to_string()
            }
        });

        let mut builder = ResultBuilder::new(Mode::Indeterminate, ctx.max_claims_per_result);
        builder.add_assumption(Assumption {
            kind: "exploration_summary".to_string(),
            detail: format!(
                "iterations={} rules_applied={} derived={} conflicts={}",
                ctx.chain_result.iterations,
                ctx.chain_result.rules_applied,
                ctx.chain_result.derived.len(),
                ctx.conflicts.len()
            ),
            fact_ids: Vec::new(),
        });
        builder.add_trace_refs(ctx.chain_result.trace.clone());
        let stats = ExplorationStats {
            iterations: ctx.chain_result.iterations,
            rules_applied: ctx.chain_result.rules_applied,
            derived_count: ctx.chain_result.derived.len() as u64,
            conflict_count: ctx.conflicts.len() as u64,
        };
        builder.build(ctx.budget.used, ctx.execution_ms, Some((reason, stats)))
    }
}

fn clone_ctx<'a>(ctx: &ResolveContext<'a>) -> ResolveContext<'a> {
    ResolveContext {
        chain_result: ctx.chain_result,
        conflicts: ctx.conflicts,
        budget: ctx.budget,
        execution_ms: ctx.execution_ms,
        mode_preference: ctx.mode_preference,
        conditional_discount: ctx.conditional_discount,
        min_confidence: ctx.min_confidence,
        max_claims_per_result: ctx.max_claims_per_result,
        forced_reason: ctx.forced_reason.clone(),
    }
}

pub fn handler_for(mode: Mode) -> Box<dyn ModeHandler> {
    match mode {
        Mode::Strict => Box::new(StrictHandler),
        Mode::Conditional => Box::new(ConditionalHandler),
        Mode::Indeterminate => Box::new(IndeterminateHandler),
    }
}

/// Chainable assembler: start → add claims/assumptions/conflicts/trace
/// refs → set budget & timing → build. Enforces `max_claims_per_result`.
pub struct ResultBuilder {
    mode: Mode,
    max_claims: usize,
    claims: Vec<Claim>,
    assumptions: Vec<Assumption>,
    conflicts: Vec<Conflict>,
    trace_refs: Vec<String>,
}

impl ResultBuilder {
    pub fn new(mode: Mode, max_claims: usize) -> Self {
        Self {
            mode,
            max_claims,
            claims: Vec::new(),
            assumptions: Vec::new(),
            conflicts: Vec::new(),
            trace_refs: Vec::new(),
        }
    }

    pub fn add_claim(&mut self, claim: Claim) -> &mut Self {
        if self.claims.len() < self.max_claims {
            self.claims.push(claim);
        }
        self
    }

    pub fn add_assumption(&mut self, assumption: Assumption) -> &mut Self {
        self.assumptions.push(assumption);
        self
    }

    pub fn add_conflicts(&mut self, conflicts: Vec<Conflict>) -> &mut Self {
        self.conflicts.extend(conflicts);
        self
    }

    pub fn add_trace_refs(&mut self, refs: Vec<String>) -> &mut Self {
        self.trace_refs.extend(refs);
        self
    }

    pub fn build(
        mut self,
        budget_used: crate::budget::BudgetUsage,
        execution_ms: u64,
        reason_and_stats: Option<(String, ExplorationStats)>,
    ) -> QueryResult {
        let (reason, exploration_stats) = match reason_and_stats {
            Some((r, s)) => (Some(r), Some(s)),
            None => (None, None),
        };
        if self.conflicts.is_empty() {
            // conflicts may have been supplied separately by the caller
            // (strict/conditional paths attach them directly on build).
        }
        QueryResult {
            mode: self.mode,
            budget_used,
            claims: std::mem::take(&mut self.claims),
            assumptions: std::mem::take(&mut self.assumptions),
            conflicts: std::mem::take(&mut self.conflicts),
            trace_refs: std::mem::take(&mut self.trace_refs),
            execution_ms,
            reason,
            exploration_stats,
        }
    }
}
