// SPDX-License-Identifier: PMPL-1.0-or-later

//! Closure façade: the single entry point a caller drives — adapters
//! in, forward chaining, mode dispatch, out.
//!
//! `FactSource`/`RuleSource` exist so callers can hand over whatever
//! shape their store already has (`all_facts()`, `.values()`, a raw
//! `Vec`) without an intermediate copy step forced on them.

use crate::budget::Budget;
use crate::chainer::ForwardChainer;
use crate::conflict::ConflictDetector;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult, ErrorContext};
use crate::fact::Fact;
use crate::mode::{handler_for, Mode, QueryResult, ResolveContext};
use crate::rule::Rule;
use crate::time_source::TimeSource;
use tracing::{info, warn};

pub trait FactSource {
    fn all_facts(&self) -> Vec<Fact>;
}

impl FactSource for Vec<Fact> {
    fn all_facts(&self) -> Vec<Fact> {
        self.clone()
    }
}

impl FactSource for std::collections::BTreeMap<String, Fact> {
    fn all_facts(&self) -> Vec<Fact> {
        self.values().cloned().collect()
    }
}

impl FactSource for std::collections::HashMap<String, Fact> {
    fn all_facts(&self) -> Vec<Fact> {
        self.values().cloned().collect()
    }
}

pub trait RuleSource {
    fn active_rules(&self) -> Vec<Rule>;
}

impl RuleSource for Vec<Rule> {
    fn active_rules(&self) -> Vec<Rule> {
        self.clone()
    }
}

impl RuleSource for std::collections::BTreeMap<String, Rule> {
    fn active_rules(&self) -> Vec<Rule> {
        self.values().cloned().collect()
    }
}

pub struct ClosureFacade {
    pub config: EngineConfig,
}

impl ClosureFacade {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Adapter entry point — accepts any `FactSource`/`RuleSource`
    /// shape and delegates to [`Self::run_closure`].
    pub fn verify(
        &self,
        facts: &impl FactSource,
        rules: &impl RuleSource,
        requested_mode: Option<Mode>,
    ) -> EngineResult<QueryResult> {
        self.run_closure(facts.all_facts(), rules.active_rules(), requested_mode)
    }

    /// The nine-step orchestration: time source → budget → detector →
    /// chainer → consistency scan → mode resolution → result. Any
    /// internal error is caught and folded into an `Indeterminate`
    /// result rather than propagated, except malformed input which
    /// fails fast before any engine work starts.
    pub fn run_closure(
        &self,
        facts: Vec<Fact>,
        rules: Vec<Rule>,
        requested_mode: Option<Mode>,
    ) -> EngineResult<QueryResult> {
        if facts.is_empty() && rules.is_empty() {
            return Err(EngineError::new(
                crate::errors::ErrorKind::InputMalformed,
                "no facts and no rules supplied",
                ErrorContext::new("run_closure", "facade"),
            ));
        }

        let time_source = crate::time_source::for_config(self.config.deterministic_time);
        let mut budget = Budget::new(self.config.budget_limits, self.config.deterministic_time);
        let detector = ConflictDetector::new(self.config.time_overlap_policy);

        let started_ms = time_source.now_ms();
        let original_facts = facts.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let chainer = ForwardChainer::new(&rules, &detector, time_source.as_ref());
            chainer.run(facts, &mut budget)
        }));

        let mut execution_error = false;
        let chain_result = match result {
            Ok(r) => r,
            Err(_) => {
                warn!("forward chaining panicked; degrading to indeterminate");
                budget.mark_exhausted();
                execution_error = true;
                crate::chainer::ForwardChainResult {
                    facts: Default::default(),
                    derived: Vec::new(),
                    newly_derived: Vec::new(),
                    conflicts: Vec::new(),
                    trace: vec!["execution error during forward chaining".to_string()],
                    budget_exhausted: true,
                    iterations: 0,
                    rules_applied: 0,
                }
            }
        };

        let budget_error = EngineError::new(
            crate::errors::ErrorKind::BudgetExhausted,
            "steps exhausted during forward chaining",
            ErrorContext::new("run_closure", "facade"),
        );
        let retry_on_budget = !execution_error
            && chain_result.budget_exhausted
            && requested_mode != Some(Mode::Indeterminate)
            && matches!(
                budget_error.retry_policy(),
                crate::errors::RetryPolicy::Retry { .. }
            );

        let final_chain_result = if retry_on_budget && !self.config.disable_budget_retry {
            info!("retrying with doubled budget after exhaustion");
            let mut retry_budget = Budget::scaled(self.config.budget_limits, 2.0, self.config.deterministic_time);
            let chainer = ForwardChainer::new(&rules, &detector, time_source.as_ref());
            let retried = chainer.run(original_facts, &mut retry_budget);
            budget = retry_budget;
            retried
        } else {
            chain_result
        };

        let execution_ms = (time_source.now_ms() - started_ms).max(0) as u64;
        let mode_preference = requested_mode.unwrap_or(self.config.default_mode);
        let handler = handler_for(mode_preference);

        let ctx = ResolveContext {
            chain_result: &final_chain_result,
            conflicts: &final_chain_result.conflicts,
            budget: &budget,
            execution_ms,
            mode_preference,
            conditional_discount: self.config.conditional_discount,
            min_confidence: self.config.min_confidence,
            max_claims_per_result: self.config.max_claims_per_result,
            forced_reason: if execution_error {
                Some("execution_error".to_string())
            } else {
                None
            },
        };

        Ok(handler.resolve(&ctx))
    }
}
