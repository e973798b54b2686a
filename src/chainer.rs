// SPDX-License-Identifier: PMPL-1.0-or-later

//! Agenda-driven forward chaining.
//!
//! The agenda is a `BinaryHeap` of ready rule/binding pairs keyed by
//! `0.3*specificity + 0.3*confidence + 0.1`, ties broken by insertion
//! order (design notes §9: a heap beats a plain queue once rules carry
//! differing specificity and confidence).

use crate::budget::Budget;
use crate::conflict::{Conflict, ConflictDetector};
use crate::fact::{Fact, Polarity, ScopeId, TimeRef};
use crate::rule::{Binding, FactPattern, Rule};
use crate::time_source::TimeSource;
use crate::unifier::unify_with;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use tracing::{trace, warn};

/// How often (in popped-agenda-items) to run a full O(n^2) consistency
/// scan over working memory, rather than checking only the newest fact.
pub const DEFAULT_CONFLICT_CHECK_INTERVAL: u64 = 10;

#[derive(Debug, Clone)]
pub struct ForwardChainResult {
    /// Working-memory index, keyed by `fact_id`. Distinct facts sharing
    /// a `fact_id` (different polarity/scope/time — Invariant I1 allows
    /// this) overwrite each other here; `derived` is the full log.
    pub facts: BTreeMap<String, Fact>,
    /// Every fact admitted into working memory, seeds included — the
    /// full log, per the admission order.
    pub derived: Vec<Fact>,
    /// Subset of `derived` produced by a rule application — excludes
    /// the seed facts. Mode handlers build claims from this, not from
    /// `derived`, so a strict/conditional result only asserts what the
    /// chainer actually inferred.
    pub newly_derived: Vec<Fact>,
    pub conflicts: Vec<Conflict>,
    pub trace: Vec<String>,
    pub budget_exhausted: bool,
    pub iterations: u64,
    pub rules_applied: u64,
}

struct AgendaItem {
    priority: f64,
    seq: u64,
    rule_index: usize,
    binding: Binding,
}

impl PartialEq for AgendaItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for AgendaItem {}

impl PartialOrd for AgendaItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgendaItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            // Earlier-inserted items win ties — smaller seq sorts "greater".
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct ForwardChainer<'a> {
    pub rules: &'a [Rule],
    /// Indices into `rules`, stably sorted by descending `priority` —
    /// rules are iterated in this order, then input order, per the
    /// ordering guarantee in §5 (ties broken by original position).
    rule_order: Vec<usize>,
    pub conflict_detector: &'a ConflictDetector,
    pub time_source: &'a dyn TimeSource,
    pub conflict_check_interval: u64,
}

impl<'a> ForwardChainer<'a> {
    pub fn new(rules: &'a [Rule], conflict_detector: &'a ConflictDetector, time_source: &'a dyn TimeSource) -> Self {
        let mut rule_order: Vec<usize> = (0..rules.len()).collect();
        rule_order.sort_by_key(|&i| std::cmp::Reverse(rules[i].priority));
        Self {
            rules,
            rule_order,
            conflict_detector,
            time_source,
            conflict_check_interval: DEFAULT_CONFLICT_CHECK_INTERVAL,
        }
    }

    pub fn run(&self, initial_facts: Vec<Fact>, budget: &mut Budget) -> ForwardChainResult {
        let mut facts: BTreeMap<String, Fact> = BTreeMap::new();
        let mut seen_identities: HashSet<(String, Polarity, String, String)> = HashSet::new();
        let mut derived = Vec::new();
        let mut newly_derived = Vec::new();
        let mut trace = Vec::new();
        let mut conflicts = Vec::new();
        let mut agenda: BinaryHeap<AgendaItem> = BinaryHeap::new();
        let mut seq = 0u64;
        let mut iterations = 0u64;
        let mut rules_applied = 0u64;
        let mut budget_exhausted = false;
        let start_ms = self.time_source.now_ms();

        for fact in initial_facts {
            let identity = identity_key(&fact);
            if seen_identities.insert(identity) {
                facts.insert(fact.fact_id.clone(), fact.clone());
                derived.push(fact);
            }
        }

        let initial_report = self.conflict_detector.check_consistency(facts.values());
        conflicts.extend(initial_report.conflicts);

        for &idx in &self.rule_order {
            self.enqueue_matches(idx, &self.rules[idx], &facts, &mut agenda, &mut seq);
        }

        while let Some(item) = agenda.pop() {
            iterations += 1;
            let elapsed_ms = (self.time_source.now_ms() - start_ms).max(0) as u64;
            if !budget.consume_step(elapsed_ms) {
                budget_exhausted = true;
                trace.push("budget exhausted: no steps remaining".to_string());
                break;
            }

            let rule = &self.rules[item.rule_index];
            if !budget.consume_cost(rule.estimated_cost) {
                budget_exhausted = true;
                budget.mark_exhausted();
                trace.push(format!(
                    "budget exhausted: rule {} costs {} with {} steps remaining",
                    rule.rule_id,
                    rule.estimated_cost,
                    budget.remaining_steps()
                ));
                break;
            }

            rules_applied += 1;
            let mut new_facts = Vec::new();
            for pattern in &rule.conclusions {
                if pattern.arguments.values().any(|t| item.binding.leaves_unbound(t)) {
                    warn!(rule_id = %rule.rule_id, "conclusion leaves a variable unbound; admitting fact with literal token");
                    trace.push(format!(
                        "rule {} conclusion has unbound variable(s); admitted as diagnostic",
                        rule.rule_id
                    ));
                }
                new_facts.push(instantiate_conclusion(pattern, &item.binding));
            }

            for fact in new_facts {
                let identity = identity_key(&fact);
                if !seen_identities.insert(identity) {
                    continue;
                }

                let direct = self.conflict_detector.find_direct(&fact, facts.values());
                if !direct.is_empty() {
                    trace.push(format!(
                        "fact {} conflicts directly with {} existing fact(s)",
                        fact.fact_id,
                        direct.len()
                    ));
                    conflicts.extend(direct);
                }

                trace.push(format!(
                    "rule {} derived {} ({})",
                    rule.rule_id,
                    fact.predicate.qualified(),
                    fact.fact_id
                ));
                self.enqueue_matches_for_new_fact(&fact, &facts, &mut agenda, &mut seq);
                facts.insert(fact.fact_id.clone(), fact.clone());
                derived.push(fact.clone());
                newly_derived.push(fact);
            }

            if iterations % self.conflict_check_interval == 0 {
                let report = self.conflict_detector.check_consistency(facts.values());
                trace!(iteration = iterations, found = report.conflicts.len(), "periodic consistency scan");
                conflicts.extend(report.conflicts);
            }
        }

        let final_report = self.conflict_detector.check_consistency(facts.values());
        conflicts.extend(final_report.conflicts);

        conflicts.sort_by(|a, b| a.conflict_id.cmp(&b.conflict_id));
        conflicts.dedup_by(|a, b| a.conflict_id == b.conflict_id);

        ForwardChainResult {
            facts,
            derived,
            newly_derived,
            conflicts,
            trace,
            budget_exhausted,
            iterations,
            rules_applied,
        }
    }

    fn enqueue_matches(
        &self,
        rule_index: usize,
        rule: &Rule,
        facts: &BTreeMap<String, Fact>,
        agenda: &mut BinaryHeap<AgendaItem>,
        seq: &mut u64,
    ) {
        let pool: Vec<&Fact> = facts.values().collect();
        let mut matches = Vec::new();
        match_premises(&rule.premises, &pool, Binding::new(), Vec::new(), &mut matches);
        for (binding, avg_confidence) in matches {
            let priority = 0.3 * rule.specificity() as f64 + 0.3 * avg_confidence + 0.1;
            agenda.push(AgendaItem {
                priority,
                seq: *seq,
                rule_index,
                binding,
            });
            *seq += 1;
        }
    }

    /// Re-match every rule using the newly derived fact as a pivot,
    /// rather than rescanning the whole agenda from scratch.
    fn enqueue_matches_for_new_fact(
        &self,
        new_fact: &Fact,
        facts: &BTreeMap<String, Fact>,
        agenda: &mut BinaryHeap<AgendaItem>,
        seq: &mut u64,
    ) {
        let mut pool: Vec<&Fact> = facts.values().collect();
        pool.push(new_fact);
        for &rule_index in &self.rule_order {
            let rule = &self.rules[rule_index];
            if !rule.premises.iter().any(|p| unify_with(p, new_fact, &Binding::new()).is_some()) {
                continue;
            }
            let mut matches = Vec::new();
            match_premises(&rule.premises, &pool, Binding::new(), Vec::new(), &mut matches);
            for (binding, avg_confidence) in matches {
                let priority = 0.3 * rule.specificity() as f64 + 0.3 * avg_confidence + 0.1;
                agenda.push(AgendaItem {
                    priority,
                    seq: *seq,
                    rule_index,
                    binding,
                });
                *seq += 1;
            }
        }
    }
}

fn identity_key(fact: &Fact) -> (String, Polarity, String, String) {
    (
        fact.fact_id.clone(),
        fact.polarity,
        fact.scope_id.0.join("/"),
        format!("{:?}", fact.time),
    )
}

fn instantiate_conclusion(pattern: &FactPattern, binding: &Binding) -> Fact {
    let predicate = pattern.instantiate_predicate(binding);
    let arguments = pattern
        .arguments
        .iter()
        .map(|(slot, term)| (slot.clone(), binding.instantiate(term)))
        .collect();
    let polarity = pattern.polarity.unwrap_or(Polarity::Assert);
    let scope_id = pattern.scope_id.clone().unwrap_or_else(ScopeId::root);
    let time = pattern.time.clone().unwrap_or(TimeRef::Unknown);
    Fact::new(predicate, arguments, polarity, scope_id, time)
}

/// Backtracking cross-product match across all premises. Bounded by
/// working-memory size, not by the agenda's budget — budget gates how
/// many matches get *applied*, not how many get *found*.
fn match_premises(
    premises: &[FactPattern],
    facts: &[&Fact],
    binding: Binding,
    confidences: Vec<f64>,
    out: &mut Vec<(Binding, f64)>,
) {
    let Some((first, rest)) = premises.split_first() else {
        let avg = if confidences.is_empty() {
            1.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };
        out.push((binding, avg));
        return;
    };
    for fact in facts {
        if let Some(next_binding) = unify_with(first, fact, &binding) {
            let mut next_confidences = confidences.clone();
            next_confidences.push(fact.confidence);
            match_premises(rest, facts, next_binding, next_confidences, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetLimits;
    use crate::conflict::ConflictDetector;
    use crate::fact::{SymbolId, Term, TimeOverlapPolicy};
    use crate::time_source::DeterministicTimeSource;
    use std::collections::BTreeMap as Map;

    fn budget(max_steps: u64) -> Budget {
        Budget::new(
            BudgetLimits {
                max_depth: 10,
                max_steps,
                max_branches: 5,
                max_time_ms: None,
            },
            true,
        )
    }

    fn ancestor_rule() -> Rule {
        Rule {
            rule_id: "ancestor-transitivity".to_string(),
            premises: vec![
                FactPattern::new(SymbolId::new("fam", "parent"))
                    .with_arg("x", Term::var("a"))
                    .with_arg("y", Term::var("b")),
                FactPattern::new(SymbolId::new("fam", "ancestor"))
                    .with_arg("x", Term::var("b"))
                    .with_arg("y", Term::var("c")),
            ],
            conclusions: vec![FactPattern::new(SymbolId::new("fam", "ancestor"))
                .with_arg("x", Term::var("a"))
                .with_arg("y", Term::var("c"))],
            priority: 0,
            estimated_cost: 1,
        }
    }

    fn parent(x: &str, y: &str) -> Fact {
        Fact::new(
            SymbolId::new("fam", "parent"),
            Map::from([("x".to_string(), Term::atom(x)), ("y".to_string(), Term::atom(y))]),
            Polarity::Assert,
            ScopeId::root(),
            TimeRef::Unknown,
        )
    }

    fn ancestor(x: &str, y: &str) -> Fact {
        Fact::new(
            SymbolId::new("fam", "ancestor"),
            Map::from([("x".to_string(), Term::atom(x)), ("y".to_string(), Term::atom(y))]),
            Polarity::Assert,
            ScopeId::root(),
            TimeRef::Unknown,
        )
    }

    #[test]
    fn derives_transitive_ancestor() {
        let rules = vec![Rule {
            rule_id: "seed-ancestor".to_string(),
            premises: vec![FactPattern::new(SymbolId::new("fam", "parent"))
                .with_arg("x", Term::var("a"))
                .with_arg("y", Term::var("b"))],
            conclusions: vec![FactPattern::new(SymbolId::new("fam", "ancestor"))
                .with_arg("x", Term::var("a"))
                .with_arg("y", Term::var("b"))],
            priority: 0,
            estimated_cost: 1,
        }, ancestor_rule()];

        let detector = ConflictDetector::new(TimeOverlapPolicy::Strict);
        let time = DeterministicTimeSource;
        let chainer = ForwardChainer::new(&rules, &detector, &time);
        let mut b = budget(50);

        let result = chainer.run(vec![parent("alice", "bob"), parent("bob", "carol")], &mut b);

        let has_transitive = result
            .derived
            .iter()
            .any(|f| f.predicate == SymbolId::new("fam", "ancestor") && f == &ancestor("alice", "carol"));
        assert!(has_transitive, "expected derived ancestor(alice, carol)");
        assert!(!result.budget_exhausted);
    }

    #[test]
    fn budget_exhaustion_stops_chaining_cleanly() {
        let rules = vec![ancestor_rule()];
        let detector = ConflictDetector::new(TimeOverlapPolicy::Strict);
        let time = DeterministicTimeSource;
        let chainer = ForwardChainer::new(&rules, &detector, &time);
        let mut b = budget(0);

        let result = chainer.run(vec![parent("a", "b")], &mut b);
        assert!(result.budget_exhausted);
        assert_eq!(result.rules_applied, 0);
    }

    #[test]
    fn direct_contradiction_recorded_but_both_facts_kept() {
        let rules: Vec<Rule> = Vec::new();
        let detector = ConflictDetector::new(TimeOverlapPolicy::Strict);
        let time = DeterministicTimeSource;
        let chainer = ForwardChainer::new(&rules, &detector, &time);
        let mut b = budget(10);

        let alive = Fact::new(
            SymbolId::new("t", "alive"),
            Map::from([("who".to_string(), Term::atom("cat"))]),
            Polarity::Assert,
            ScopeId::root(),
            TimeRef::interval(0, 10, crate::fact::Precision::Ms),
        );
        let dead = Fact::new(
            SymbolId::new("t", "alive"),
            Map::from([("who".to_string(), Term::atom("cat"))]),
            Polarity::Deny,
            ScopeId::root(),
            TimeRef::interval(5, 15, crate::fact::Precision::Ms),
        );

        let result = chainer.run(vec![alive, dead], &mut b);
        assert_eq!(result.derived.len(), 2);
        assert_eq!(result.conflicts.len(), 1);
    }
}
