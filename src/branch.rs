// SPDX-License-Identifier: PMPL-1.0-or-later

//! Hypothesis branching: diversity-aware pruning and merge-with-resolution.
//!
//! Branches live in an arena (`HashMap<BranchId, Branch>`) with parent
//! links stored as ids, never owning references, so pruning is an O(1)
//! flag flip and ancestors stay traceable (design notes §9).

use crate::budget::Budget;
use crate::conflict::Conflict;
use crate::fact::Fact;
use crate::rule::FactPattern;
use std::collections::HashMap;

pub type BranchId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchStatus {
    Active,
    Pruned,
    Merged,
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub parent: Option<BranchId>,
    pub hypothesis: Option<FactPattern>,
    pub snapshot: Option<HashMap<String, Fact>>,
    pub depth: u32,
    pub score: f64,
    pub derived_facts: Vec<Fact>,
    pub conflicts: Vec<Conflict>,
    pub status: BranchStatus,
}

impl Branch {
    pub fn is_active(&self) -> bool {
        self.status == BranchStatus::Active
    }
}

#[derive(Debug)]
pub struct BranchManager {
    branches: HashMap<BranchId, Branch>,
    next_id: BranchId,
    pub prune_threshold: f64,
    pub min_kept_branches: usize,
}

impl Default for BranchManager {
    fn default() -> Self {
        Self::new(0.3, 2)
    }
}

impl BranchManager {
    pub fn new(prune_threshold: f64, min_kept_branches: usize) -> Self {
        Self {
            branches: HashMap::new(),
            next_id: 0,
            prune_threshold,
            min_kept_branches,
        }
    }

    fn alloc_id(&mut self) -> BranchId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn create_root(&mut self) -> BranchId {
        let id = self.alloc_id();
        self.branches.insert(
            id,
            Branch {
                id,
                parent: None,
                hypothesis: None,
                snapshot: None,
                depth: 0,
                score: 1.0,
                derived_facts: Vec::new(),
                conflicts: Vec::new(),
                status: BranchStatus::Active,
            },
        );
        id
    }

    pub fn get(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(&id)
    }

    pub fn get_mut(&mut self, id: BranchId) -> Option<&mut Branch> {
        self.branches.get_mut(&id)
    }

    pub fn active_ids(&self) -> Vec<BranchId> {
        self.branches
            .values()
            .filter(|b| b.is_active())
            .map(|b| b.id)
            .collect()
    }

    /// Fails if the branch budget is exhausted. On success, consumes
    /// one branch budget unit and shallow-copies the parent's
    /// snapshot.
    pub fn create_branch(
        &mut self,
        parent: BranchId,
        hypothesis: Option<FactPattern>,
        budget: &mut Budget,
    ) -> Option<BranchId> {
        if !budget.consume_branch() {
            return None;
        }
        if !budget.consume_depth() {
            return None;
        }
        let parent_branch = self.branches.get(&parent)?;
        // Hypothesis templates carry no independent score in this
        // engine; a child branch starts at its parent's score and is
        // re-scored once its hypothesis is confirmed or refuted.
        let score = parent_branch.score;
        let snapshot = parent_branch.snapshot.clone();
        let depth = parent_branch.depth + 1;

        let id = self.alloc_id();
        self.branches.insert(
            id,
            Branch {
                id,
                parent: Some(parent),
                hypothesis,
                snapshot,
                depth,
                score,
                derived_facts: Vec::new(),
                conflicts: Vec::new(),
                status: BranchStatus::Active,
            },
        );
        Some(id)
    }

    /// Sort active branches by descending score, keep everything
    /// scoring at least `best.score * prune_threshold`, always
    /// retaining at least `min_kept_branches`. Pruned branches are
    /// flagged, not removed, so ancestry stays traceable. Pruning does
    /// not refund branch budget (policy: budget tracks attempts, not
    /// survivors).
    pub fn prune(&mut self, candidates: &[BranchId]) -> Vec<BranchId> {
        let mut scored: Vec<BranchId> = candidates
            .iter()
            .copied()
            .filter(|id| self.branches.get(id).is_some_and(Branch::is_active))
            .collect();
        scored.sort_by(|a, b| {
            let sa = self.branches[a].score;
            let sb = self.branches[b].score;
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });

        let best_score = scored
            .first()
            .map(|id| self.branches[id].score)
            .unwrap_or(0.0);
        let threshold = best_score * self.prune_threshold;

        let mut kept = Vec::new();
        for (i, id) in scored.iter().enumerate() {
            let score = self.branches[id].score;
            if i < self.min_kept_branches || score >= threshold {
                kept.push(*id);
            } else {
                self.branches.get_mut(id).unwrap().status = BranchStatus::Pruned;
            }
        }
        kept
    }

    /// Resolver hook for mixed-polarity groups during merge.
    pub fn merge(
        &mut self,
        branch_ids: &[BranchId],
        resolver: Option<&dyn ConflictResolver>,
    ) -> MergeResult {
        if branch_ids.len() == 1 {
            let id = branch_ids[0];
            let facts = self.branches[&id].derived_facts.clone();
            self.branches.get_mut(&id).unwrap().status = BranchStatus::Merged;
            return MergeResult {
                kept: facts,
                discarded: Vec::new(),
                conflicts: Vec::new(),
            };
        }

        let mut by_fact_id: HashMap<String, Vec<Fact>> = HashMap::new();
        for id in branch_ids {
            if let Some(branch) = self.branches.get(id) {
                for fact in &branch.derived_facts {
                    by_fact_id.entry(fact.fact_id.clone()).or_default().push(fact.clone());
                }
            }
        }

        let mut kept = Vec::new();
        let mut discarded = Vec::new();
        let mut conflicts = Vec::new();

        for (fact_id, instances) in by_fact_id {
            let mut polarities = instances.iter().map(|f| f.polarity);
            let first = polarities.next();
            let mixed = first.is_some_and(|p| polarities.any(|q| q != p));

            if !mixed {
                kept.push(instances[0].clone());
                discarded.extend(instances.into_iter().skip(1));
                continue;
            }

            let conflict = crate::conflict::Conflict::new(
                crate::conflict::ConflictType::Branch,
                vec![fact_id.clone()],
                None,
                format!("branch merge polarity conflict on fact {fact_id}"),
            );

            if let Some(resolver) = resolver {
                let decision = resolver.resolve(&conflict, &instances);
                kept.extend(decision.keep);
                discarded.extend(decision.discard);
            } else {
                discarded.extend(instances);
            }
            conflicts.push(conflict);
        }

        for id in branch_ids {
            if let Some(branch) = self.branches.get_mut(id) {
                branch.status = BranchStatus::Merged;
            }
        }

        MergeResult {
            kept,
            discarded,
            conflicts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub kept: Vec<Fact>,
    pub discarded: Vec<Fact>,
    pub conflicts: Vec<Conflict>,
}

pub struct ResolverDecision {
    pub keep: Vec<Fact>,
    pub discard: Vec<Fact>,
}

pub trait ConflictResolver {
    fn resolve(&self, conflict: &Conflict, instances: &[Fact]) -> ResolverDecision;
}

/// Prefers the instance with the highest `confidence`; ties broken by
/// first-encountered order.
pub struct SimpleConflictResolver;

impl ConflictResolver for SimpleConflictResolver {
    fn resolve(&self, _conflict: &Conflict, instances: &[Fact]) -> ResolverDecision {
        let mut best_idx = 0;
        for (i, f) in instances.iter().enumerate().skip(1) {
            if f.confidence > instances[best_idx].confidence {
                best_idx = i;
            }
        }
        let mut keep = Vec::new();
        let mut discard = Vec::new();
        for (i, f) in instances.iter().cloned().enumerate() {
            if i == best_idx {
                keep.push(f);
            } else {
                discard.push(f);
            }
        }
        ResolverDecision { keep, discard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetLimits;
    use crate::fact::{Polarity, ScopeId, SymbolId, TimeRef};
    use std::collections::BTreeMap;

    fn budget() -> Budget {
        Budget::new(
            BudgetLimits {
                max_depth: 10,
                max_steps: 100,
                max_branches: 5,
                max_time_ms: None,
            },
            true,
        )
    }

    fn fact(polarity: Polarity, confidence: f64) -> Fact {
        Fact::new(
            SymbolId::new("t", "alive"),
            BTreeMap::from([("who".to_string(), crate::fact::Term::atom("cat"))]),
            polarity,
            ScopeId::root(),
            TimeRef::Unknown,
        )
        .with_confidence(confidence)
    }

    #[test]
    fn single_branch_merge_returns_facts_unchanged_and_flags_merged() {
        let mut mgr = BranchManager::default();
        let root = mgr.create_root();
        mgr.get_mut(root).unwrap().derived_facts.push(fact(Polarity::Assert, 1.0));

        let result = mgr.merge(&[root], None);
        assert_eq!(result.kept.len(), 1);
        assert!(result.discarded.is_empty());
        assert!(result.conflicts.is_empty());
        assert_eq!(mgr.get(root).unwrap().status, BranchStatus::Merged);
    }

    #[test]
    fn merge_with_polarity_conflict_keeps_higher_confidence() {
        let mut mgr = BranchManager::default();
        let root = mgr.create_root();
        let mut budget = budget();
        let b1 = mgr.create_branch(root, None, &mut budget).unwrap();
        let b2 = mgr.create_branch(root, None, &mut budget).unwrap();

        mgr.get_mut(b1).unwrap().derived_facts.push(fact(Polarity::Assert, 0.5));
        mgr.get_mut(b2).unwrap().derived_facts.push(fact(Polarity::Deny, 0.9));

        let result = mgr.merge(&[b1, b2], Some(&SimpleConflictResolver));
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.kept[0].confidence, 0.9);
        assert_eq!(result.discarded.len(), 1);
        assert_eq!(result.discarded[0].confidence, 0.5);
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn prune_always_keeps_minimum_branches() {
        let mut mgr = BranchManager::new(0.3, 2);
        let root = mgr.create_root();
        let mut budget = budget();
        let mut ids = vec![root];
        for i in 0..4 {
            let id = mgr.create_branch(root, None, &mut budget).unwrap();
            mgr.get_mut(id).unwrap().score = 0.01 * (i as f64);
            ids.push(id);
        }
        let kept = mgr.prune(&ids);
        assert!(kept.len() >= 2);
    }

    #[test]
    fn create_branch_fails_when_branch_budget_exhausted() {
        let mut mgr = BranchManager::default();
        let root = mgr.create_root();
        let mut budget = Budget::new(
            BudgetLimits {
                max_depth: 10,
                max_steps: 100,
                max_branches: 0,
                max_time_ms: None,
            },
            true,
        );
        assert!(mgr.create_branch(root, None, &mut budget).is_none());
    }

    #[test]
    fn create_branch_fails_when_depth_budget_exhausted() {
        let mut mgr = BranchManager::default();
        let root = mgr.create_root();
        let mut budget = Budget::new(
            BudgetLimits {
                max_depth: 0,
                max_steps: 100,
                max_branches: 5,
                max_time_ms: None,
            },
            true,
        );
        assert!(mgr.create_branch(root, None, &mut budget).is_none());
    }
}
