// SPDX-License-Identifier: PMPL-1.0-or-later

//! Direct/temporal contradiction detection under scope visibility and
//! a configurable time-overlap policy.
//!
//! `indirect` conflicts require rule traversal and are not produced
//! here — the type exists as an open hook for an external module, per
//! the design notes.

use crate::fact::{time_overlaps, Fact, ScopeId, TimeOverlapPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    Direct,
    Temporal,
    Indirect,
    Branch,
}

impl ConflictType {
    /// Severity weight used by the MDL scorer's correctness penalty.
    pub fn severity(self) -> f64 {
        match self {
            ConflictType::Direct => 1.0,
            ConflictType::Temporal => 0.7,
            ConflictType::Indirect => 0.5,
            ConflictType::Branch => 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_id: String,
    pub conflict_type: ConflictType,
    pub fact_ids: Vec<String>,
    pub scope_id: Option<ScopeId>,
    pub reason: String,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl Conflict {
    pub fn new(
        conflict_type: ConflictType,
        mut fact_ids: Vec<String>,
        scope_id: Option<ScopeId>,
        reason: impl Into<String>,
    ) -> Self {
        fact_ids.sort();
        let scope_key = scope_id
            .as_ref()
            .map(|s| s.0.join("/"))
            .unwrap_or_else(|| "global".to_string());
        let digest_input = format!("{:?}|{}|{}", conflict_type, fact_ids.join(","), scope_key);
        let conflict_id = hex::encode(blake3::hash(digest_input.as_bytes()).as_bytes());
        Self {
            conflict_id,
            conflict_type,
            fact_ids,
            scope_id,
            reason: reason.into(),
            resolution: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    pub policy: TimeOverlapPolicy,
}

impl ConflictDetector {
    pub fn new(policy: TimeOverlapPolicy) -> Self {
        Self { policy }
    }

    /// Invariant I2: same `fact_id`, opposite polarities, overlapping
    /// scopes, overlapping times.
    pub fn find_direct<'a>(&self, f: &Fact, facts: impl Iterator<Item = &'a Fact>) -> Vec<Conflict> {
        facts
            .filter(|other| other.fact_id == f.fact_id)
            .filter(|other| f.polarity.opposite(other.polarity))
            .filter(|other| f.scope_id.overlaps(&other.scope_id))
            .filter(|other| time_overlaps(&f.time, &other.time, self.policy))
            .map(|other| {
                let scope = f.scope_id.more_specific(&other.scope_id).clone();
                Conflict::new(
                    ConflictType::Direct,
                    vec![f.fact_id.clone(), other.fact_id.clone()],
                    Some(scope),
                    format!(
                        "direct contradiction on {} ({} vs {})",
                        f.predicate.qualified(),
                        polarity_label(f),
                        polarity_label(other)
                    ),
                )
            })
            .collect()
    }

    /// Same predicate and arguments (so same canonical shape) but
    /// authored as independent facts that happen not to share
    /// `fact_id` identity yet — distinct from direct because direct
    /// already implies `fact_id` equality.
    pub fn find_temporal<'a>(
        &self,
        f: &Fact,
        facts: impl Iterator<Item = &'a Fact>,
    ) -> Vec<Conflict> {
        facts
            .filter(|other| {
                other.predicate == f.predicate
                    && other.arguments == f.arguments
                    && f.polarity.opposite(other.polarity)
                    && f.scope_id.overlaps(&other.scope_id)
                    && time_overlaps(&f.time, &other.time, self.policy)
            })
            .map(|other| {
                let scope = f.scope_id.more_specific(&other.scope_id).clone();
                Conflict::new(
                    ConflictType::Temporal,
                    vec![f.fact_id.clone(), other.fact_id.clone()],
                    Some(scope),
                    format!(
                        "temporal contradiction on {} over overlapping time windows",
                        f.predicate.qualified()
                    ),
                )
            })
            .collect()
    }

    /// Union of direct and temporal — used by `check_consistency`.
    /// The chainer's new-fact admission check uses `find_direct` only.
    pub fn find_conflicts<'a>(
        &self,
        f: &Fact,
        facts: impl Iterator<Item = &'a Fact> + Clone,
    ) -> Vec<Conflict> {
        let mut out = self.find_direct(f, facts.clone());
        out.extend(self.find_temporal(f, facts));
        dedup_by_id(out)
    }

    pub fn check_consistency<'a>(&self, facts: impl Iterator<Item = &'a Fact> + Clone) -> ConsistencyReport {
        let all: Vec<&Fact> = facts.collect();
        let mut conflicts = Vec::new();
        for (i, f) in all.iter().enumerate() {
            let rest = all[i + 1..].iter().copied();
            conflicts.extend(self.find_conflicts(f, rest));
        }
        let conflicts = dedup_by_id(conflicts);
        ConsistencyReport {
            consistent: conflicts.is_empty(),
            conflicts,
        }
    }
}

fn polarity_label(f: &Fact) -> &'static str {
    match f.polarity {
        crate::fact::Polarity::Assert => "assert",
        crate::fact::Polarity::Deny => "deny",
    }
}

fn dedup_by_id(mut conflicts: Vec<Conflict>) -> Vec<Conflict> {
    conflicts.sort_by(|a, b| a.conflict_id.cmp(&b.conflict_id));
    conflicts.dedup_by(|a, b| a.conflict_id == b.conflict_id);
    conflicts
}

#[derive(Debug, Clone)]
pub struct ConsistencyReport {
    pub consistent: bool,
    pub conflicts: Vec<Conflict>,
}
