// SPDX-License-Identifier: PMPL-1.0-or-later

//! Canonical fact model: atoms, terms, symbols, scopes, time references,
//! and content-addressed facts.
//!
//! `fact_id` is a function of `(predicate, canonical-sorted arguments)`
//! only — scope, time, polarity, and provenance never affect identity
//! (Invariant I1).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A typed primitive value, optionally tagged with a unit symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Atom {
    String(String),
    Int(i64),
    Number(f64),
    Bool(bool),
}

impl Atom {
    fn canonical_repr(&self) -> String {
        match self {
            Atom::String(s) => format!("s:{s}"),
            Atom::Int(i) => format!("i:{i}"),
            // Fixed precision keeps identical values from hashing differently
            // across platforms with different default float formatting.
            Atom::Number(n) => format!("n:{n:.12}"),
            Atom::Bool(b) => format!("b:{b}"),
        }
    }
}

/// Either an atom or a named-slot compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Term {
    Atom(Atom),
    Struct {
        symbol: String,
        slots: BTreeMap<String, Term>,
    },
    /// A pattern variable, written `?name` in rule premises/conclusions.
    Var(String),
}

impl Term {
    pub fn atom(s: impl Into<String>) -> Self {
        Term::Atom(Atom::String(s.into()))
    }

    pub fn int(i: i64) -> Self {
        Term::Atom(Atom::Int(i))
    }

    pub fn number(n: f64) -> Self {
        Term::Atom(Atom::Number(n))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    /// Slot order is irrelevant for equality; `BTreeMap` already keeps
    /// slots lexicographically sorted, so canonicalization is a
    /// recursive walk rather than an explicit sort step.
    fn canonical_repr(&self) -> String {
        match self {
            Term::Atom(a) => a.canonical_repr(),
            Term::Var(name) => format!("?{name}"),
            Term::Struct { symbol, slots } => {
                let mut out = format!("{symbol}(");
                for (i, (slot, term)) in slots.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{slot}={}", term.canonical_repr());
                }
                out.push(')');
                out
            }
        }
    }
}

/// A qualified symbol: `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId {
    pub namespace: String,
    pub name: String,
}

impl SymbolId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }
}

/// A path that localizes a fact's visibility. Containment = prefix
/// relation: `A` contains `B` iff `A`'s path is a prefix of `B`'s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScopeId(pub Vec<String>);

impl ScopeId {
    pub fn root() -> Self {
        ScopeId(Vec::new())
    }

    pub fn path(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ScopeId(segments.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, other: &ScopeId) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }

    /// Two scopes overlap iff one contains the other; disjoint scopes
    /// are invisible to each other.
    pub fn overlaps(&self, other: &ScopeId) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// The more specific (longer) of two overlapping scopes.
    pub fn more_specific<'a>(&'a self, other: &'a ScopeId) -> &'a ScopeId {
        if other.0.len() > self.0.len() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Ms,
    Second,
    Minute,
    Hour,
    Day,
}

impl Precision {
    /// Width of one unit of this precision, in milliseconds.
    fn unit_ms(self) -> i64 {
        match self {
            Precision::Ms => 1,
            Precision::Second => 1_000,
            Precision::Minute => 60_000,
            Precision::Hour => 3_600_000,
            Precision::Day => 86_400_000,
        }
    }

    /// Coarser of two precisions (the common precision to project to).
    fn coarser(self, other: Precision) -> Precision {
        if self.unit_ms() >= other.unit_ms() {
            self
        } else {
            other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimeRef {
    Instant { epoch_ms: i64, precision: Precision },
    Interval {
        start_ms: i64,
        end_ms: i64,
        precision: Precision,
    },
    Relative {
        anchor_id: String,
        offset_ms: i64,
        precision: Precision,
    },
    Unknown,
}

impl TimeRef {
    /// Intervals with `start > end` are normalized by swapping.
    pub fn interval(start_ms: i64, end_ms: i64, precision: Precision) -> Self {
        let (start_ms, end_ms) = if start_ms > end_ms {
            (end_ms, start_ms)
        } else {
            (start_ms, end_ms)
        };
        TimeRef::Interval {
            start_ms,
            end_ms,
            precision,
        }
    }

    /// Project to a concrete `[start, end]` range at a given
    /// precision, resolving `Relative` against `anchor_ms` and
    /// `Unknown` to `None` (never overlaps anything, including itself,
    /// under `strict`).
    fn range(&self, anchor_ms: i64) -> Option<(i64, i64, Precision)> {
        match self {
            TimeRef::Instant { epoch_ms, precision } => Some((*epoch_ms, *epoch_ms, *precision)),
            TimeRef::Interval {
                start_ms,
                end_ms,
                precision,
            } => Some((*start_ms, *end_ms, *precision)),
            TimeRef::Relative {
                offset_ms,
                precision,
                ..
            } => {
                let point = anchor_ms + offset_ms;
                Some((point, point, *precision))
            }
            TimeRef::Unknown => None,
        }
    }
}

/// Widening behaviour for overlap checks beyond bit-exact interval math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOverlapPolicy {
    /// Closed interval overlap at the projected common precision.
    Strict,
    /// Widen each range by one unit of its precision before comparing,
    /// so adjacent coarse-grained instants are treated as overlapping.
    Widened,
}

/// `timeOverlaps(a, b, policy) == timeOverlaps(b, a, policy)` by
/// construction: the comparison below is symmetric in `a`/`b`.
pub fn time_overlaps(a: &TimeRef, b: &TimeRef, policy: TimeOverlapPolicy) -> bool {
    time_overlaps_anchored(a, b, policy, 0)
}

pub fn time_overlaps_anchored(
    a: &TimeRef,
    b: &TimeRef,
    policy: TimeOverlapPolicy,
    anchor_ms: i64,
) -> bool {
    let (Some((a_start, a_end, a_prec)), Some((b_start, b_end, b_prec))) =
        (a.range(anchor_ms), b.range(anchor_ms))
    else {
        return false;
    };

    let common = a_prec.coarser(b_prec);
    let unit = common.unit_ms().max(1);
    let project = |ms: i64| ms.div_euclid(unit);

    let (mut a_lo, mut a_hi) = (project(a_start), project(a_end));
    let (mut b_lo, mut b_hi) = (project(b_start), project(b_end));

    if policy == TimeOverlapPolicy::Widened {
        a_lo -= 1;
        a_hi += 1;
        b_lo -= 1;
        b_hi += 1;
    }

    a_lo <= b_hi && b_lo <= a_hi
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Assert,
    Deny,
}

impl Polarity {
    pub fn opposite(self, other: Polarity) -> bool {
        self != other
    }
}

/// A single provenance entry: a source and a timestamp (or the
/// deterministic zero, under `deterministic_time`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub source_id: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub fact_id: String,
    pub predicate: SymbolId,
    pub arguments: BTreeMap<String, Term>,
    pub polarity: Polarity,
    pub scope_id: ScopeId,
    pub time: TimeRef,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Fact {
    /// Build a fact, computing `fact_id` from predicate + arguments.
    /// Scope, time, polarity, provenance never enter the hash.
    pub fn new(
        predicate: SymbolId,
        arguments: BTreeMap<String, Term>,
        polarity: Polarity,
        scope_id: ScopeId,
        time: TimeRef,
    ) -> Self {
        let fact_id = compute_fact_id(&predicate, &arguments);
        Self {
            fact_id,
            predicate,
            arguments,
            polarity,
            scope_id,
            time,
            confidence: 1.0,
            provenance: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_provenance(mut self, entries: Vec<ProvenanceEntry>) -> Self {
        self.provenance = entries;
        self
    }

    /// Recompute `fact_id` — used after slot rewriting (e.g. when a
    /// caller mutates `arguments` directly) to keep I1 intact.
    pub fn recompute_id(&mut self) {
        self.fact_id = compute_fact_id(&self.predicate, &self.arguments);
    }
}

/// Hash `(predicate, canonical-sorted arguments)` with blake3, hex
/// encoded for use as a printable trace ref / conflict-id ingredient.
pub fn compute_fact_id(predicate: &SymbolId, arguments: &BTreeMap<String, Term>) -> String {
    let mut buf = format!("{}|", predicate.qualified());
    for (slot, term) in arguments.iter() {
        let _ = write!(buf, "{slot}={};", term.canonical_repr());
    }
    let digest = blake3::hash(buf.as_bytes());
    hex::encode(digest.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Term)]) -> BTreeMap<String, Term> {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn fact_id_independent_of_scope_time_polarity() {
        let pred = SymbolId::new("fam", "parent");
        let a1 = args(&[("x", Term::atom("alice")), ("y", Term::atom("bob"))]);
        let a2 = a1.clone();

        let f1 = Fact::new(
            pred.clone(),
            a1,
            Polarity::Assert,
            ScopeId::root(),
            TimeRef::Unknown,
        );
        let f2 = Fact::new(
            pred,
            a2,
            Polarity::Deny,
            ScopeId::path(["a"]),
            TimeRef::Instant {
                epoch_ms: 1000,
                precision: Precision::Ms,
            },
        );
        assert_eq!(f1.fact_id, f2.fact_id);
    }

    #[test]
    fn canonicalizing_twice_equals_canonicalizing_once() {
        let pred = SymbolId::new("fam", "parent");
        let a = args(&[("y", Term::atom("bob")), ("x", Term::atom("alice"))]);
        let id1 = compute_fact_id(&pred, &a);
        let id2 = compute_fact_id(&pred, &a);
        assert_eq!(id1, id2);
    }

    #[test]
    fn slot_order_does_not_affect_struct_identity() {
        let mut s1 = BTreeMap::new();
        s1.insert("a".to_string(), Term::atom("1"));
        s1.insert("b".to_string(), Term::atom("2"));
        let mut s2 = BTreeMap::new();
        s2.insert("b".to_string(), Term::atom("2"));
        s2.insert("a".to_string(), Term::atom("1"));

        let t1 = Term::Struct {
            symbol: "point".into(),
            slots: s1,
        };
        let t2 = Term::Struct {
            symbol: "point".into(),
            slots: s2,
        };
        assert_eq!(t1.canonical_repr(), t2.canonical_repr());
    }

    #[test]
    fn scope_containment_is_prefix_relation() {
        let a = ScopeId::path(["team"]);
        let b = ScopeId::path(["team", "alice"]);
        let c = ScopeId::path(["other"]);
        assert!(a.contains(&b));
        assert!(!b.contains(&a));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn time_overlaps_is_symmetric() {
        let a = TimeRef::interval(0, 100, Precision::Ms);
        let b = TimeRef::interval(50, 150, Precision::Ms);
        assert_eq!(
            time_overlaps(&a, &b, TimeOverlapPolicy::Strict),
            time_overlaps(&b, &a, TimeOverlapPolicy::Strict)
        );
        assert!(time_overlaps(&a, &b, TimeOverlapPolicy::Strict));
    }

    #[test]
    fn disjoint_intervals_do_not_overlap_under_strict() {
        let a = TimeRef::interval(0, 10, Precision::Ms);
        let b = TimeRef::interval(20, 30, Precision::Ms);
        assert!(!time_overlaps(&a, &b, TimeOverlapPolicy::Strict));
    }

    #[test]
    fn interval_normalizes_swapped_bounds() {
        let t = TimeRef::interval(100, 10, Precision::Ms);
        match t {
            TimeRef::Interval { start_ms, end_ms, .. } => {
                assert_eq!(start_ms, 10);
                assert_eq!(end_ms, 100);
            }
            _ => panic!("expected interval"),
        }
    }

    #[test]
    fn unknown_time_never_overlaps() {
        assert!(!time_overlaps(&TimeRef::Unknown, &TimeRef::Unknown, TimeOverlapPolicy::Strict));
    }
}
