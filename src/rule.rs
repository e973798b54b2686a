// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rules and variable bindings.

use crate::fact::{Polarity, ScopeId, SymbolId, Term, TimeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pattern's predicate slot: either a concrete symbol or a variable
/// (written `?name`) that binds to whatever predicate the matched
/// fact carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateRef {
    Exact(SymbolId),
    Var(String),
}

impl From<SymbolId> for PredicateRef {
    fn from(sym: SymbolId) -> Self {
        PredicateRef::Exact(sym)
    }
}

/// A Fact-shaped pattern or template: same shape as `Fact`, but every
/// field may be absent (unconstrained) or contain variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactPattern {
    pub predicate: PredicateRef,
    #[serde(default)]
    pub arguments: BTreeMap<String, Term>,
    #[serde(default)]
    pub polarity: Option<Polarity>,
    #[serde(default)]
    pub scope_id: Option<ScopeId>,
    #[serde(default)]
    pub time: Option<TimeRef>,
}

impl FactPattern {
    pub fn new(predicate: SymbolId) -> Self {
        Self {
            predicate: PredicateRef::Exact(predicate),
            arguments: BTreeMap::new(),
            polarity: None,
            scope_id: None,
            time: None,
        }
    }

    pub fn with_arg(mut self, slot: impl Into<String>, term: Term) -> Self {
        self.arguments.insert(slot.into(), term);
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = Some(polarity);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub premises: Vec<FactPattern>,
    pub conclusions: Vec<FactPattern>,
    #[serde(default)]
    pub priority: i64,
    pub estimated_cost: u64,
}

impl Rule {
    pub fn specificity(&self) -> usize {
        self.premises.len()
    }
}

impl FactPattern {
    /// Resolve a (possibly variable) predicate slot under a binding
    /// set, falling back to a literal `?name:?name` symbol when the
    /// variable is left unbound (mirrors the unbound-conclusion policy
    /// for arguments: admit rather than reject).
    pub fn instantiate_predicate(&self, binding: &Binding) -> SymbolId {
        match &self.predicate {
            PredicateRef::Exact(sym) => sym.clone(),
            PredicateRef::Var(name) => match binding.get(name) {
                Some(Term::Atom(crate::fact::Atom::String(q))) => {
                    match q.split_once(':') {
                        Some((ns, n)) => SymbolId::new(ns, n),
                        None => SymbolId::new("?", q.clone()),
                    }
                }
                _ => SymbolId::new("?", name.clone()),
            },
        }
    }
}

/// A mapping from variable name to bound `Term`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding(pub BTreeMap<String, Term>);

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.0.get(var)
    }

    pub fn insert(&mut self, var: impl Into<String>, term: Term) {
        self.0.insert(var.into(), term);
    }

    /// Two bindings merge iff every common key has an equal term.
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        let mut merged = self.clone();
        for (k, v) in other.0.iter() {
            match merged.0.get(k) {
                Some(existing) if existing != v => return None,
                _ => {
                    merged.0.insert(k.clone(), v.clone());
                }
            }
        }
        Some(merged)
    }

    /// Substitute bound variables into a term, leaving unbound
    /// variables as literal tokens (spec §4.2 open-question policy:
    /// the conclusion fact is still admitted, not rejected).
    pub fn instantiate(&self, term: &Term) -> Term {
        match term {
            Term::Var(name) => self.0.get(name).cloned().unwrap_or_else(|| term.clone()),
            Term::Struct { symbol, slots } => Term::Struct {
                symbol: symbol.clone(),
                slots: slots
                    .iter()
                    .map(|(k, v)| (k.clone(), self.instantiate(v)))
                    .collect(),
            },
            Term::Atom(_) => term.clone(),
        }
    }

    /// True when instantiating `term` through this binding would still
    /// leave a bare variable token somewhere — the malformed-rule case
    /// flagged for diagnostics rather than rejected.
    pub fn leaves_unbound(&self, term: &Term) -> bool {
        match term {
            Term::Var(name) => !self.0.contains_key(name),
            Term::Struct { slots, .. } => slots.values().any(|t| self.leaves_unbound(t)),
            Term::Atom(_) => false,
        }
    }
}
