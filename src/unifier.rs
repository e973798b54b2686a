// SPDX-License-Identifier: PMPL-1.0-or-later

//! Pattern-to-fact unification.
//!
//! Failures are values (`None`), never errors — this module has no
//! side effects and never panics on a non-match.

use crate::fact::{Atom, Fact, Term};
use crate::rule::{Binding, FactPattern, PredicateRef};

/// Unify a pattern against a fact with an empty starting binding.
pub fn unify(pattern: &FactPattern, fact: &Fact) -> Option<Binding> {
    unify_with(pattern, fact, &Binding::new())
}

/// Unify a pattern against a fact, extending `existing` bindings.
/// Fails if a variable is already bound to a different term.
pub fn unify_with(pattern: &FactPattern, fact: &Fact, existing: &Binding) -> Option<Binding> {
    let mut bindings = existing.clone();

    match &pattern.predicate {
        PredicateRef::Exact(sym) if *sym != fact.predicate => return None,
        PredicateRef::Exact(_) => {}
        PredicateRef::Var(name) => {
            let qualified = Term::Atom(Atom::String(fact.predicate.qualified()));
            match bindings.get(name) {
                Some(bound) if *bound != qualified => return None,
                Some(_) => {}
                None => bindings.insert(name.clone(), qualified),
            }
        }
    }

    if let Some(want) = pattern.polarity {
        if want != fact.polarity {
            return None;
        }
    }

    for (slot, pattern_term) in pattern.arguments.iter() {
        let fact_term = fact.arguments.get(slot)?;
        bindings = unify_terms(pattern_term, fact_term, &bindings)?;
    }
    Some(bindings)
}

/// Deep structural unification of two terms under a binding set.
fn unify_terms(pattern: &Term, fact: &Term, bindings: &Binding) -> Option<Binding> {
    match pattern {
        Term::Var(name) => match bindings.get(name) {
            Some(bound) if bound != fact => None,
            Some(_) => Some(bindings.clone()),
            None => {
                let mut next = bindings.clone();
                next.insert(name.clone(), fact.clone());
                Some(next)
            }
        },
        Term::Atom(_) => {
            if pattern == fact {
                Some(bindings.clone())
            } else {
                None
            }
        }
        Term::Struct {
            symbol: p_sym,
            slots: p_slots,
        } => match fact {
            Term::Struct {
                symbol: f_sym,
                slots: f_slots,
            } if p_sym == f_sym => {
                let mut current = bindings.clone();
                for (slot, p_term) in p_slots.iter() {
                    let f_term = f_slots.get(slot)?;
                    current = unify_terms(p_term, f_term, &current)?;
                }
                Some(current)
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{Polarity, ScopeId, SymbolId, TimeRef};
    use std::collections::BTreeMap;

    fn fact(pred: &str, args: &[(&str, Term)]) -> Fact {
        Fact::new(
            SymbolId::new("t", pred),
            args.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect(),
            Polarity::Assert,
            ScopeId::root(),
            TimeRef::Unknown,
        )
    }

    #[test]
    fn variable_slot_binds() {
        let pattern = FactPattern::new(SymbolId::new("t", "parent"))
            .with_arg("x", Term::atom("alice"))
            .with_arg("y", Term::var("child"));
        let f = fact("parent", &[("x", Term::atom("alice")), ("y", Term::atom("bob"))]);
        let bindings = unify(&pattern, &f).expect("should unify");
        assert_eq!(bindings.get("child"), Some(&Term::atom("bob")));
    }

    #[test]
    fn literal_mismatch_fails() {
        let pattern = FactPattern::new(SymbolId::new("t", "parent"))
            .with_arg("x", Term::atom("alice"));
        let f = fact("parent", &[("x", Term::atom("carol"))]);
        assert!(unify(&pattern, &f).is_none());
    }

    #[test]
    fn missing_fact_slot_fails() {
        let pattern = FactPattern::new(SymbolId::new("t", "parent")).with_arg("z", Term::var("v"));
        let f = fact("parent", &[("x", Term::atom("alice"))]);
        assert!(unify(&pattern, &f).is_none());
    }

    #[test]
    fn polarity_constraint_enforced() {
        let pattern = FactPattern::new(SymbolId::new("t", "alive")).with_polarity(Polarity::Deny);
        let f = fact("alive", &[]);
        assert!(unify(&pattern, &f).is_none());
    }

    #[test]
    fn unspecified_polarity_matches_either() {
        let pattern = FactPattern::new(SymbolId::new("t", "alive"));
        let f = fact("alive", &[]);
        assert!(unify(&pattern, &f).is_some());
    }

    #[test]
    fn existing_binding_conflict_fails() {
        let mut existing = Binding::new();
        existing.insert("x", Term::atom("alice"));
        let pattern = FactPattern::new(SymbolId::new("t", "parent")).with_arg("a", Term::var("x"));
        let f = fact("parent", &[("a", Term::atom("carol"))]);
        assert!(unify_with(&pattern, &f, &existing).is_none());
    }

    #[test]
    fn predicate_mismatch_fails() {
        let pattern = FactPattern::new(SymbolId::new("t", "parent"));
        let f = fact("sibling", &[]);
        assert!(unify(&pattern, &f).is_none());
    }

    #[test]
    fn variable_predicate_binds_to_qualified_name() {
        let pattern = FactPattern {
            predicate: PredicateRef::Var("rel".to_string()),
            ..FactPattern::new(SymbolId::new("t", "placeholder"))
        };
        let f = fact("parent", &[]);
        let bindings = unify(&pattern, &f).expect("should unify");
        assert_eq!(bindings.get("rel"), Some(&Term::atom("t:parent")));
    }
}
