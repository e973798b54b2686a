// SPDX-License-Identifier: PMPL-1.0-or-later

//! closure-engine — a bounded forward-chaining reasoning engine.
//!
//! Facts are content-addressed by predicate and arguments; rules fire
//! under a resource budget via an agenda-driven forward chainer;
//! contradictions are detected directly, temporally, and across
//! merged hypothesis branches; results are reported in one of three
//! modes (strict, conditional, indeterminate) depending on how much of
//! the closure held together.

pub mod branch;
pub mod budget;
pub mod chainer;
pub mod conflict;
pub mod config;
pub mod errors;
pub mod fact;
pub mod facade;
pub mod hypervector;
pub mod logging;
pub mod mode;
pub mod rule;
pub mod scenario;
pub mod scorer;
pub mod time_source;
pub mod unifier;
