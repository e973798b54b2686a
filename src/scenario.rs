// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scenario files: a facts/rules/mode bundle the CLI's `run`/`check`/
//! `replay` subcommands load from disk, JSON or YAML by extension.

use crate::errors::{EngineError, EngineResult, ErrorContext, ErrorKind};
use crate::fact::Fact;
use crate::mode::{Mode, QueryResult};
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub facts: Vec<Fact>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

pub fn load(path: &Path) -> EngineResult<Scenario> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        EngineError::new(
            ErrorKind::InputMalformed,
            format!("failed to read scenario file: {err}"),
            ErrorContext::new("scenario::load", "scenario"),
        )
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    if is_yaml {
        serde_yaml::from_str(&content).map_err(|err| {
            EngineError::new(
                ErrorKind::InputMalformed,
                format!("invalid YAML scenario: {err}"),
                ErrorContext::new("scenario::load", "scenario"),
            )
            .with_suggestion("check indentation and that every fact/rule field matches the schema")
        })
    } else {
        serde_json::from_str(&content).map_err(|err| {
            EngineError::new(
                ErrorKind::InputMalformed,
                format!("invalid JSON scenario: {err}"),
                ErrorContext::new("scenario::load", "scenario"),
            )
        })
    }
}

/// Load a previously saved `QueryResult` (the `run` subcommand's
/// `--json`/`--yaml` output) for `replay` to inspect — same
/// extension-sniffed JSON/YAML loading as [`load`], distinct input
/// shape.
pub fn load_result(path: &Path) -> EngineResult<QueryResult> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        EngineError::new(
            ErrorKind::InputMalformed,
            format!("failed to read result file: {err}"),
            ErrorContext::new("scenario::load_result", "scenario"),
        )
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    if is_yaml {
        serde_yaml::from_str(&content).map_err(|err| {
            EngineError::new(
                ErrorKind::InputMalformed,
                format!("invalid YAML result: {err}"),
                ErrorContext::new("scenario::load_result", "scenario"),
            )
        })
    } else {
        serde_json::from_str(&content).map_err(|err| {
            EngineError::new(
                ErrorKind::InputMalformed,
                format!("invalid JSON result: {err}"),
                ErrorContext::new("scenario::load_result", "scenario"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_json_scenario() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"facts": [], "rules": []}}"#).unwrap();
        let scenario = load(file.path()).expect("should parse");
        assert!(scenario.facts.is_empty());
        assert!(scenario.rules.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn loads_saved_result_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"mode":"strict","budget_used":{{"steps":1,"branches":0,"depth":0,"time_ms":0}},
               "claims":[],"assumptions":[],"conflicts":[],
               "trace_refs":["step 1: seeded fact(a)"],"execution_ms":0}}"#
        )
        .unwrap();
        let result = load_result(file.path()).expect("should parse");
        assert_eq!(result.trace_refs, vec!["step 1: seeded fact(a)".to_string()]);
    }
}
