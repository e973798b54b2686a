// SPDX-License-Identifier: PMPL-1.0-or-later

//! Self-diagnostics: a quick environment sanity check before running a
//! scenario for real.

use anyhow::{anyhow, Result};
use std::env;
use std::path::Path;

const LOG_ENV: &str = "CLOSURE_ENGINE_LOG";

pub fn run_self_diagnostics(scenarios_dir: Option<&Path>) -> Result<()> {
    println!("closure-engine self-diagnostics");

    let mut checks = Vec::new();
    checks.push(Diagnostic::ok(
        "version",
        format!("closure-engine {}", env!("CARGO_PKG_VERSION")),
    ));
    checks.push(check_logging());
    checks.push(check_scenarios_dir(scenarios_dir.unwrap_or(Path::new("scenarios"))));

    println!();
    for entry in &checks {
        entry.print();
    }

    if checks.iter().any(|entry| entry.level == Level::Error) {
        Err(anyhow!("self-diagnostics reported issues"))
    } else {
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Level {
    Ok,
    Warn,
    Error,
}

struct Diagnostic {
    label: &'static str,
    level: Level,
    detail: String,
}

impl Diagnostic {
    fn ok(label: &'static str, detail: String) -> Self {
        Self {
            label,
            level: Level::Ok,
            detail,
        }
    }

    fn warning(label: &'static str, detail: String) -> Self {
        Self {
            label,
            level: Level::Warn,
            detail,
        }
    }

    fn print(&self) {
        println!("  [{}] {:22} {}", self.level.tag(), self.label, self.detail);
    }
}

impl Level {
    fn tag(&self) -> &'static str {
        match self {
            Level::Ok => "OK",
            Level::Warn => "WARN",
            Level::Error => "ERR",
        }
    }
}

fn check_logging() -> Diagnostic {
    match env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => {
            Diagnostic::ok("logging", format!("{LOG_ENV}={value}"))
        }
        _ => Diagnostic::warning("logging", format!("{LOG_ENV} unset, defaulting to info")),
    }
}

fn check_scenarios_dir(path: &Path) -> Diagnostic {
    if path.is_dir() {
        Diagnostic::ok("scenarios directory", format!("{} exists", path.display()))
    } else {
        Diagnostic::warning(
            "scenarios directory",
            format!("{} missing (create it to store reusable scenario files)", path.display()),
        )
    }
}
