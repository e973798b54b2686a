// SPDX-License-Identifier: PMPL-1.0-or-later

//! closure-engine — a bounded forward-chaining reasoning engine.
//!
//! Given a scenario of facts and rules, derives a bounded closure under
//! a resource budget, detects contradictions, and reports the result
//! in one of three modes: strict, conditional, or indeterminate.

mod branch;
mod budget;
mod chainer;
mod conflict;
mod config;
mod diagnostics;
mod errors;
mod fact;
mod facade;
mod hypervector;
mod logging;
mod mode;
mod rule;
mod scenario;
mod scorer;
mod time_source;
mod unifier;

use crate::config::EngineConfig;
use crate::facade::ClosureFacade;
use crate::mode::Mode;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

macro_rules! qprintln {
    ($quiet:expr, $($arg:tt)+) => {
        if !$quiet {
            println!($($arg)+);
        }
    };
}

#[derive(Parser)]
#[command(name = "closure-engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bounded-closure forward-chaining reasoning engine")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value_t = false, global = true)]
    quiet: bool,

    #[arg(long, default_value_t = false, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario to its bounded closure and report the result
    Run {
        /// Scenario file (JSON or YAML)
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Force a result mode, overriding the scenario/default config
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Maximum forward-chaining steps
        #[arg(long)]
        max_steps: Option<u64>,

        /// Wall-clock budget in milliseconds
        #[arg(long)]
        max_time_ms: Option<u64>,
    },

    /// Load a scenario and report consistency without deriving new facts
    Check {
        /// Scenario file (JSON or YAML)
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,
    },

    /// Inspect a previously saved result's trace without re-deriving
    Replay {
        /// Saved `QueryResult` file (JSON or YAML), as produced by `run --json`
        #[arg(value_name = "RESULT")]
        result: PathBuf,
    },

    /// Run environment self-diagnostics
    Diagnostics {
        /// Alternate scenarios directory to check for
        #[arg(long, value_name = "DIR")]
        scenarios_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Strict,
    Conditional,
    Indeterminate,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Strict => Mode::Strict,
            ModeArg::Conditional => Mode::Conditional,
            ModeArg::Indeterminate => Mode::Indeterminate,
        }
    }
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            mode,
            max_steps,
            max_time_ms,
        } => {
            let loaded = scenario::load(&scenario).with_context(|| format!("loading {}", scenario.display()))?;

            let mut config = EngineConfig::default();
            if let Some(steps) = max_steps {
                config.budget_limits.max_steps = steps;
            }
            if let Some(ms) = max_time_ms {
                config.budget_limits.max_time_ms = Some(ms);
            }

            let facade = ClosureFacade::new(config);
            let requested_mode = mode.map(Mode::from).or(loaded.mode);
            qprintln!(cli.quiet, "Running {} facts / {} rules", loaded.facts.len(), loaded.rules.len());

            let result = facade
                .run_closure(loaded.facts, loaded.rules, requested_mode)
                .context("closure execution failed")?;

            print_result(&result, cli.quiet, cli.json);
        }

        Commands::Check { scenario } => {
            let loaded = scenario::load(&scenario).with_context(|| format!("loading {}", scenario.display()))?;
            let detector = conflict::ConflictDetector::new(config::EngineConfig::default().time_overlap_policy);
            let report = detector.check_consistency(loaded.facts.iter());

            if report.consistent {
                qprintln!(cli.quiet, "{}", "consistent".green());
            } else {
                qprintln!(cli.quiet, "{} ({} conflict(s))", "inconsistent".red(), report.conflicts.len());
                for conflict in &report.conflicts {
                    qprintln!(cli.quiet, "  - {:?}: {}", conflict.conflict_type, conflict.reason);
                }
                std::process::exit(1);
            }
        }

        Commands::Replay { result } => {
            let saved = scenario::load_result(&result)
                .with_context(|| format!("loading {}", result.display()))?;

            if cli.json {
                print_result(&saved, cli.quiet, true);
            } else {
                qprintln!(cli.quiet, "mode: {:?}", saved.mode);
                if let Some(reason) = &saved.reason {
                    qprintln!(cli.quiet, "reason: {reason}");
                }
                qprintln!(cli.quiet, "trace:");
                for entry in &saved.trace_refs {
                    qprintln!(cli.quiet, "  {entry}");
                }
            }
        }

        Commands::Diagnostics { scenarios_dir } => {
            diagnostics::run_self_diagnostics(scenarios_dir.as_deref())?;
        }
    }

    Ok(())
}

fn print_result(result: &mode::QueryResult, quiet: bool, json: bool) {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("failed to serialize result: {err}"),
        }
        return;
    }

    let mode_label = match result.mode {
        Mode::Strict => "strict".green(),
        Mode::Conditional => "conditional".yellow(),
        Mode::Indeterminate => "indeterminate".red(),
    };
    qprintln!(quiet, "mode: {mode_label}");
    if let Some(reason) = &result.reason {
        qprintln!(quiet, "reason: {reason}");
    }
    qprintln!(quiet, "claims: {}", result.claims.len());
    for claim in &result.claims {
        qprintln!(quiet, "  - {} (confidence {:.2})", claim.summary, claim.confidence);
    }
    if !result.assumptions.is_empty() {
        qprintln!(quiet, "assumptions:");
        for assumption in &result.assumptions {
            qprintln!(quiet, "  - [{}] {}", assumption.kind, assumption.detail);
        }
    }
    if !result.conflicts.is_empty() {
        qprintln!(quiet, "conflicts: {}", result.conflicts.len());
    }
    qprintln!(
        quiet,
        "budget used: {} steps, {} branches, {}ms",
        result.budget_used.steps,
        result.budget_used.branches,
        result.budget_used.time_ms
    );
}
