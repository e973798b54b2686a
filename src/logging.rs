// SPDX-License-Identifier: PMPL-1.0-or-later

//! `tracing-subscriber` bootstrap. One call, made once, from `main`.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber from `CLOSURE_ENGINE_LOG`, falling
/// back to `info` when unset or unparsable. Safe to call more than
/// once — later calls are no-ops, matching `tracing`'s own guarantee.
pub fn init() {
    let filter = EnvFilter::try_from_env("CLOSURE_ENGINE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
