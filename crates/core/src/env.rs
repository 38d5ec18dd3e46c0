// SPDX-License-Identifier: MIT

//! Typed accessors for the orchestrator's environment configuration (§6).

use std::time::Duration;

/// `RUN_LOOP_MAX_ITERATIONS` — default cap when settings omit one.
pub fn default_max_iterations() -> u32 {
    parse_env("RUN_LOOP_MAX_ITERATIONS").unwrap_or(20)
}

/// `RUN_LOOP_GLOBAL_CONCURRENCY` — bound on concurrently active runs (§5).
pub fn global_concurrency() -> usize {
    parse_env("RUN_LOOP_GLOBAL_CONCURRENCY").unwrap_or(4)
}

/// `RUN_LOOP_TIMEOUT_MS` — per-iteration hard cap, default 30 minutes (§5).
pub fn iteration_timeout() -> Duration {
    let ms: u64 = parse_env("RUN_LOOP_TIMEOUT_MS").unwrap_or(1_800_000);
    Duration::from_millis(ms)
}

/// `RUN_LOOP_EXECUTOR_MODE` — `local` | `containerized` | `remote`.
pub fn executor_mode_override() -> Option<String> {
    std::env::var("RUN_LOOP_EXECUTOR_MODE").ok()
}

/// Grace window between a preemptive graceful signal and a hard kill (§4.3).
pub const SUPERVISOR_GRACE_WINDOW: Duration = Duration::from_secs(5);

/// Default shutdown drain window (§5).
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_secs(60);

/// Default log tail length and its hard ceiling (§4.6).
pub const DEFAULT_TAIL_LINES: usize = 120;
pub const MAX_TAIL_LINES: usize = 1000;

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn default_max_iterations_falls_back() {
        std::env::remove_var("RUN_LOOP_MAX_ITERATIONS");
        assert_eq!(default_max_iterations(), 20);
    }

    #[test]
    #[serial]
    fn default_max_iterations_reads_env() {
        std::env::set_var("RUN_LOOP_MAX_ITERATIONS", "7");
        assert_eq!(default_max_iterations(), 7);
        std::env::remove_var("RUN_LOOP_MAX_ITERATIONS");
    }

    #[test]
    #[serial]
    fn iteration_timeout_default_is_thirty_minutes() {
        std::env::remove_var("RUN_LOOP_TIMEOUT_MS");
        assert_eq!(iteration_timeout(), Duration::from_secs(1800));
    }
}
