// SPDX-License-Identifier: MIT

//! Branch-name normalization and collision avoidance (§4.2).

/// Normalize a caller-provided branch name to a kebab-safe form: lowercase,
/// `[^a-z0-9./_-]` replaced with `-`, runs of dashes collapsed, leading and
/// trailing dashes stripped.
pub fn normalize_branch_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for ch in lowered.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '/' | '_' | '-') {
            ch
        } else {
            '-'
        };
        if mapped == '-' {
            if last_was_dash {
                continue;
            }
            last_was_dash = true;
        } else {
            last_was_dash = false;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

/// Append an incrementing numeric suffix (`<base>-2`, `<base>-3`, ...) until
/// `exists` reports no collision. `exists` is async-agnostic by design —
/// callers resolve it against `RepositoryAdapter::branch_exists`.
pub async fn resolve_collision<F, Fut>(base: &str, mut exists: F) -> String
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    if !exists(base.to_string()).await {
        return base.to_string();
    }
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !exists(candidate.clone()).await {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_replaces_invalid_chars() {
        assert_eq!(normalize_branch_name("Fix Bug #123!"), "fix-bug-123");
    }

    #[test]
    fn collapses_dash_runs_and_trims() {
        assert_eq!(normalize_branch_name("--weird///name--"), "weird///name");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_branch_name("Fix Bug #123!");
        let twice = normalize_branch_name(&once);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn resolve_collision_picks_first_free_suffix() {
        let taken = ["feature-x".to_string(), "feature-x-2".to_string()];
        let resolved = resolve_collision("feature-x", |candidate| {
            let taken = taken.contains(&candidate);
            async move { taken }
        })
        .await;
        assert_eq!(resolved, "feature-x-3");
    }

    #[tokio::test]
    async fn resolve_collision_is_noop_when_free() {
        let resolved = resolve_collision("feature-y", |_| async { false }).await;
        assert_eq!(resolved, "feature-y");
    }
}
