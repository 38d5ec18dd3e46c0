// SPDX-License-Identifier: MIT

//! §4.4: "MUST translate absolute sandbox paths in tool-call output to paths
//! relative to the sandbox before logging."

use std::path::Path;

/// Replace every occurrence of `sandbox_path` in `text` with a path relative
/// to it. Occurrences with a trailing separator are rewritten without
/// re-adding a leading `/`.
pub fn relativize(text: &str, sandbox_path: &Path) -> String {
    let absolute = sandbox_path.to_string_lossy();
    if absolute.is_empty() || !text.contains(absolute.as_ref()) {
        return text.to_string();
    }
    let with_trailing_slash = format!("{}/", absolute.trim_end_matches('/'));
    text.replace(&with_trailing_slash, "").replace(absolute.as_ref(), ".")
}
