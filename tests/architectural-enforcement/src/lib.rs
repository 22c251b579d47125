//! Architectural Enforcement Integration Tests
//!
//! This package contains source scans that enforce architectural principles:
//! - The conductor core stays headless (no terminal or subscriber crates)
//! - No blocking I/O inside async functions
//! - No `std::thread::sleep` in production code
//!
//! The helpers here walk a source tree and report offending lines; the tests
//! under `tests/` decide which trees and patterns to check.

use std::fs;
use std::path::{Path, PathBuf};

/// One offending source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// The trimmed line
    pub line: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line_number, self.line)
    }
}

/// Absolute path of a workspace directory
pub fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

/// Production lines of one file, with their 1-based numbers
///
/// Comment tails are stripped and everything from the first `#[cfg(test)]`
/// on is skipped.
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter(|(_, line)| {
            let trimmed = line.trim_start();
            !(trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*'))
        })
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .collect()
}

/// Whether the function enclosing line `idx` is `async`
///
/// Scans back to the nearest `fn` header; stops at module and impl
/// boundaries.
pub fn in_async_fn(lines: &[(usize, &str)], idx: usize) -> bool {
    for (_, line) in lines[..=idx].iter().rev() {
        let trimmed = line.trim();
        if trimmed.contains("fn ") && !trimmed.starts_with("let ") {
            return trimmed.contains("async fn ");
        }
        if trimmed.starts_with("mod ") || trimmed.starts_with("impl") {
            return false;
        }
    }
    false
}

/// Scan every `.rs` file under `dir`, reporting lines `check` flags
///
/// `check` receives the file's production lines and an index into them.
pub fn scan<F>(dir: &Path, check: F) -> Vec<Violation>
where
    F: Fn(&[(usize, &str)], usize) -> bool,
{
    let mut violations = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };

        let lines = production_lines(&content);
        for idx in 0..lines.len() {
            if check(&lines, idx) {
                let (line_number, line) = lines[idx];
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line_number,
                    line: line.trim().to_string(),
                });
            }
        }
    }

    violations
}

/// Panic with a readable report when `violations` is not empty
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!("\nFound {} violation(s): {rule}", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_tests() {
        let src = "fn a() {}\n// note\n#[cfg(test)]\nmod tests { fn b() {} }\n";
        let lines = production_lines(src);
        assert_eq!(lines, vec![(1, "fn a() {}")]);
    }

    #[test]
    fn test_in_async_fn() {
        let src = "async fn load() {\n    let x = 1;\n}\nfn parse() {\n    let y = 2;\n}\n";
        let lines = production_lines(src);
        assert!(in_async_fn(&lines, 1));
        assert!(!in_async_fn(&lines, 4));
    }
}
