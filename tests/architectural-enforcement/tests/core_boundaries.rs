//! Integration Test: Conductor Core Boundaries
//!
//! **Policy**: The conductor core is headless and non-blocking. It must not
//! depend on terminal or logging-subscriber crates, must not print, must not
//! block inside async code, and must never sleep a thread.

use architectural_enforcement::{assert_clean, in_async_fn, scan, workspace_path};

const CORE_SRC: &str = "conductor/core/src";
const CLI_SRC: &str = "conductor/cli/src";

/// Crates that belong to front ends, never to the core
const FRONT_END_CRATES: &[&str] = &[
    "ratatui",
    "crossterm",
    "clap",
    "tracing_subscriber",
    "anyhow",
];

/// Test that the core imports no front-end crates
#[test]
fn test_core_has_no_front_end_dependencies() {
    let violations = scan(&workspace_path(CORE_SRC), |lines, idx| {
        let line = lines[idx].1;
        FRONT_END_CRATES
            .iter()
            .any(|krate| line.contains(&format!("{krate}::")) || line.contains(&format!("use {krate}")))
    });

    assert_clean("Front-end crate used in the conductor core", &violations);
}

/// Test that the core never writes to the terminal
#[test]
fn test_core_does_not_print() {
    let violations = scan(&workspace_path(CORE_SRC), |lines, idx| {
        let line = lines[idx].1;
        ["println!", "print!(", "eprintln!", "eprint!(", "dbg!("]
            .iter()
            .any(|m| line.contains(m))
    });

    assert_clean(
        "Terminal output in the conductor core (use tracing or ConductorMessage)",
        &violations,
    );
}

/// Test that async code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let blocking = |lines: &[(usize, &str)], idx: usize| {
        let line = lines[idx].1;
        let blocking_call = line.contains("std::fs::")
            || line.contains("std::net::")
            || line.contains("std::process::Command")
            || line.contains("std::io::stdin()");
        (blocking_call && in_async_fn(lines, idx)) || line.contains("reqwest::blocking")
    };

    let mut violations = scan(&workspace_path(CORE_SRC), blocking);
    violations.extend(scan(&workspace_path(CLI_SRC), blocking));

    assert_clean("Blocking I/O in async code", &violations);
}

/// Test that production code never sleeps a thread
#[test]
fn test_no_thread_sleep() {
    let sleeps = |lines: &[(usize, &str)], idx: usize| {
        let line = lines[idx].1;
        line.contains("thread::sleep") || line.contains("std::thread::sleep")
    };

    let mut violations = scan(&workspace_path(CORE_SRC), sleeps);
    violations.extend(scan(&workspace_path(CLI_SRC), sleeps));

    assert_clean("std::thread::sleep in production code", &violations);
}

/// Guard against the scans silently checking nothing
#[test]
fn test_scanned_trees_exist() {
    for dir in [CORE_SRC, CLI_SRC] {
        let path = workspace_path(dir);
        assert!(path.is_dir(), "missing source tree {}", path.display());
    }
}
