//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. Waiting happens on
//! fade completion, fetch completion or task handles.
//! **Exception**: the timed fade effect, whose whole job is to wait out a
//! duration.

use std::fs;
use std::path::Path;

use architectural_enforcement::{production_files, production_lines};

/// Files allowed to sleep
const ALLOWED: &[&str] = &["nerdbox/core/src/surface/fade.rs"];

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_sleep_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - The timed fade effect (surface/fade.rs)");
        eprintln!("  - Test code");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep to 'wait' for a fade or fetch (await its handle instead)");
        eprintln!("  - Sleep as poor man's synchronization");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all sleep() calls in production code
fn find_sleep_violations() -> Vec<String> {
    production_files()
        .iter()
        .filter(|path| !is_allowed(path))
        .flat_map(|path| check_file(path))
        .collect()
}

fn is_allowed(path: &Path) -> bool {
    ALLOWED.iter().any(|allowed| path.ends_with(allowed))
}

fn check_file(path: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    production_lines(&content)
        .into_iter()
        .filter(|(_, code)| code.contains("::sleep(") || code.contains(".sleep("))
        .map(|(line_number, code)| format!("{}:{} - {}", path.display(), line_number, code.trim()))
        .collect()
}

#[test]
fn test_fade_effect_is_the_only_sleeper() {
    let fade = production_files()
        .into_iter()
        .find(|path| is_allowed(path))
        .expect("fade effect source exists");
    let content = fs::read_to_string(&fade).unwrap();
    assert!(
        production_lines(&content)
            .iter()
            .any(|(_, code)| code.contains("tokio::time::sleep(")),
        "fade effect should wait on the Tokio timer"
    );
}
