//! Integration Test: Panic Prohibition
//!
//! **Policy**: No public entry point may panic on documented input. Production
//! code propagates errors with `?` or degrades (missing targets are no-ops),
//! so `.unwrap()` and `.expect(` are forbidden outside test code.

use std::fs;

use architectural_enforcement::{production_files, production_lines};

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let mut violations = Vec::new();

    for path in production_files() {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        for (line_number, code) in production_lines(&content) {
            if code.contains(".unwrap()") || code.contains(".expect(") {
                violations.push(format!("{}:{} - {}", path.display(), line_number, code.trim()));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: unwrap()/expect() found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }
        eprintln!("\n✅ Use `?`, `unwrap_or_default()`, or an explicit fallback instead.");

        panic!(
            "\nFound {} panic site(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
