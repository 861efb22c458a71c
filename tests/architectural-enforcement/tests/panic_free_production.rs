//! Integration Test: Panic-Free Production Code
//!
//! **Policy**: Production code returns errors (`Result`, `thiserror` types in
//! the library, `anyhow` context in the binary). `.unwrap()` and `.expect(`
//! belong in tests only.
//!
//! Non-panicking relatives (`unwrap_or`, `unwrap_or_else`, `unwrap_or_default`)
//! are fine.

use architectural_enforcement::scan_production;

fn panics_on_error(line: &str) -> bool {
    line.contains(".unwrap()") || line.contains(".expect(")
}

#[test]
fn test_no_unwrap_in_production_code() {
    let violations = scan_production(panics_on_error);

    if !violations.is_empty() {
        eprintln!("\n❌ Panicking error handling found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED: propagate with `?`, map with `map_err`, or log and continue");

        panic!(
            "\nFound {} unwrap/expect call(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_detector() {
    assert!(panics_on_error("let x = y.unwrap();"));
    assert!(panics_on_error("let x = y.expect(\"boom\");"));
    assert!(!panics_on_error("let x = y.unwrap_or(0);"));
    assert!(!panics_on_error("let x = y.unwrap_or_default();"));
}
