//! Integration Test: Lock Discipline
//!
//! **Policy**: Production code takes its locks from `parking_lot`.
//! `std::sync::Mutex` and `std::sync::RwLock` poison on panic and force an
//! `unwrap` at every lock site.

use architectural_enforcement::scan_production;

fn uses_std_lock(line: &str) -> bool {
    line.contains("std::sync") && (line.contains("Mutex") || line.contains("RwLock"))
}

#[test]
fn test_no_std_locks_in_production_code() {
    let violations = scan_production(uses_std_lock);

    if !violations.is_empty() {
        eprintln!("\n❌ std::sync locks found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED: parking_lot::Mutex, parking_lot::RwLock");

        panic!(
            "\nFound {} std::sync lock(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_detector() {
    assert!(uses_std_lock("use std::sync::Mutex;"));
    assert!(uses_std_lock("use std::sync::{Arc, RwLock};"));
    assert!(!uses_std_lock("use std::sync::Arc;"));
    assert!(!uses_std_lock("use parking_lot::Mutex;"));
}
