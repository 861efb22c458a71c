//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! of the surface control crates:
//! - Locks come from `parking_lot`, never `std::sync`
//! - Production code propagates errors instead of panicking on them
//!
//! These tests are designed to catch violations early in the development cycle.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Source roots checked by every rule, relative to the workspace root
pub const PRODUCTION_ROOTS: &[&str] = &["control/core/src", "control/probe/src"];

/// A rule hit at one source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the line belongs to
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root, derived from this package's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under `dir`, sorted for stable reports
#[must_use]
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
        .collect();
    files.sort();
    files
}

/// The part of a source file that ships: everything before the test module
#[must_use]
pub fn production_source(content: &str) -> &str {
    content
        .find("#[cfg(test)]")
        .map_or(content, |end| &content[..end])
}

/// Scan production code under [`PRODUCTION_ROOTS`] with `is_violation`
///
/// Comment lines are skipped.
pub fn scan_production<F>(is_violation: F) -> Vec<Violation>
where
    F: Fn(&str) -> bool,
{
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in PRODUCTION_ROOTS {
        for path in rust_files(&root.join(dir)) {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for (index, line) in production_source(&content).lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.starts_with("//") {
                    continue;
                }
                if is_violation(trimmed) {
                    violations.push(Violation {
                        path: path.clone(),
                        line: index + 1,
                        text: trimmed.to_string(),
                    });
                }
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_source_cuts_at_test_module() {
        let content = "fn a() {}\n#[cfg(test)]\nmod tests { fn b() { x.unwrap(); } }\n";
        assert_eq!(production_source(content), "fn a() {}\n");
        assert_eq!(production_source("fn a() {}"), "fn a() {}");
    }

    #[test]
    fn test_production_roots_exist() {
        let root = workspace_root();
        for dir in PRODUCTION_ROOTS {
            assert!(!rust_files(&root.join(dir)).is_empty(), "no sources in {dir}");
        }
    }
}
