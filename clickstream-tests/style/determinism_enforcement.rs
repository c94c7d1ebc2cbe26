//! Determinism Enforcement
//!
//! Production code in the simulation crate must not read wall-clock time or
//! ambient entropy. Every draw goes through the run's `RandomSource` and every
//! timestamp is derived from simulated seconds. Test modules are exempt.

use std::fs;
use std::path::{Path, PathBuf};

const BANNED: &[(&str, &str)] = &[
    ("thread_rng", "ambient RNG"),
    ("rand::rng()", "ambient RNG"),
    ("from_entropy", "entropy-seeded RNG"),
    ("from_os_rng", "entropy-seeded RNG"),
    ("OsRng", "entropy-seeded RNG"),
    ("SystemTime::now", "wall-clock time"),
    ("Utc::now", "wall-clock time"),
    ("Local::now", "wall-clock time"),
];

/// A banned call found in production code
#[derive(Debug)]
struct DeterminismViolation {
    file_path: String,
    line_number: usize,
    pattern: &'static str,
    reason: &'static str,
}

struct DeterminismChecker {
    violations: Vec<DeterminismViolation>,
    files_checked: usize,
}

impl DeterminismChecker {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
            files_checked: 0,
        }
    }

    fn find_rust_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::find_rust_files(&path, files)?;
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
        Ok(())
    }

    fn is_test_file(path: &Path) -> bool {
        path.file_name().is_some_and(|name| name == "tests.rs")
    }

    fn check_file(&mut self, path: &Path) -> std::io::Result<()> {
        if Self::is_test_file(path) {
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        self.files_checked += 1;

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            // Everything after the first test gate is test support
            if trimmed == "#[cfg(test)]" {
                break;
            }
            if trimmed.starts_with("//") {
                continue;
            }
            for &(pattern, reason) in BANNED {
                if trimmed.contains(pattern) {
                    self.violations.push(DeterminismViolation {
                        file_path: path.display().to_string(),
                        line_number: idx + 1,
                        pattern,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    fn report(&self) -> String {
        self.violations
            .iter()
            .map(|v| {
                format!(
                    "  {}:{} uses `{}` ({})",
                    v.file_path, v.line_number, v.pattern, v.reason
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
