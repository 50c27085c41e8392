//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries
//! (domain → application → infra → commands/output) hold.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.starts_with("#[cfg(") && trimmed.contains("test") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

fn src_dir(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Non-test lines of every file under `layer` containing any of `needles`.
fn find_in_layer(layer: &str, needles: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir(layer)) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let rel = relative(&file);
        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            if in_test || trimmed.starts_with("//") {
                continue;
            }
            for needle in needles {
                if line.contains(needle) {
                    violations.push(format!("{rel}:{}: `{needle}`: {trimmed}", i + 1));
                }
            }
        }
    }
    violations
}

// ── Layer imports ─────────────────────────────────────────────────────────────

#[test]
fn domain_is_pure() {
    let violations = find_in_layer(
        "domain",
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_imports_from_outer_layers() {
    let violations = find_in_layer(
        "application",
        &["crate::infra", "crate::commands", "crate::output"],
    );
    assert!(
        violations.is_empty(),
        "application/ must depend only on domain/ and its own ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_in_layer("infra", &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find_in_layer("infra", &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

#[test]
fn services_do_not_print() {
    let violations = find_in_layer("application", &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "services report through ProgressReporter, not stdout:\n{}",
        violations.join("\n")
    );
}

// ── Process execution routes through the command runner ───────────────────────

#[test]
fn no_process_spawning_outside_infra() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src) {
        let rel = relative(&file);
        if rel.contains("/infra/") {
            continue;
        }
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            if line.contains("Command::new(") {
                violations.push(format!("{rel}:{}: {line}", i + 1));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found Command::new outside infra/: run processes through CommandRunner:\n{}",
        violations.join("\n")
    );
}

#[test]
fn tokio_command_runner_is_wired_only_by_commands() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src) {
        let rel = relative(&file);
        if rel.contains("/infra/") || rel.contains("/commands/") {
            continue;
        }
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            if line.contains("TokioCommandRunner") {
                violations.push(format!("{rel}:{}: {line}", i + 1));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "TokioCommandRunner referenced outside infra/ and commands/:\n{}",
        violations.join("\n")
    );
}

// ── Commands take the unified context ─────────────────────────────────────────

#[test]
fn command_handlers_accept_app_context() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        if !content.contains("pub async fn run(") {
            continue;
        }
        if !content.contains("pub async fn run(app: &AppContext") {
            violations.push(relative(&file));
        }
    }

    assert!(
        violations.is_empty(),
        "Command handlers must take `app: &AppContext` first:\n{}",
        violations.join("\n")
    );
}
