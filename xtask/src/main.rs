//! Developer-facing maintenance tasks for the exec-gate workspace.
//!
//! Run with `cargo run -p xtask -- <command>`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use walkdir::WalkDir;

/// Source file allowed to construct a process-spawn primitive. Every other
/// `.rs` file under `crates/` and `xtask/` is scanned and rejected if it
/// does too; the gate's core guarantee depends on there being exactly one
/// place a command can actually run.
const SPAWN_SITE: &str = "crates/gate-kernel/src/lib.rs";

const SPAWN_MARKERS: &[&str] = &["process::Command::new(", "std::process::Command::new("];

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Workspace maintenance tasks")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Debug, Subcommand)]
enum Task {
    /// Print the JSON Schema for an on-disk document format.
    Schema {
        #[arg(value_enum)]
        doc: SchemaDoc,
    },
    /// Scan the workspace source tree for process-spawn primitives outside
    /// the execution kernel's single spawn site.
    GuardScan,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaDoc {
    /// The policy document format (`policy.toml`, read as JSON Schema).
    Policy,
    /// The gate config document format (`gate.toml`/env overrides).
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Task::Schema { doc } => print_schema(doc),
        Task::GuardScan => guard_scan(workspace_root()?),
    }
}

fn print_schema(doc: SchemaDoc) -> Result<()> {
    let schema = match doc {
        SchemaDoc::Policy => schemars::schema_for!(gate_core::Policy),
        SchemaDoc::Config => schemars::schema_for!(gate_config::GateConfig),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Walk every `.rs` file under `crates/` and `xtask/`, rejecting any
/// occurrence of a spawn-primitive constructor outside [`SPAWN_SITE`].
fn guard_scan(root: PathBuf) -> Result<()> {
    let mut violations = Vec::new();

    for dir in ["crates", "xtask"] {
        let scan_root = root.join(dir);
        if !scan_root.exists() {
            continue;
        }
        for entry in WalkDir::new(&scan_root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("rs") {
                continue;
            }
            let rel = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            if rel == SPAWN_SITE {
                continue;
            }
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            for marker in SPAWN_MARKERS {
                if content.contains(marker) {
                    violations.push(format!("{rel}: contains `{marker}`"));
                }
            }
        }
    }

    if violations.is_empty() {
        println!("guard-scan: ok, single spawn site at {SPAWN_SITE}");
        Ok(())
    } else {
        for v in &violations {
            eprintln!("guard-scan: {v}");
        }
        bail!(
            "guard-scan: found {} process-spawn site(s) outside {SPAWN_SITE}",
            violations.len()
        );
    }
}

fn workspace_root() -> Result<PathBuf> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_scan_accepts_the_real_workspace() {
        guard_scan(workspace_root().unwrap()).unwrap();
    }

    #[test]
    fn guard_scan_rejects_a_second_spawn_site() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("crates/gate-kernel/src")).unwrap();
        std::fs::write(
            dir.path().join("crates/gate-kernel/src/lib.rs"),
            "tokio::process::Command::new(\"x\");",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("crates/other/src")).unwrap();
        std::fs::write(
            dir.path().join("crates/other/src/lib.rs"),
            "fn f() { std::process::Command::new(\"sh\"); }",
        )
        .unwrap();

        let err = guard_scan(dir.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("found 1 process-spawn site"));
    }

    #[test]
    fn guard_scan_allows_only_the_designated_site() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("crates/gate-kernel/src")).unwrap();
        std::fs::write(
            dir.path().join("crates/gate-kernel/src/lib.rs"),
            "tokio::process::Command::new(\"x\");",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("crates/other/src")).unwrap();
        std::fs::write(
            dir.path().join("crates/other/src/lib.rs"),
            "fn f() { println!(\"no spawn here\"); }",
        )
        .unwrap();

        guard_scan(dir.path().to_path_buf()).unwrap();
    }
}
