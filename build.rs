//! Build script for gatehouse
//!
//! Stamps the git revision and build time into the binary for `/version`.

use std::process::Command;

/// Trimmed stdout of a successful `git` invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let commit = git(&["rev-parse", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let short: String = if commit == "unknown" {
        commit.clone()
    } else {
        commit.chars().take(8).collect()
    };
    // Uncommitted changes in the tree the binary was built from
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .map(|status| !status.is_empty())
        .unwrap_or(false);

    println!("cargo:rustc-env=GATEHOUSE_COMMIT={commit}");
    println!("cargo:rustc-env=GATEHOUSE_COMMIT_SHORT={short}");
    println!("cargo:rustc-env=GATEHOUSE_DIRTY={dirty}");
    println!(
        "cargo:rustc-env=GATEHOUSE_BUILT_AT={}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );

    for watched in [".git/HEAD", ".git/index", ".git/refs/heads/"] {
        println!("cargo:rerun-if-changed={watched}");
    }
}
