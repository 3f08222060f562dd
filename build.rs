//! Injects build metadata read by `questline::LONG_VERSION`.
//!
//! - `QL_BUILD_TIMESTAMP`: UTC build time, taken from `SOURCE_DATE_EPOCH` when set
//! - `QL_GIT_COMMIT`: short commit hash with a `-dirty` suffix for modified
//!   trees, or "unknown" outside a git checkout

use chrono::{DateTime, Utc};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    println!("cargo:rustc-env=QL_BUILD_TIMESTAMP={}", build_time().format("%Y-%m-%dT%H:%M:%SZ"));
    println!("cargo:rustc-env=QL_GIT_COMMIT={}", commit().unwrap_or_else(|| "unknown".into()));
}

/// Reproducible builds pin the clock through `SOURCE_DATE_EPOCH`.
fn build_time() -> DateTime<Utc> {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

fn commit() -> Option<String> {
    let hash = git(&["rev-parse", "--short", "HEAD"])?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some_and(|s| !s.is_empty());
    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}
