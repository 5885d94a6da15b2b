//! Embeds build identification for the startup banner and `--version` logs
//!
//! Sets `GIT_HASH`, `BUILD_TIMESTAMP` (UTC, RFC 3339) and `BUILD_PROFILE`.

use std::process::Command;

const UNKNOWN: &str = "unknown";

/// Trimmed stdout of a successful git invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    let mut git_hash = git(&["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(|| UNKNOWN.to_string());
    if git(&["status", "--porcelain", "--untracked-files=no"]).is_some() && git_hash != UNKNOWN {
        git_hash.push_str("-dirty");
    }

    let env_vars = [
        ("GIT_HASH", git_hash),
        (
            "BUILD_TIMESTAMP",
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ),
        (
            "BUILD_PROFILE",
            std::env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.to_string()),
        ),
    ];
    for (name, value) in env_vars {
        println!("cargo:rustc-env={}={}", name, value);
    }

    // Without rerun-if-changed lines cargo reruns this on every build
}
