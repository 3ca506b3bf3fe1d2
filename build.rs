use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=BILANS_VERSION_OVERRIDE");

    let version = std::env::var("BILANS_VERSION_OVERRIDE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_describe)
        .map(|described| release_or_snapshot(&described))
        .unwrap_or_else(|| snapshot(env!("CARGO_PKG_VERSION")));

    println!("cargo:rustc-env=BILANS_VERSION={}", version);
}

/// `git describe` output, or `None` outside a checkout.
fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    (!described.is_empty()).then(|| described.to_string())
}

/// Tags are `vX.Y.Z`; a dirty tree is stamped so two local builds never share a version.
fn release_or_snapshot(described: &str) -> String {
    let version = described.trim().trim_start_matches('v');
    if version.ends_with("-dirty") {
        snapshot(version)
    } else {
        version.to_string()
    }
}

fn snapshot(base: &str) -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{}-{}", base, seconds)
}
