use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BUILD_TIMESTAMP");
    println!("cargo:rerun-if-env-changed=BUILD_GIT_HASH");

    let timestamp = std::env::var("BUILD_TIMESTAMP").unwrap_or_else(|_| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
            .to_string()
    });
    println!("cargo:rustc-env=BUILD_TIMESTAMP={timestamp}");

    // Outside a git checkout (e.g. a packaged crate) the hash is "unknown"
    let git_hash = std::env::var("BUILD_GIT_HASH").unwrap_or_else(|_| {
        Command::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map_or_else(|| "unknown".to_string(), |hash| hash.trim().to_string())
    });
    println!("cargo:rustc-env=BUILD_GIT_HASH={git_hash}");
}
