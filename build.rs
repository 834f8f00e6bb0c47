use std::env;
use std::process::Command;

/// Short commit sha of the working tree, if git is available.
fn git_sha() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    println!("cargo:rerun-if-env-changed=GRAYOPT_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    // packaged builds have no .git, let the packager pin the sha
    let sha = env::var("GRAYOPT_GIT_SHA")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(git_sha);

    if let Some(sha) = sha {
        println!("cargo:rustc-env=GRAYOPT_GIT_SHA={}", sha);
    }

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=GRAYOPT_BUILD_PROFILE={}", profile);
}
