//! Stamps the commit and build time reported by `GET /version`.

use std::process::Command;

fn git_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8(output.stdout).ok()?;
    Some(rev.trim().to_owned())
}

fn main() {
    let commit = git_head().unwrap_or_else(|| "unknown".to_owned());
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=BAILIFF_COMMIT={commit}");
    println!("cargo:rustc-env=BAILIFF_BUILT_AT={built_at}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
