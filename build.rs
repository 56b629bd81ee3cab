use std::process::Command;

fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!rev.is_empty()).then_some(rev)
}

fn main() {
    let base = env!("CARGO_PKG_VERSION");
    let rev = git_describe().or_else(|| std::env::var("GIT_SHA").ok().filter(|s| !s.is_empty()));

    let version = match rev {
        Some(rev) => format!("{}+{}", base, rev),
        None => base.to_string(),
    };
    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
