use std::{env, process::Command};
use vergen::EmitBuilder;

fn git_ok(args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git_stdout(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn main() {
    // Build and cargo metadata always; git metadata only inside a worktree
    // that has at least one commit, so fresh checkouts and tarballs build too.
    let mut emit = EmitBuilder::builder();
    emit.all_build().all_cargo();
    let in_repo =
        git_ok(&["rev-parse", "--is-inside-work-tree"]) && git_ok(&["rev-parse", "--verify", "HEAD"]);
    if in_repo {
        let _ = emit.all_git();
    }
    emit.emit().expect("Unable to generate build information");

    // Displayed version: crate version plus the commit count, e.g. 0.1.0+42
    let pkg_version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into());
    let build_version = if in_repo {
        match git_stdout(&["rev-list", "--count", "HEAD"]) {
            Some(count) => format!("{}+{}", pkg_version, count),
            None => pkg_version,
        }
    } else {
        pkg_version
    };
    println!("cargo:rustc-env=APP_BUILD_VERSION={}", build_version);

    if let Ok(desc) = env::var("CARGO_PKG_DESCRIPTION") {
        println!("cargo:rustc-env=APP_PKG_DESCRIPTION={}", desc);
    }

    // Suggested release artifact name, e.g. parkpro_backend_linux_x86_64
    let name = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "app".into());
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let mut artifact = format!("{}_{}_{}", name, os, arch);
    if os == "windows" {
        artifact.push_str(".exe");
    }
    println!("cargo:rustc-env=APP_BIN_FILENAME={}", artifact);
}
