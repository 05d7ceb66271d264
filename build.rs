// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packaged builds pin the version from outside
    let version = if let Ok(v) = std::env::var("FILL_LIGHT_VERSION") {
        v
    } else {
        git_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn git_version() -> String {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
            described
                .strip_prefix('v')
                .map(str::to_string)
                .unwrap_or(described)
        }
        _ => env!("CARGO_PKG_VERSION").to_string(),
    }
}
