// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Build script: generates the open-source license notice embedded in the
//! binary and exposes Git/build metadata as `env!()` constants consumed by
//! [`crate::build_info::BuildInfo`].

use anyhow::{Context, Result};
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Minimal per-dependency info pulled from `cargo metadata`, used only to
/// render the open-source notice bundled with the binary.
struct PackageInfo {
    name: String,
    version: String,
    license: Option<String>,
}

fn get_packages_info() -> Result<Vec<PackageInfo>> {
    let output = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".into()))
        .args(["metadata", "--format-version", "1", "--no-deps"])
        .output()
        .context("failed to execute cargo metadata")?;
    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)
        .context("failed to parse cargo metadata output")?;
    let mut packages_info = Vec::new();
    if let Some(packages) = metadata.get("packages").and_then(|p| p.as_array()) {
        for package in packages {
            packages_info.push(PackageInfo {
                name: package["name"].as_str().unwrap_or_default().to_string(),
                version: package["version"].as_str().unwrap_or_default().to_string(),
                license: package["license"].as_str().map(|s| s.to_string()),
            });
        }
    }
    Ok(packages_info)
}

/// Generates `$OUT_DIR/license_notice.rs` containing a `LICENSE_NOTICE` constant.
fn generate_license_notice() -> Result<()> {
    let packages_info = get_packages_info()?;

    let mut notice = String::new();
    notice.push_str(
        "This software is licensed under the SCTG Development Non-Commercial License v1.0.\n",
    );
    notice.push_str("For more information, see the LICENSE.md file in the root of this project.\n");
    notice.push_str("(c) Ronan LE MEILLAT, SCTG Development\n");
    notice.push_str("---\n");
    notice.push_str("This software contains Open Source Software (OSS) components:\n");
    for package in &packages_info {
        notice.push_str(&format!(
            "- {} ({}) - {}\n",
            package.name,
            package.version,
            package.license.as_deref().unwrap_or("Unknown")
        ));
    }
    notice.push_str("---\n");
    notice.push_str("Please note that this software is an original work and does not constitute a derivative work of any of its dependencies.\n");

    let out_dir = env::var("OUT_DIR")?;
    let file_path = PathBuf::from(out_dir).join("license_notice.rs");
    let mut file = File::create(file_path)?;
    writeln!(file, "pub const LICENSE_NOTICE: &str = r#\"{}\"#;", notice)?;
    Ok(())
}

/// Extracts Git commit information for build metadata, falling back to
/// `"unknown"` values outside a Git checkout (e.g. a vendored source tarball).
fn get_git_info() -> (String, String, String) {
    let run = |args: &[&str]| -> Option<String> {
        Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    };

    let short_hash = run(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let full_hash = run(&["rev-parse", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let date = run(&["log", "-1", "--format=%ci"]).unwrap_or_else(|| "unknown".into());
    let dirty = run(&["status", "--porcelain"])
        .map(|s| !s.is_empty())
        .unwrap_or(false);

    if dirty {
        (format!("{}-dirty", short_hash), format!("{}-dirty", full_hash), date)
    } else {
        (short_hash, full_hash, date)
    }
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");
    println!("cargo:rerun-if-changed=Cargo.lock");

    if let Err(err) = generate_license_notice() {
        println!("cargo:warning=failed to generate license notice: {err:#}");
        // Still emit an empty constant so the `include!` in lib.rs keeps compiling.
        if let Ok(out_dir) = env::var("OUT_DIR") {
            let _ = std::fs::write(
                PathBuf::from(out_dir).join("license_notice.rs"),
                "pub const LICENSE_NOTICE: &str = \"\";\n",
            );
        }
    }

    let (short_hash, full_hash, date) = get_git_info();
    println!("cargo:rustc-env=GIT_COMMIT_HASH_SHORT={short_hash}");
    println!("cargo:rustc-env=GIT_COMMIT_HASH_FULL={full_hash}");
    println!("cargo:rustc-env=GIT_COMMIT_DATE={date}");

    let build_timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".into());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={build_timestamp}");
    println!("cargo:rustc-env=BUILD_RUSTC_VERSION={}", env::var("RUSTC").unwrap_or_else(|_| "unknown".into()));
    println!("cargo:rustc-env=BUILD_TARGET={}", env::var("TARGET").unwrap_or_else(|_| "unknown".into()));
}
