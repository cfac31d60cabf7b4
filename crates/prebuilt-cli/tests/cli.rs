//! End-to-end tests driving the `prebuilt` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use flate2::Compression;
use flate2::write::GzEncoder;
use prebuilt_schema::Sha256Digest;
use tempfile::TempDir;

const PLATFORM: &str = "linux/x86_64";

/// Test context with an isolated prebuilt home
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".prebuilt");
        std::fs::create_dir_all(&home).expect("failed to create prebuilt home");
        Self { temp_dir, home }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_prebuilt"));
        cmd.env("HOME", self.temp_dir.path())
            .env("PREBUILT_HOME", &self.home)
            .env("NO_COLOR", "1")
            .env_remove("PREBUILT_CATALOG")
            .env_remove("PREBUILT_PREFIX")
            .env_remove("PREBUILT_TIMEOUT")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run prebuilt")
    }

    fn target(&self) -> PathBuf {
        self.home.join("bin").join("tool")
    }

    /// Build `tool_1.0.0/tool` into a tar.gz and return (path, sha256).
    fn archive(&self, script: &str) -> (PathBuf, String) {
        let path = self.temp_dir.path().join("tool_Linux_x86_64.tar.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        let body = format!("#!/bin/sh\n{script}\n");
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o755);
        builder
            .append_data(&mut header, "tool_1.0.0/tool", body.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let digest = Sha256Digest::compute(&std::fs::read(&path).unwrap());
        (path, digest.to_string())
    }

    /// Write the default catalog pointing at `archive`.
    fn catalog(&self, archive: &Path, sha256: &str) {
        let doc = format!(
            r#"default_version = "1.0.0"

[package]
name = "tool"
description = "A test tool"

[[release]]
version = "0.9.0"

[[release.artifact]]
os = "macos"
arch = "arm64"
url = "https://example.invalid/0.9.0/tool_Darwin_arm64.tar.gz"
sha256 = "{old}"

[[release]]
version = "1.0.0"

[[release.artifact]]
os = "linux"
arch = "x86_64"
url = "file://{path}"
sha256 = "{sha256}"
"#,
            old = "a".repeat(64),
            path = archive.display(),
        );
        std::fs::write(self.home.join("catalog.toml"), doc).unwrap();
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Usage:"));
    assert!(out.contains("install"));
    assert!(!out.contains("hash"), "hash is hidden");
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("prebuilt "));
}

#[test]
fn test_hash_command() {
    let ctx = TestContext::new();
    let file = ctx.temp_dir.path().join("hello.txt");
    std::fs::write(&file, b"hello world").unwrap();

    let output = ctx.run(&["hash", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(
        stdout(&output)
            .starts_with("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
    );
}

#[test]
fn test_info_lists_releases() {
    let ctx = TestContext::new();
    let (archive, sha) = ctx.archive("echo 1.0.0");
    ctx.catalog(&archive, &sha);

    let output = ctx.run(&["info"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("A test tool"));
    assert!(out.contains("0.9.0"));
    assert!(out.contains("(default)"));
    assert!(out.contains("linux/x86_64"));
    assert!(out.contains("macos/arm64"));
}

#[test]
fn test_missing_catalog_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["info"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("catalog.toml"));
}

#[test]
fn test_shared_digest_catalog_is_rejected() {
    let ctx = TestContext::new();
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../prebuilt-core/tests/fixtures/vi-mongo.toml");

    let output = ctx.run(&["info", "--catalog", fixture.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("share digest"));
}

#[cfg(unix)]
#[test]
fn test_install_end_to_end() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::new();
    let (archive, sha) = ctx.archive("echo \"tool 1.0.0\"");
    ctx.catalog(&archive, &sha);

    let output = ctx.run(&["install", "--platform", PLATFORM]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Installed tool 1.0.0"));

    let target = ctx.target();
    let mode = std::fs::metadata(&target).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    let version = Command::new(&target).arg("--version").output().unwrap();
    assert_eq!(String::from_utf8_lossy(&version.stdout).trim(), "tool 1.0.0");

    // Scratch space is emptied after the run.
    let leftovers = std::fs::read_dir(ctx.home.join("tmp")).unwrap().count();
    assert_eq!(leftovers, 0);

    // Reinstalling produces the same bytes.
    let before = std::fs::read(&target).unwrap();
    let output = ctx.run(&["install", "--platform", PLATFORM]);
    assert!(output.status.success());
    assert_eq!(std::fs::read(&target).unwrap(), before);
}

#[cfg(unix)]
#[test]
fn test_digest_mismatch_installs_nothing() {
    let ctx = TestContext::new();
    let (archive, _) = ctx.archive("echo 1.0.0");
    ctx.catalog(&archive, &"cafebabe".repeat(8));

    let output = ctx.run(&["install", "--platform", PLATFORM]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("verify failed"), "stderr: {err}");
    assert!(err.contains("cafebabe"));
    assert!(!ctx.target().exists());
}

#[test]
fn test_unsupported_platform_fails() {
    let ctx = TestContext::new();
    let (archive, sha) = ctx.archive("echo 1.0.0");
    ctx.catalog(&archive, &sha);

    let output = ctx.run(&["install", "--platform", "windows/x86_64"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("No tool 1.0.0 artifact for windows/x86_64"), "stderr: {err}");
    assert!(!ctx.target().exists());
}

#[cfg(unix)]
#[test]
fn test_smoke_failure_is_a_warning() {
    let ctx = TestContext::new();
    let (archive, sha) = ctx.archive("echo 'cannot load libmongo' >&2; exit 2");
    ctx.catalog(&archive, &sha);

    let output = ctx.run(&["install", "--platform", PLATFORM]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Smoke test failed"));
    assert!(out.contains("Installed tool 1.0.0"));
    assert!(ctx.target().exists());
}

#[test]
fn test_dry_run_changes_nothing() {
    let ctx = TestContext::new();
    let (archive, sha) = ctx.archive("echo 1.0.0");
    ctx.catalog(&archive, &sha);

    let output = ctx.run(&["--dry-run", "install", "--platform", PLATFORM]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Would install tool 1.0.0"));
    assert!(!ctx.home.join("bin").exists());
    assert!(!ctx.home.join("tmp").exists());
}

#[cfg(unix)]
#[test]
fn test_install_older_version_to_prefix() {
    let ctx = TestContext::new();
    let (archive, sha) = ctx.archive("echo 1.0.0");
    ctx.catalog(&archive, &sha);
    let prefix = ctx.temp_dir.path().join("custom-bin");

    // 0.9.0 only ships macos/arm64.
    let output = ctx
        .cmd()
        .args(["install", "--version", "0.9.0", "--platform", PLATFORM])
        .env("PREBUILT_PREFIX", &prefix)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No tool 0.9.0 artifact"));

    let output = ctx
        .cmd()
        .args(["install", "--version", "1.0.0", "--platform", PLATFORM])
        .env("PREBUILT_PREFIX", &prefix)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(prefix.join("tool").exists());
    assert!(!ctx.target().exists());
}

#[cfg(unix)]
#[test]
fn test_remove_command() {
    let ctx = TestContext::new();
    let (archive, sha) = ctx.archive("echo 1.0.0");
    ctx.catalog(&archive, &sha);

    assert!(ctx.run(&["install", "--platform", PLATFORM]).status.success());
    assert!(ctx.target().exists());

    let output = ctx.run(&["remove"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!ctx.target().exists());

    let output = ctx.run(&["remove"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not installed"));
}
