//! CLI integration tests for tendersync admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use tempfile::NamedTempFile;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tendersync").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("TENDERSYNC_GATEWAY_URL");
        cmd.env_remove("TENDERSYNC_GATEWAY_KEY");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["admin", "init", "--data-dir", &self.data_dir_str()])
            .assert()
    }
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn init_creates_database_file() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Created database"));

    assert!(ctx.data_dir().join("tendersync.db").exists());
}

#[test]
fn init_rejects_second_initialization() {
    let ctx = TestContext::new();

    ctx.init().success();
    ctx.init()
        .failure()
        .stderr(predicate::str::contains("Already initialized"));
}

// ============================================================================
// Invite Command Tests
// ============================================================================

#[test]
fn invite_prints_set_password_link() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args([
            "admin",
            "invite",
            "--data-dir",
            &ctx.data_dir_str(),
            "--email",
            "new@acme.test",
            "--site-url",
            "https://app.test/",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://app.test/set-password#access_token=",
        ))
        .stdout(predicate::str::contains("type=invite"));
}

#[test]
fn invite_requires_initialized_database() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "admin",
            "invite",
            "--data-dir",
            &ctx.data_dir_str(),
            "--email",
            "new@acme.test",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("admin init"));
}

// ============================================================================
// CPV Import Tests
// ============================================================================

#[test]
fn import_cpv_reports_count() {
    let ctx = TestContext::new();
    ctx.init().success();

    let mut file = NamedTempFile::new().expect("create cpv file");
    write!(
        file,
        r#"[{{"CODE": "45000000-7", "EN": "Construction work"}},
            {{"CODE": "03000000-1", "EN": "Agricultural products"}}]"#
    )
    .expect("write cpv file");

    ctx.cmd()
        .args(["admin", "import-cpv", "--data-dir", &ctx.data_dir_str(), "--file"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 CPV codes"));
}

#[test]
fn import_cpv_rejects_malformed_file() {
    let ctx = TestContext::new();
    ctx.init().success();

    let mut file = NamedTempFile::new().expect("create cpv file");
    write!(file, r#"{{"CODE": "45000000-7"}}"#).expect("write cpv file");

    ctx.cmd()
        .args(["admin", "import-cpv", "--data-dir", &ctx.data_dir_str(), "--file"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing"));
}

// ============================================================================
// Serve Configuration Tests
// ============================================================================

#[test]
fn serve_hosted_requires_gateway_settings() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["serve", "--backend", "hosted", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TENDERSYNC_GATEWAY_URL"));
}

#[test]
fn serve_rejects_non_http_gateway_url() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "serve",
            "--gateway-url",
            "abc.supabase.co",
            "--gateway-key",
            "anon",
            "--port",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http(s)"));
}
