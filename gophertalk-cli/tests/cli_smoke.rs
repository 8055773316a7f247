//! Smoke tests for command wiring

use assert_cmd::Command;
use predicates::prelude::*;

fn gophertalk() -> Command {
    let mut cmd = Command::cargo_bin("gophertalk").unwrap();
    // Keep a developer's .env and shell from leaking into the tests
    cmd.current_dir(std::env::temp_dir());
    for var in [
        "JWT_SECRET",
        "DATABASE_URL",
        "DB_POOL_MAX",
        "ACCESS_TOKEN_TTL_SECS",
        "REFRESH_TOKEN_TTL_SECS",
        "RUN_MIGRATIONS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    gophertalk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_serve_help() {
    gophertalk()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--database-url"))
        .stdout(predicate::str::contains("--pool-max"))
        .stdout(predicate::str::contains("--cors-permissive"))
        .stdout(predicate::str::contains("DB_POOL_MAX"))
        .stdout(predicate::str::contains("JWT_SECRET"));
}

#[test]
fn test_migrate_help() {
    gophertalk()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn test_serve_requires_jwt_secret() {
    gophertalk()
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JWT_SECRET"));
}

#[test]
fn test_zero_pool_max_is_rejected() {
    gophertalk()
        .args(["serve", "--pool-max", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--pool-max"));
}

#[test]
fn test_invalid_env_value_is_reported() {
    gophertalk()
        .arg("serve")
        .env("DB_POOL_MAX", "lots")
        .assert()
        .failure()
        .stderr(predicate::str::contains("lots"))
        .stderr(predicate::str::contains("--pool-max"));
}

#[test]
fn test_token_lifetime_is_bounded() {
    gophertalk()
        .arg("serve")
        .env("JWT_SECRET", "shh")
        .env("ACCESS_TOKEN_TTL_SECS", u64::MAX.to_string())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--access-ttl"));

    gophertalk()
        .args(["serve", "--refresh-ttl", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--refresh-ttl"));
}
