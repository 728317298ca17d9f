use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

fn postkeep() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("postkeep"));
    cmd.env_remove("POSTKEEP_CONFIG_FILE")
        .env_remove("RUST_LOG")
        .arg("--storage-backend")
        .arg("memory")
        .arg("--cache-backend")
        .arg("memory");
    cmd
}

#[test]
fn create_prints_the_new_record() {
    let assert = postkeep()
        .args(["create", "--user", "alice", "hello world"])
        .assert()
        .success();

    let output: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("stdout is json");
    assert_eq!(output["user_id"], "alice");
    assert_eq!(output["data"], "hello world");
    assert!(output["post_id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(output["created_at"], output["updated_at"]);
}

#[test]
fn list_of_unknown_user_is_empty() {
    let assert = postkeep()
        .args(["list", "--user", "nobody"])
        .assert()
        .success();

    let output: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("stdout is json");
    assert_eq!(output, Value::Array(Vec::new()));
}

#[test]
fn read_of_missing_post_fails_with_not_found() {
    postkeep()
        .args(["read", "--user", "alice", "--post", "missing"])
        .assert()
        .code(3)
        .stderr(contains("post does not exist"));
}

#[test]
fn delete_of_missing_post_succeeds() {
    postkeep()
        .args(["delete", "--user", "alice", "--post", "missing"])
        .assert()
        .success()
        .stdout(contains("\"deleted\": true"));
}

#[test]
fn unknown_backend_fails_fast() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("postkeep"));
    cmd.args(["--storage-backend", "cassandra", "list", "--user", "alice"])
        .assert()
        .code(2)
        .stderr(contains("storage.backend"));
}
