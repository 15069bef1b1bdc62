use assert_cmd::Command;
use predicates::prelude::*;

fn write_policy(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("policy.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn gate() -> Command {
    Command::cargo_bin("gate").unwrap()
}

// S1: policy allows `echo` with `args: ['*']`; request under STRICT allows
// and executes.
#[test]
fn s1_allow_executes_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(
        dir.path(),
        "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
    );
    gate()
        .arg("echo")
        .arg("t1")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"verdict\":\"ALLOW\""));
}

// S2: policy miss under STRICT stops with no token issued, exit 1.
#[test]
fn s2_strict_miss_stops_and_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(
        dir.path(),
        "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
    );
    gate()
        .arg("rm")
        .arg("-rf")
        .arg("/")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"verdict\":\"STOP\""));
}

// S3: policy miss under PERMISSIVE holds; default fail_on_hold=true exits
// nonzero even though a HOLD token was issued.
#[test]
fn s3_permissive_miss_holds() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(
        dir.path(),
        "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
    );
    gate()
        .arg("rm")
        .arg("-rf")
        .arg("/")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .arg("--gate-mode")
        .arg("PERMISSIVE")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"verdict\":\"HOLD\""));
}

#[test]
fn permissive_miss_with_no_fail_on_hold_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(
        dir.path(),
        "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
    );
    gate()
        .arg("rm")
        .arg("-rf")
        .arg("/")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .arg("--gate-mode")
        .arg("PERMISSIVE")
        .arg("--no-fail-on-hold")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"verdict\":\"HOLD\""));
}

// S7: policy lacks `true`; PERMISSIVE + allow_with_audit upgrades the miss
// to an audited ALLOW.
#[test]
fn s7_audited_permit_allows_and_executes() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(dir.path(), "default = \"DENY\"\n");
    gate()
        .arg("true")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .arg("--gate-mode")
        .arg("PERMISSIVE")
        .arg("--allow-with-audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"verdict\":\"ALLOW\""));
}

#[test]
fn shell_metacharacters_in_command_are_rejected_before_policy_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(dir.path(), "default = \"ALLOW\"\n");
    gate()
        .arg("echo;rm")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("SHELL_STRING_REJECTED"));
}

#[test]
fn admin_scope_stops_outright_under_strict() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(
        dir.path(),
        "default = \"DENY\"\n[[rules]]\ncommand = \"reboot\"\nargs = [\"*\"]\nscope = \"admin\"\n",
    );
    gate()
        .arg("reboot")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("SCOPE_ELEVATION_STOP"));
}

#[test]
fn net_scope_holds_without_a_stored_approval() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write_policy(
        dir.path(),
        "default = \"DENY\"\n[[rules]]\ncommand = \"curl\"\nargs = [\"*\"]\nscope = \"net\"\n",
    );
    gate()
        .arg("curl")
        .arg("https://example.invalid")
        .arg("--policy-path")
        .arg(&policy)
        .arg("--audit-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"verdict\":\"HOLD\""))
        .stdout(predicate::str::contains("SCOPE_ELEVATION_HOLD"));
}

#[test]
fn missing_policy_file_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    gate()
        .arg("echo")
        .arg("--policy-path")
        .arg(dir.path().join("missing.toml"))
        .arg("--audit-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"verdict\":\"STOP\""));
}
