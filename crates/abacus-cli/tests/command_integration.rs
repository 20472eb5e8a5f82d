//! Integration tests for CLI commands.
//!
//! Each test writes a small policy into a temporary project directory and
//! runs the binary against it end-to-end.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const POLICY: &str = "\
# document store
userAttrib(alice, role=manager)
userAttrib(bob, role=clerk)
resourceAttrib(doc1, owner=alice)
resourceAttrib(doc2, owner=bob)
rule(role[{manager}]; ; {view}; uid=owner)
rule(role[{clerk}]; ; {view archive}; )
";

const EXPECTED_ACL: &str = "\
alice, doc1, view
bob, doc1, archive
bob, doc1, view
bob, doc2, archive
bob, doc2, view
";

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("policy.abac"), POLICY).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn policy(&self) -> String {
        self.path("policy.abac").to_str().unwrap().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("abacus").unwrap();
        cmd.arg("--project")
            .arg(self.dir.path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ============================================================================
// Decisions
// ============================================================================

#[test]
fn check_permits_owner_manager() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "text", "check", &project.policy(), "alice", "doc1", "view"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Permit\n"))
        .stdout(predicate::str::contains("Matched rule #0"));
}

#[test]
fn check_denies_and_still_exits_zero() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "text", "check", &project.policy(), "alice", "doc2", "view"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Deny\n"))
        .stdout(predicate::str::contains("No rule permits"));
}

#[test]
fn check_json_reports_matched_rule() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["--format", "json", "check", &project.policy(), "bob", "doc1", "archive"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["effect"], "Permit");
    assert_eq!(value["matched_rule"], 1);
    assert_eq!(value["subject"], "bob");
}

#[test]
fn check_unknown_subject_is_denied() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["--format", "json", "check", &project.policy(), "mallory", "doc1", "view"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["effect"], "Deny");
    assert!(value["matched_rule"].is_null());
}

#[test]
fn eval_decides_lines_in_order() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "text", "eval", &project.policy(), "-"])
        .write_stdin("alice,doc1,view\n# comment\n\nalice,doc1,archive\nbob, doc2, archive\n")
        .assert()
        .success()
        .stdout("1: Permit\n4: Deny\n5: Permit\n");
}

#[test]
fn eval_reports_malformed_lines_and_fails() {
    let project = Project::new();
    let requests = project.write("requests.txt", "alice,doc1,view\nalice,doc1\nbob,doc2,view\n");
    project
        .cmd()
        .args(["--format", "text", "eval", &project.policy()])
        .arg(&requests)
        .assert()
        .failure()
        .stdout("1: Permit\n3: Permit\n")
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("1 of 3 request lines were malformed"));
}

#[test]
fn eval_json_includes_errors() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["--format", "json", "eval", &project.policy()])
        .write_stdin("alice,,view\nalice,doc1,view\n")
        .output()
        .unwrap();
    assert!(!output.status.success());

    let value = json_stdout(&output);
    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0]["error"].is_string());
    assert_eq!(entries[1]["effect"], "Permit");
}

#[test]
fn query_by_subject_lists_permits() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "text", "query", &project.policy(), "--subject", "bob"])
        .assert()
        .success()
        .stdout("bob, doc1, archive\nbob, doc1, view\nbob, doc2, archive\nbob, doc2, view\n");
}

#[test]
fn query_by_object_and_action() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["--format", "json", "query", &project.policy(), "-o", "doc1", "-a", "view"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = json_stdout(&output);
    let subjects: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|triple| triple["subject"].as_str().unwrap())
        .collect();
    assert_eq!(subjects, ["alice", "bob"]);
}

#[test]
fn query_rejects_unknown_names() {
    let project = Project::new();
    project
        .cmd()
        .args(["query", &project.policy(), "--subject", "mallory"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("user 'mallory' does not exist"));
    project
        .cmd()
        .args(["query", &project.policy(), "--action", "delete"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("action 'delete'"));
}

// ============================================================================
// Analytics
// ============================================================================

#[test]
fn acl_lists_every_permission() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "text", "acl", &project.policy()])
        .assert()
        .success()
        .stdout(EXPECTED_ACL);
}

#[test]
fn acl_strategies_agree() {
    let project = Project::new();
    for args in [
        ["--strategy", "brute-force"],
        ["--strategy", "indexed"],
        ["--sequential", "--strategy=indexed"],
    ] {
        project
            .cmd()
            .args(["--format", "text", "acl", &project.policy()])
            .args(args)
            .assert()
            .success()
            .stdout(EXPECTED_ACL);
    }
}

#[test]
fn acl_writes_output_file() {
    let project = Project::new();
    let output = project.path("acl.txt");
    project
        .cmd()
        .args(["acl", &project.policy(), "--output"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote 5 permissions"));

    assert_eq!(fs::read_to_string(output).unwrap(), EXPECTED_ACL);
}

#[test]
fn diff_of_identical_acls_succeeds() {
    let project = Project::new();
    let expected = project.write("expected.txt", EXPECTED_ACL);
    let actual = project.path("actual.txt");
    project
        .cmd()
        .args(["acl", &project.policy(), "--output"])
        .arg(&actual)
        .assert()
        .success();

    project
        .cmd()
        .arg("diff")
        .arg(&expected)
        .arg(&actual)
        .assert()
        .success()
        .stderr(predicate::str::contains("ACLs match"));
}

#[test]
fn diff_reports_missing_and_extra_permissions() {
    let project = Project::new();
    let expected = project.write("expected.txt", "alice, doc1, view\nalice, doc2, view\n");
    let actual = project.write("actual.txt", "alice, doc1, view\nbob, doc1, view\n");
    project
        .cmd()
        .args(["--format", "text", "diff"])
        .arg(&expected)
        .arg(&actual)
        .assert()
        .failure()
        .stdout("- alice, doc2, view\n+ bob, doc1, view\n")
        .stderr(predicate::str::contains("ACLs differ in 2 permissions"));
}

#[test]
fn resources_ranks_by_access_count() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["--format", "json", "resources", &project.policy(), "--top", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["most_accessed"][0]["object"], "doc1");
    assert_eq!(value["most_accessed"][0]["count"], 3);
    assert_eq!(value["least_accessed"][0]["object"], "doc2");
    assert_eq!(value["least_accessed"][0]["count"], 2);
}

#[test]
fn stats_counts_permissions_per_rule() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["--format", "json", "stats", &project.policy()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["subjects"], 2);
    assert_eq!(value["objects"], 2);
    assert_eq!(value["rules"], 2);
    assert_eq!(value["permissions"], 5);
    assert_eq!(value["rule_permissions"], serde_json::json!([1, 4]));
}

#[test]
fn coverage_counts_attribute_presence() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "text", "coverage", &project.policy()])
        .assert()
        .success()
        .stdout(predicate::str::contains("rule #0 matches=1"))
        .stdout(predicate::str::contains("user.role=1"))
        .stdout(predicate::str::contains("resource.owner=1"))
        .stdout(predicate::str::contains("rule #1 matches=4"));
}

#[test]
fn table_output_renders_rows() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "table", "acl", &project.policy()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject"))
        .stdout(predicate::str::contains("(5 permissions)"));
}

// ============================================================================
// Policy Files
// ============================================================================

#[test]
fn parse_errors_report_line_number() {
    let project = Project::new();
    let broken = project.write(
        "broken.abac",
        "userAttrib(alice, role=manager)\nrule(role[{manager}]; {view})\n",
    );
    project
        .cmd()
        .args(["check"])
        .arg(&broken)
        .args(["alice", "doc1", "view"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("expected 4"));
}

#[test]
fn trailing_text_after_statement_is_rejected() {
    let project = Project::new();
    let broken = project.write("trailing.abac", "userAttrib(alice) extra\n");
    project
        .cmd()
        .arg("fmt")
        .arg(&broken)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1"))
        .stderr(predicate::str::contains("`extra`"));
}

#[test]
fn fmt_keeps_multi_word_actions_whole() {
    let project = Project::new();
    let policy = project.write(
        "spaced.abac",
        "userAttrib(alice)\nresourceAttrib(doc1)\nrule(; ; read write; )\n",
    );
    let output = project.cmd().arg("fmt").arg(&policy).output().unwrap();
    assert!(output.status.success());
    let canonical = String::from_utf8(output.stdout).unwrap();
    assert!(canonical.contains("rule(; ; read write; )"));

    let formatted = project.write("spaced.fmt.abac", &canonical);
    project
        .cmd()
        .args(["--format", "text", "acl"])
        .arg(&formatted)
        .assert()
        .success()
        .stdout("alice, doc1, read write\n");
}

#[test]
fn export_writes_json_document() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["export", &project.policy()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = json_stdout(&output);
    assert_eq!(value["subjects"].as_array().unwrap().len(), 2);
    assert_eq!(value["objects"].as_array().unwrap().len(), 2);
    assert_eq!(value["rules"].as_array().unwrap().len(), 2);
}

#[test]
fn fmt_output_parses_to_same_decisions() {
    let project = Project::new();
    let output = project
        .cmd()
        .args(["fmt", &project.policy()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let canonical = String::from_utf8(output.stdout).unwrap();
    assert!(canonical.contains("userAttrib(alice, role=manager)"));
    assert!(!canonical.contains('#'));
    let formatted = project.write("formatted.abac", &canonical);

    project
        .cmd()
        .args(["--format", "text", "acl"])
        .arg(&formatted)
        .assert()
        .success()
        .stdout(EXPECTED_ACL);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn config_show_uses_defaults() {
    let project = Project::new();
    project
        .cmd()
        .args(["--format", "text", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strategy = \"indexed\""))
        .stdout(predicate::str::contains("top = 10"));
}

#[test]
fn project_config_sets_output_format() {
    let project = Project::new();
    project.write("abacus.toml", "[output]\nformat = \"text\"\n");
    project
        .cmd()
        .args(["check", &project.policy(), "alice", "doc1", "view"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Permit\n"));
}

#[test]
fn environment_overrides_project_config() {
    let project = Project::new();
    project.write("abacus.toml", "[analytics]\ntop = 5\n");
    let output = project
        .cmd()
        .env("ABACUS_ANALYTICS_TOP", "3")
        .args(["--format", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    assert_eq!(json_stdout(&output)["analytics"]["top"], 3);
}

#[test]
fn invalid_config_is_rejected() {
    let project = Project::new();
    project.write("abacus.toml", "[log]\nlevel = \"loud\"\n");
    project
        .cmd()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loud"));
}
