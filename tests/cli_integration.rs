//! CLI integration tests for specforge.
//!
//! Each test writes a small spec directory and drives the binary against it.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const TOOLS: &str = r#"[
    {
        "Identifier": "org.test.base",
        "Type": "Tool",
        "Name": "Base Tool",
        "CommandLine": "/bin/echo [options] [input]",
        "RuleName": "Echo [input]",
        "Options": [
            {"Name": "BASE_LEVEL", "Type": "String", "DefaultValue": "1", "CommandLineArgs": ["-l", "$(value)"]}
        ]
    },
    {
        "Identifier": "org.test.echo",
        "Type": "Tool",
        "BasedOn": "org.test.base",
        "Options": [
            {"Name": "VERBOSE", "Type": "Boolean", "DefaultValue": "NO", "CommandLineFlag": "-v"}
        ]
    },
    {
        "Identifier": "public.c",
        "Type": "FileType",
        "Extensions": ["c"]
    }
]"#;

/// Get the specforge binary command, isolated from the user's config.
fn specforge(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("specforge").unwrap();
    cmd.env_remove("SPECFORGE_SPEC_PATH")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"));
    cmd
}

/// A project directory with one spec file under `specs/`.
fn project(specs: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("specs")).unwrap();
    fs::write(tmp.path().join("specs/Tools.xcspec"), specs).unwrap();
    tmp
}

// ============================================================================
// specforge list
// ============================================================================

#[test]
fn test_list_shows_registered_specs() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "list"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("org.test.base"))
        .stdout(predicate::str::contains("org.test.echo"))
        .stdout(predicate::str::contains("(based on org.test.base)"))
        .stdout(predicate::str::contains("public.c"));
}

#[test]
fn test_list_filters_by_type() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "list", "--type", "file-type"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("public.c"))
        .stdout(predicate::str::contains("org.test.echo").not());
}

#[test]
fn test_list_json() {
    let tmp = project(TOOLS);

    let output = specforge(tmp.path())
        .args(["--spec-path", "specs", "list", "--json"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let specs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let identifiers: Vec<&str> = specs
        .as_array()
        .unwrap()
        .iter()
        .map(|spec| spec["identifier"].as_str().unwrap())
        .collect();
    assert_eq!(identifiers, ["org.test.base", "org.test.echo", "public.c"]);
}

#[test]
fn test_spec_path_from_environment() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .env("SPECFORGE_SPEC_PATH", tmp.path().join("specs"))
        .arg("list")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("org.test.echo"));
}

#[test]
fn test_list_without_search_paths_fails() {
    let tmp = TempDir::new().unwrap();

    specforge(tmp.path())
        .arg("list")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no spec search paths configured"))
        .stderr(predicate::str::contains("--spec-path"));
}

#[test]
fn test_project_config_search_paths() {
    let tmp = project(TOOLS);
    fs::create_dir_all(tmp.path().join(".specforge")).unwrap();
    fs::write(
        tmp.path().join(".specforge/config.toml"),
        "search_paths = [{ path = \"specs\" }]\n",
    )
    .unwrap();

    specforge(tmp.path())
        .arg("list")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("org.test.base"));
}

// ============================================================================
// specforge show
// ============================================================================

#[test]
fn test_show_flattens_inherited_options() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "show", "org.test.echo"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("org.test.echo (Tool)"))
        .stdout(predicate::str::contains("based on: :org.test.base"))
        .stdout(predicate::str::contains("BASE_LEVEL"))
        .stdout(predicate::str::contains("# from: org.test.base"))
        .stdout(predicate::str::contains("VERBOSE"));
}

#[test]
fn test_show_unknown_spec_fails() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "show", "org.test.missing"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("spec `org.test.missing` not found"))
        .stderr(predicate::str::contains("specforge list"));
}

// ============================================================================
// specforge check
// ============================================================================

#[test]
fn test_check_succeeds_on_valid_specs() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "check"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("3 loaded, 0 failed"));
}

#[test]
fn test_check_reports_broken_specs() {
    let tmp = project(
        r#"[
            {"Identifier": "org.test.ok", "Type": "Tool", "CommandLine": "/bin/true", "RuleName": "Ok"},
            {"Identifier": "org.test.broken", "Type": "Tool", "RuleName": "Broken"}
        ]"#,
    );

    specforge(tmp.path())
        .args(["--spec-path", "specs", "check", "--no-color"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 loaded, 1 failed"))
        .stderr(predicate::str::contains("missing required 'CommandLine' key"));
}

// ============================================================================
// specforge args
// ============================================================================

#[test]
fn test_args_prints_command_line() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "args", "org.test.echo", "-i", "main.c"])
        .args(["--set", "VERBOSE=YES", "--set", "BASE_LEVEL=2"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("rule: Echo main.c"))
        .stdout(predicate::str::contains("command: /bin/echo -l 2 -v main.c"));
}

#[test]
fn test_args_settings_file_and_json() {
    let tmp = project(TOOLS);
    fs::write(tmp.path().join("settings.toml"), "BASE_LEVEL = \"7\"\n").unwrap();

    let output = specforge(tmp.path())
        .args(["--spec-path", "specs", "args", "org.test.echo", "-i", "main.c"])
        .args(["--settings", "settings.toml", "--json"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let tasks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let task = &tasks[0];
    assert_eq!(task["tool_identifier"], "org.test.echo");
    assert_eq!(
        task["command_line"],
        serde_json::json!(["/bin/echo", "-l", "7", "main.c"])
    );
    assert_eq!(task["signature"].as_str().unwrap().len(), 64);
}

#[test]
fn test_args_rejects_malformed_setting() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "args", "org.test.echo", "-i", "main.c", "--set", "NOPE"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected NAME=VALUE"));
}

#[test]
fn test_args_rejects_non_tool() {
    let tmp = project(TOOLS);

    specforge(tmp.path())
        .args(["--spec-path", "specs", "args", "public.c", "-i", "main.c"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot construct a task for `public.c`"));
}

// ============================================================================
// specforge completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();

    specforge(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("specforge"));
}
