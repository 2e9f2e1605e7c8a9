mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;
use serde_json::Value as JsonValue;

const PEOPLE: &str = "id,name,active\n1,Ann,true\n2,Bob,false\n";

fn tabular_import(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("tabular-import").expect("binary present");
    cmd.current_dir(workspace.path()).env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> JsonValue {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn probe_prints_plan_and_saves_yaml() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);
    let plan_path = workspace.path().join("people-plan.yml");

    tabular_import(&workspace)
        .args(["probe", "-i", input.to_str().unwrap(), "-o", plan_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("column"))
        .stdout(contains("INTEGER"))
        .stdout(contains("BOOLEAN"))
        .stdout(contains("VARCHAR(255)"));

    let yaml = std::fs::read_to_string(&plan_path).expect("plan written");
    assert!(yaml.contains("plan_version:"));
    assert!(yaml.contains("name: id"));
    assert!(yaml.contains("is_primary: true"));
}

#[test]
fn map_against_saved_plan_reports_json() {
    let workspace = TestWorkspace::new();
    let reference = workspace.write("people.csv", PEOPLE);
    let plan_path = workspace.path().join("people-plan.yml");
    tabular_import(&workspace)
        .args(["probe", "-i", reference.to_str().unwrap(), "-o", plan_path.to_str().unwrap()])
        .assert()
        .success();

    let upload = workspace.write("staff.csv", "ID,Emp Name,Active\n7,Cy,yes\n8,Di,no\n");
    let output = tabular_import(&workspace)
        .args([
            "map",
            "-i",
            upload.to_str().unwrap(),
            "--table",
            "people",
            "--target",
            plan_path.to_str().unwrap(),
            "--json",
        ])
        .output()
        .expect("run map");
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["matched"], 3);
    assert_eq!(report["total"], 3);
    assert_eq!(report["recommendation"], "ready");
    assert_eq!(report["mappings"][1]["targetColumn"], "name");
}

#[test]
fn dry_run_import_prints_result_json() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);

    let output = tabular_import(&workspace)
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "--table",
            "people",
            "--dry-run",
            "--batch-size",
            "1",
        ])
        .output()
        .expect("run import");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result = stdout_json(&output);
    assert_eq!(result["status"], "completed");
    assert_eq!(result["totalRows"], 2);
    assert_eq!(result["successRows"], 2);
    assert_eq!(result["errorRows"], 0);
    assert_eq!(result["success"], true);
    assert!(input.exists());
}

#[test]
fn remove_source_deletes_upload() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", PEOPLE);

    tabular_import(&workspace)
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "--table",
            "people",
            "--dry-run",
            "--remove-source",
        ])
        .assert()
        .success()
        .stdout(contains("\"successRows\": 2"));
    assert!(!input.exists());
}

#[test]
fn out_of_range_batch_size_fails() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);

    for batch_size in ["0", "-1", "10001"] {
        tabular_import(&workspace)
            .args([
                "import",
                "-i",
                input.to_str().unwrap(),
                "--table",
                "people",
                "--dry-run",
                "--batch-size",
                batch_size,
            ])
            .assert()
            .failure()
            .stderr(contains("batch_size"));
    }
}

#[test]
fn row_error_aborts_with_failure_status() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("dupes.csv", "id,name\n1,Ann\n1,Bob\n2,Cy\n");

    let output = tabular_import(&workspace)
        .args(["import", "-i", input.to_str().unwrap(), "--table", "people", "--dry-run"])
        .output()
        .expect("run import");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Import aborted at row 2"), "{stderr}");

    let result = stdout_json(&output);
    assert_eq!(result["status"], "aborted");
    assert_eq!(result["successRows"], 1);
    assert_eq!(result["errorRows"], 1);
}

#[test]
fn skip_row_errors_reports_partial_success() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("dupes.csv", "id,name\n1,Ann\n1,Bob\n2,Cy\n");

    let output = tabular_import(&workspace)
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "--table",
            "people",
            "--dry-run",
            "--skip-row-errors",
        ])
        .output()
        .expect("run import");
    assert!(output.status.success());

    let result = stdout_json(&output);
    assert_eq!(result["totalRows"], 3);
    assert_eq!(result["successRows"], 2);
    assert_eq!(result["partialSuccess"], true);
    assert_eq!(result["errors"][0]["row"], 2);
}

#[test]
fn import_without_tenant_or_dry_run_is_a_usage_error() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);

    tabular_import(&workspace)
        .args(["import", "-i", input.to_str().unwrap(), "--table", "people"])
        .assert()
        .failure()
        .stderr(contains("--tenant"));
}

#[test]
fn config_defaults_apply() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE);
    workspace.write("tabular-import.yml", "defaults:\n  batch_size: 0\n");

    tabular_import(&workspace)
        .args(["import", "-i", input.to_str().unwrap(), "--table", "people", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("batch_size"));
}
