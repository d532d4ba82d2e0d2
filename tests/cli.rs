mod common;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::tempdir;

use common::{write_file, write_schema_file};

#[test]
fn catalog_lists_report_types_with_aliases() {
    let dir = tempdir().expect("temp dir");
    write_schema_file(
        dir.path(),
        "loans.yml",
        "loan_report",
        Some("Loan Report"),
        &[("Policy Id", "int64")],
    );

    Command::cargo_bin("report-intake")
        .expect("binary exists")
        .args(["catalog", "-s", dir.path().to_str().unwrap()])
        .env("ALLOWED_REPORT_TYPES", "loan_report")
        .assert()
        .success()
        .stdout(contains("loan_report").and(contains("Loan Report")));
}

#[test]
fn unset_allow_list_makes_nothing_selectable() {
    let dir = tempdir().expect("temp dir");
    write_schema_file(dir.path(), "loans.yml", "loan_report", None, &[("Id", "int64")]);

    Command::cargo_bin("report-intake")
        .expect("binary exists")
        .args(["catalog", "-s", dir.path().to_str().unwrap()])
        .env_remove("ALLOWED_REPORT_TYPES")
        .assert()
        .failure()
        .stderr(contains("No selectable report types"));
}

#[test]
fn catalog_honors_the_allow_list_env() {
    let dir = tempdir().expect("temp dir");
    write_schema_file(dir.path(), "loans.yml", "loan_report", None, &[("Id", "int64")]);
    write_schema_file(dir.path(), "claims.yml", "claim_report", None, &[("Id", "int64")]);

    Command::cargo_bin("report-intake")
        .expect("binary exists")
        .args(["catalog", "-s", dir.path().to_str().unwrap()])
        .env("ALLOWED_REPORT_TYPES", "claim_report")
        .assert()
        .success()
        .stdout(contains("claim_report").and(contains("loan_report").not()));
}

#[test]
fn validate_succeeds_for_a_clean_upload_without_tests() {
    let dir = tempdir().expect("temp dir");
    write_schema_file(
        dir.path(),
        "loans.yml",
        "loan_report",
        None,
        &[("Policy Id", "int64"), ("Premium", "decimal(10,2)")],
    );
    let upload = dir.path().join("upload.csv");
    write_file(&upload, "Policy Id,Premium\n1001,250.50\n");

    Command::cargo_bin("report-intake")
        .expect("binary exists")
        .args([
            "validate",
            "-s",
            dir.path().to_str().unwrap(),
            "-i",
            upload.to_str().unwrap(),
            "-r",
            "loan_report",
            "--no-tests",
        ])
        .env("ALLOWED_REPORT_TYPES", "loan_report")
        .assert()
        .success()
        .stdout(contains("Validation succeeded for report 'loan_report'"));
}

#[test]
fn validate_exits_nonzero_on_a_cast_failure() {
    let dir = tempdir().expect("temp dir");
    write_schema_file(
        dir.path(),
        "loans.yml",
        "loan_report",
        None,
        &[("Policy Id", "int64"), ("Premium", "decimal(10,2)")],
    );
    let upload = dir.path().join("upload.csv");
    write_file(&upload, "Policy Id,Premium\n1001,abc\n");

    Command::cargo_bin("report-intake")
        .expect("binary exists")
        .args([
            "validate",
            "-s",
            dir.path().to_str().unwrap(),
            "-i",
            upload.to_str().unwrap(),
            "-r",
            "loan_report",
            "--no-tests",
        ])
        .env("ALLOWED_REPORT_TYPES", "loan_report")
        .assert()
        .failure()
        .stderr(contains("coercion error").and(contains("Premium")));
}

#[test]
fn preview_shows_detected_properties() {
    let dir = tempdir().expect("temp dir");
    let upload = dir.path().join("upload.csv");
    write_file(&upload, "id;amount\n1;2.5\n");

    Command::cargo_bin("report-intake")
        .expect("binary exists")
        .args(["preview", "-i", upload.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Delimiter").and(contains(";")).and(contains("amount")));
}
