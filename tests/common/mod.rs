#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Writes a schema catalog file declaring one source with one table.
pub fn write_schema_file(
    dir: &Path,
    file_name: &str,
    report_name: &str,
    alias: Option<&str>,
    columns: &[(&str, &str)],
) {
    let mut content = String::from("sources:\n  - name: uploaded_files\n    tables:\n");
    content.push_str(&format!("      - name: {report_name}\n"));
    if let Some(alias) = alias {
        content.push_str(&format!("        table_alias: \"{alias}\"\n"));
    }
    content.push_str("        columns:\n");
    for (name, data_type) in columns {
        content.push_str(&format!(
            "          - name: \"{name}\"\n            data_type: \"{data_type}\"\n"
        ));
    }
    fs::write(dir.join(file_name), content).expect("write schema file");
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write file");
}

/// Creates an executable shell script standing in for the external test
/// engine. It writes the given run-result artifact into the project's
/// `target/` directory when invoked.
#[cfg(unix)]
pub fn write_fake_engine(project_dir: &Path, results_json: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script_path = project_dir.join("fake-engine.sh");
    let artifact_dir = project_dir.join("target");
    fs::create_dir_all(&artifact_dir).expect("create target dir");
    let script = format!(
        "#!/bin/sh\ncat > \"{}\" <<'RESULTS'\n{}\nRESULTS\n",
        artifact_dir.join("run_results.json").display(),
        results_json
    );
    fs::write(&script_path, script).expect("write engine script");
    let mut permissions = fs::metadata(&script_path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&script_path, permissions).expect("make script executable");
    script_path
}

/// Run-result artifact with the given pass/fail statuses.
pub fn run_results_json(tests: &[(&str, &str, u64)]) -> String {
    let results: Vec<String> = tests
        .iter()
        .map(|(unique_id, status, failures)| {
            format!(
                r#"{{"status": "{status}", "unique_id": "{unique_id}", "node": {{"name": "{unique_id}"}}, "failures": {failures}, "compiled_code": "select * from staged where premium is null", "message": "Got {failures} result(s)"}}"#
            )
        })
        .collect();
    format!(r#"{{"results": [{}]}}"#, results.join(", "))
}
