use std::fs;
use std::process::Command;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sensus_cli"))
}

#[test]
fn without_arguments_prints_ping_and_version() {
    let output = cli().output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(output.status.success());
    assert!(stdout.contains("sensus_core ping=pong"));
    assert!(stdout.contains("sensus_core version="));
}

#[test]
fn session_check_writes_log_file_into_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sensus-persistence.json");
    fs::write(
        &config_path,
        r#"{
            "database_path": "cli.db",
            "schema": [{ "version": 3, "sql": "CREATE TABLE marker (id INTEGER PRIMARY KEY);" }]
        }"#,
    )
    .unwrap();
    let log_dir = dir.path().join("logs");

    let output = cli()
        .arg(&config_path)
        .arg(&log_dir)
        .env_remove("SENSUS_LOG_LEVEL")
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(output.status.success());
    assert!(stdout.contains("sensus_core session=ok schema_version=3"));
    let log_files: Vec<_> = fs::read_dir(&log_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("sensus"))
        .collect();
    assert!(!log_files.is_empty());
}

#[test]
fn unreadable_config_fails_with_error_code() {
    let dir = tempfile::tempdir().unwrap();

    let output = cli()
        .arg(dir.path().join("missing.json"))
        .output()
        .unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();

    assert!(!output.status.success());
    assert!(stderr.contains("code=configuration"));
}
