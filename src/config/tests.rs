use super::*;
use std::fs;

#[test]
fn test_default_config() {
    let config = LoopConfig::default();
    assert_eq!(config.project.code_dir, PathBuf::from("src"));
    assert_eq!(config.lint.timeout_secs, 30);
    assert_eq!(config.tests.timeout_secs, 30);
    assert_eq!(config.sandbox.suffix, "-copy");
    assert!(config.sandbox.prepare_command.is_none());
    assert_eq!(config.verification.max_repairs_per_stage, 1);
    assert!(config.analysis.exclude.iter().any(|p| p == "node_modules"));
    assert!(config.lint.report_args.contains("{report}"));
}

#[test]
fn test_load_missing_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path());
    assert_eq!(config.lint.command, LintConfig::default().command);
}

#[test]
fn test_load_toml_partial_override() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"
[lint]
command = "npx eslint lib"
timeout_secs = 45

[sandbox]
prepare_command = "npm ci"

[verification]
max_repairs_per_stage = 2
"#,
    )
    .unwrap();

    let config = load_config(dir.path());
    assert_eq!(config.lint.command, "npx eslint lib");
    assert_eq!(config.lint.timeout_secs, 45);
    // Unset fields in a present section keep their defaults
    assert_eq!(config.lint.report_file, "eslint-output.json");
    assert_eq!(config.sandbox.prepare_command.as_deref(), Some("npm ci"));
    assert_eq!(config.verification.max_repairs_per_stage, 2);
    assert_eq!(config.tests.command, "npx mocha");
}

#[test]
fn test_load_json_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(JSON_CONFIG_FILE_NAME),
        r#"{"project": {"code_dir": "lib"}, "tests": {"line_pattern": "lib/(\\d+)"}}"#,
    )
    .unwrap();

    let config = load_config(dir.path());
    assert_eq!(config.project.code_dir, PathBuf::from("lib"));
    assert_eq!(config.tests.line_pattern, r"lib/(\d+)");
}

#[test]
fn test_invalid_toml_falls_back_to_json_then_defaults() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "[lint\ncommand = ").unwrap();

    let config = load_config(dir.path());
    assert_eq!(config.lint.command, LintConfig::default().command);

    fs::write(
        dir.path().join(JSON_CONFIG_FILE_NAME),
        r#"{"lint": {"command": "eslint ."}}"#,
    )
    .unwrap();
    let config = load_config(dir.path());
    assert_eq!(config.lint.command, "eslint .");
}
