//! CLI contract tests driving the built binary

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

fn ccloop_bin() -> &'static str {
    env!("CARGO_BIN_EXE_ccloop")
}

fn setup_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src/lib")).unwrap();
    std::fs::create_dir_all(dir.path().join("src/node_modules/dep")).unwrap();
    std::fs::write(
        dir.path().join("src/main.js"),
        r#"function simple() {
  return 1;
}

function branchy(a, b) {
  if (a && b) {
    return 1;
  }
  for (let i = 0; i < a; i++) {
    if (i % 2) continue;
  }
  return a ? b : 0;
}
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("src/lib/util.py"),
        "def pick(x):\n    if x:\n        return 1\n    return 2\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("src/node_modules/dep/index.js"),
        "function vendored(a) { if (a) { if (a > 1) { return 2; } } return 0; }\n",
    )
    .unwrap();
    dir
}

fn run(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(ccloop_bin())
        .arg("--path")
        .arg(dir)
        .args(args)
        .output()
        .expect("Failed to run ccloop");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn test_scan_json_ranks_functions() {
    let dir = setup_project();
    let (code, stdout, stderr) = run(dir.path(), &["scan", "--format", "json"]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let report: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON");
    let functions = report["functions"].as_array().unwrap();
    let names: Vec<&str> = functions
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["branchy", "pick", "simple"]);
    assert_eq!(functions[0]["complexity"], 6);
    assert_eq!(report["summary"]["function_count"], 3);
    assert_eq!(report["summary"]["max_complexity"], 6);
}

#[test]
fn test_scan_top_limits_output() {
    let dir = setup_project();
    let (code, stdout, _) = run(dir.path(), &["scan", "--top", "1", "--format", "json"]);
    assert_eq!(code, 0);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["functions"].as_array().unwrap().len(), 1);
    // The summary still covers the whole scan
    assert_eq!(report["summary"]["function_count"], 3);
}

#[test]
fn test_scan_text_output() {
    let dir = setup_project();
    let (code, stdout, _) = run(dir.path(), &["scan"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("branchy"));
    assert!(stdout.contains("main.js:5-13"));
    assert!(!stdout.contains("vendored"));
}

#[test]
fn test_snippet_from_stdin() {
    let dir = setup_project();
    let mut child = Command::new(ccloop_bin())
        .arg("--path")
        .arg(dir.path())
        .args(["snippet", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"function a(x) { return x ? 1 : 2; }\nfunction b(x) { if (x) { if (x > 2) { if (x > 3) return 1; } } return 0; }\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "4");
}

#[test]
fn test_snippet_without_function_fails() {
    let dir = setup_project();
    let snippet = dir.path().join("frag.js");
    std::fs::write(&snippet, "const x = 1;\n").unwrap();
    let (code, _, stderr) = run(dir.path(), &["snippet", snippet.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no analyzable function"));
}

#[test]
fn test_init_writes_config_once() {
    let dir = setup_project();
    let (code, stdout, _) = run(dir.path(), &["init"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Created"));
    assert!(dir.path().join("ccloop.toml").exists());

    let (code, stdout, _) = run(dir.path(), &["init"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Already initialized"));
}

#[test]
fn test_copy_uses_configured_hook() {
    let dir = setup_project();
    let project = dir.path().join("proj");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::write(project.join("index.js"), "function f() {}\n").unwrap();
    std::fs::write(
        project.join("ccloop.toml"),
        "[sandbox]\nprepare_command = \"touch prepared\"\nprepare_timeout_secs = 10\n",
    )
    .unwrap();

    let (code, stdout, stderr) = run(&project, &["copy"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("Sandbox ready"));
    let sandbox = dir.path().join("proj-copy");
    assert!(sandbox.join("index.js").exists());
    assert!(sandbox.join("prepared").exists());
}

#[test]
fn test_lint_with_emulated_tool() {
    let dir = setup_project();
    std::fs::write(
        dir.path().join("ccloop.toml"),
        r#"
[lint]
command = "printf '[{\"filePath\":\"src/main.js\",\"messages\":[{\"ruleId\":\"curly\",\"message\":\"Expected { after if\",\"line\":10}]}]' > eslint-output.json; exit 1;"
report_args = ""
timeout_secs = 10
"#,
    )
    .unwrap();

    let (code, stdout, stderr) = run(dir.path(), &["lint"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("src/main.js:10"));
    assert!(stdout.contains("curly"));
    assert!(stdout.contains("if (i % 2) continue;"));
    assert!(!dir.path().join("eslint-output.json").exists());
}

#[test]
fn test_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run(&dir.path().join("absent"), &["scan"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Path does not exist"));
}
