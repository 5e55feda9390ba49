//! Init command - write a default ccloop.toml

use anyhow::{Context, Result};
use ccloop::config::CONFIG_FILE_NAME;
use console::style;
use std::path::Path;

const TEMPLATE: &str = r#"# ccloop configuration

[project]
# Directory holding the source code, relative to this file
code_dir = "src"

[analysis]
# Extensions of files to measure
extensions = ["js", "jsx", "mjs", "cjs", "ts", "tsx", "py", "rs", "go", "java", "c", "h", "cpp", "cc", "cxx", "hpp", "hh", "hxx"]
# Gitignore-style globs skipped by scans
exclude = ["node_modules", "bower_components", "vendor", "dist", "coverage", "*.min.js", "*.bundle.js"]
# Code fragments are parsed as if they were this file
snippet_name = "Snippet.js"

[lint]
command = "npx eslint ."
# {report} is replaced with report_file; leave it out to read stdout
report_args = "--format json -o {report}"
report_file = "eslint-output.json"
timeout_secs = 30
autofix_command = "npx eslint --stdin --format json --fix-dry-run"

[tests]
command = "npx mocha"
report_args = "--reporter json --reporter-option output={report}"
report_file = "mocha-output.json"
timeout_secs = 30
# Capture group 1 is the line number in a failure's stack trace
line_pattern = '\.js:(\d+):\d+'

[sandbox]
# The copy lives next to the project as <project><suffix>
suffix = "-copy"
# Run once in every fresh copy
# prepare_command = "npm ci"
prepare_timeout_secs = 600

[verification]
# Repairs each gate may request per function
max_repairs_per_stage = 1
"#;

/// Run the init command
pub fn run(root: &Path) -> Result<()> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        println!(
            "{} Already initialized: {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    std::fs::write(&config_path, TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );
    println!(
        "\n  Next: {} to find the most complex functions",
        style("ccloop scan --top 10").bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccloop::config::LoopConfig;

    #[test]
    fn test_template_matches_defaults() {
        let parsed: LoopConfig = toml::from_str(TEMPLATE).unwrap();
        let defaults = LoopConfig::default();

        assert_eq!(parsed.project.code_dir, defaults.project.code_dir);
        assert_eq!(parsed.analysis.extensions, defaults.analysis.extensions);
        assert_eq!(parsed.analysis.exclude, defaults.analysis.exclude);
        assert_eq!(parsed.analysis.snippet_name, defaults.analysis.snippet_name);
        assert_eq!(parsed.lint.command, defaults.lint.command);
        assert_eq!(parsed.lint.report_args, defaults.lint.report_args);
        assert_eq!(parsed.lint.autofix_command, defaults.lint.autofix_command);
        assert_eq!(parsed.tests.report_args, defaults.tests.report_args);
        assert_eq!(parsed.tests.line_pattern, defaults.tests.line_pattern);
        assert_eq!(parsed.sandbox.prepare_command, None);
        assert_eq!(
            parsed.verification.max_repairs_per_stage,
            defaults.verification.max_repairs_per_stage
        );
    }
}
