//! Lint and test commands - run one tool in place and list what it found

use super::display_path;
use anyhow::Result;
use ccloop::config::LoopConfig;
use ccloop::tools::{LintRunner, TestRunner};
use console::style;
use std::path::Path;

pub fn run_lint(root: &Path, config: &LoopConfig) -> Result<()> {
    let findings = LintRunner::from_config(&config.lint).run(root)?;
    if findings.is_empty() {
        println!("{} No lint findings", style("✓").green());
        return Ok(());
    }

    for finding in &findings {
        println!(
            "{}:{} {} {}",
            display_path(root, &finding.file),
            finding.target_line,
            style(finding.rule_id.as_deref().unwrap_or("fatal")).yellow(),
            finding.message
        );
        if !finding.offending_source_line.trim().is_empty() {
            println!("    {}", style(finding.offending_source_line.trim()).dim());
        }
    }
    println!("\n{} {} finding(s)", style("✗").red(), findings.len());
    Ok(())
}

pub fn run_tests(root: &Path, config: &LoopConfig) -> Result<()> {
    let failures = TestRunner::from_config(&config.tests)?.run(root)?;
    if failures.is_empty() {
        println!("{} All tests passed", style("✓").green());
        return Ok(());
    }

    for failure in &failures {
        let location = match failure.target_line {
            Some(line) => format!("{}:{}", display_path(root, &failure.test_file), line),
            None => display_path(root, &failure.test_file),
        };
        println!(
            "{} {}",
            style(&failure.expectation_title).bold(),
            style(location).dim()
        );
        if let Some(first) = failure.message_and_stack.lines().next() {
            println!("    {}", first);
        }
    }
    println!("\n{} {} failing test(s)", style("✗").red(), failures.len());
    Ok(())
}
