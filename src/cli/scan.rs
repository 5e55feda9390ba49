//! Scan command - rank functions by complexity

use super::{code_dir, display_path};
use anyhow::{Context, Result};
use ccloop::complexity::{rank_by_complexity, summarize, ComplexityAnalyzer};
use ccloop::config::LoopConfig;
use ccloop::models::FunctionRecord;
use console::style;
use std::path::Path;

pub fn run(root: &Path, config: &LoopConfig, top: Option<usize>, format: &str) -> Result<()> {
    let dir = code_dir(root, config);
    let analyzer = ComplexityAnalyzer::from_config(&config.analysis);
    let records = analyzer
        .scan(&dir)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    let summary = summarize(&records).ok();
    let mut ranked = rank_by_complexity(&records);
    if let Some(n) = top {
        ranked.truncate(n);
    }

    if format == "json" {
        let report = serde_json::json!({
            "functions": ranked,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let Some(summary) = summary else {
        println!("{} No functions found in {}", style("!").yellow(), dir.display());
        return Ok(());
    };

    print_table(root, &ranked);
    println!(
        "\n{} functions, average complexity {:.2}, average length {:.1} lines, max {}",
        style(summary.function_count).bold(),
        summary.average_complexity,
        summary.average_nloc,
        style(summary.max_complexity).bold()
    );
    Ok(())
}

fn print_table(root: &Path, ranked: &[FunctionRecord]) {
    println!(
        "{:>4}  {:>4}  {:>5}  {}",
        style("CC").dim(),
        style("NLOC").dim(),
        style("#").dim(),
        style("FUNCTION").dim()
    );
    for (i, record) in ranked.iter().enumerate() {
        let cc = match record.complexity {
            c if c >= 15 => style(c).red().bold(),
            c if c >= 10 => style(c).yellow(),
            c => style(c).green(),
        };
        println!(
            "{:>4}  {:>4}  {:>5}  {} {}",
            cc,
            record.nloc,
            i + 1,
            style(&record.name).cyan(),
            style(format!(
                "{}:{}-{}",
                display_path(root, &record.file),
                record.start_line,
                record.end_line
            ))
            .dim()
        );
    }
}
