//! Autofix command - print a file with the lint tool's fixes applied

use anyhow::{Context, Result};
use ccloop::config::LoopConfig;
use ccloop::tools::LintRunner;
use std::path::Path;

pub fn run(root: &Path, config: &LoopConfig, file: &Path) -> Result<()> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };
    let code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let fixed = LintRunner::from_config(&config.lint).autofix(root, &code)?;
    print!("{}", fixed);
    Ok(())
}
