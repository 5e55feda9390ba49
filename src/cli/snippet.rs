//! Snippet command - complexity of a code fragment

use anyhow::{Context, Result};
use ccloop::complexity::ComplexityAnalyzer;
use ccloop::config::LoopConfig;
use std::io::Read;
use std::path::Path;

pub fn run(config: &LoopConfig, file: &Path) -> Result<()> {
    let code = if file == Path::new("-") {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("Failed to read snippet from stdin")?;
        code
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    let analyzer = ComplexityAnalyzer::from_config(&config.analysis);
    let complexity = analyzer.complexity_of_snippet(&code)?;
    println!("{}", complexity);
    Ok(())
}
