//! Copy command - recreate the sandbox

use anyhow::Result;
use ccloop::config::LoopConfig;
use ccloop::sandbox::SandboxManager;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, config: &LoopConfig) -> Result<()> {
    let manager = SandboxManager::from_config(&config.sandbox);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.set_message(match &config.sandbox.prepare_command {
        Some(command) => format!("Copying project and running `{}`...", command),
        None => "Copying project...".to_string(),
    });
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = manager.create_copy(root);
    spinner.finish_and_clear();

    let sandbox = result?;
    println!(
        "{} Sandbox ready at {}",
        style("✓").green(),
        style(sandbox.display()).cyan()
    );
    Ok(())
}
