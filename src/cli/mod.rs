//! CLI command definitions and handlers

mod autofix;
mod check;
mod copy;
mod init;
mod scan;
mod snippet;

use anyhow::{Context, Result};
use ccloop::config::{load_config, LoopConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// ccloop - measure complexity and verify refactorings
#[derive(Parser, Debug)]
#[command(name = "ccloop")]
#[command(
    version,
    about = "Measure function complexity and verify refactorings against lint, tests and complexity",
    after_help = "\
Examples:
  ccloop scan --top 10                 Ten most complex functions
  ccloop scan --format json            JSON output for scripting
  ccloop snippet - < fn.js             Complexity of a code fragment
  ccloop --path ../app copy            Create ../app-copy and prepare it
  ccloop lint                          Run the configured lint command"
)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(long, short = 'C', global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a ccloop.toml with the default settings
    Init,

    /// Rank the project's functions by cyclomatic complexity
    Scan {
        /// Show only the N most complex functions
        #[arg(long)]
        top: Option<usize>,

        /// Output format: text or json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Highest complexity among the functions of a code fragment
    Snippet {
        /// File holding the fragment, or - for stdin
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Recreate the project's sandbox copy and run the prepare command
    Copy,

    /// Run the configured lint command and list its findings
    Lint,

    /// Run the configured test command and list failing tests
    Test,

    /// Print the lint tool's automatic fixes for a file
    Autofix {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let root = project_root(&cli.path)?;
    let config = load_config(&root);

    match cli.command {
        Commands::Init => init::run(&root),
        Commands::Scan { top, format } => scan::run(&root, &config, top, &format),
        Commands::Snippet { file } => snippet::run(&config, &file),
        Commands::Copy => copy::run(&root, &config),
        Commands::Lint => check::run_lint(&root, &config),
        Commands::Test => check::run_tests(&root, &config),
        Commands::Autofix { file } => autofix::run(&root, &config, &file),
    }
}

fn project_root(path: &Path) -> Result<PathBuf> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }
    Ok(root)
}

/// Path relative to the project root for display
fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Directory holding the code, falling back to the root when absent
fn code_dir(root: &Path, config: &LoopConfig) -> PathBuf {
    let dir = root.join(&config.project.code_dir);
    if dir.is_dir() {
        dir
    } else {
        tracing::debug!(
            "{} not found, scanning project root",
            config.project.code_dir.display()
        );
        root.to_path_buf()
    }
}
