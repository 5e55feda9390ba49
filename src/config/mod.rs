//! Project-level configuration support
//!
//! Loads per-project configuration from `ccloop.toml` or `.ccloop.json` in
//! the project root. Every field has a default, so an empty or missing file
//! gives a working setup for a JavaScript project using ESLint and Mocha.
//!
//! # Configuration Format
//!
//! ```toml
//! # ccloop.toml
//!
//! [project]
//! code_dir = "src"
//!
//! [analysis]
//! extensions = ["js", "ts"]
//! exclude = ["node_modules", "dist"]
//!
//! [lint]
//! command = "npx eslint src"
//! timeout_secs = 30
//!
//! [tests]
//! command = "npx mocha"
//! line_pattern = 'src/.*\.js:(\d+):\d+'
//!
//! [sandbox]
//! prepare_command = "npm ci"
//!
//! [verification]
//! max_repairs_per_stage = 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the TOML config file looked up in the project root
pub const CONFIG_FILE_NAME: &str = "ccloop.toml";

/// Name of the JSON config file, tried when no TOML file exists
pub const JSON_CONFIG_FILE_NAME: &str = ".ccloop.json";

/// Directories and bundles never worth measuring
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "node_modules",
    "bower_components",
    "vendor",
    "dist",
    "coverage",
    "*.min.js",
    "*.bundle.js",
];

/// Full configuration for one project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub project: ProjectSection,
    pub analysis: AnalysisConfig,
    pub lint: LintConfig,
    pub tests: TestConfig,
    pub sandbox: SandboxConfig,
    pub verification: VerificationConfig,
}

/// Layout of the project being improved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Directory holding the source code, relative to the project root
    pub code_dir: PathBuf,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            code_dir: PathBuf::from("src"),
        }
    }
}

/// Complexity scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Extensions (without dot) of files to measure
    pub extensions: Vec<String>,
    /// Gitignore-style globs excluded from scans
    pub exclude: Vec<String>,
    /// File name snippets are parsed as; its extension picks the grammar
    pub snippet_name: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extensions: [
                "js", "jsx", "mjs", "cjs", "ts", "tsx", "py", "rs", "go", "java", "c", "h",
                "cpp", "cc", "cxx", "hpp", "hh", "hxx",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            snippet_name: "Snippet.js".to_string(),
        }
    }
}

/// Lint tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Shell command run in the sandbox
    pub command: String,
    /// Appended to `command`; `{report}` is replaced with `report_file`.
    /// Leave `{report}` out to have the tool print JSON to stdout.
    pub report_args: String,
    pub report_file: String,
    pub timeout_secs: u64,
    /// Reads code on stdin, prints the lint tool's JSON with fixed `output`
    pub autofix_command: String,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            command: "npx eslint .".to_string(),
            report_args: "--format json -o {report}".to_string(),
            report_file: "eslint-output.json".to_string(),
            timeout_secs: 30,
            autofix_command: "npx eslint --stdin --format json --fix-dry-run".to_string(),
        }
    }
}

/// Test suite invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    pub command: String,
    /// Appended to `command`; `{report}` is replaced with `report_file`
    pub report_args: String,
    pub report_file: String,
    pub timeout_secs: u64,
    /// Regex applied to each failure's stack; capture group 1 is the line
    pub line_pattern: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            command: "npx mocha".to_string(),
            report_args: "--reporter json --reporter-option output={report}".to_string(),
            report_file: "mocha-output.json".to_string(),
            timeout_secs: 30,
            line_pattern: r"\.js:(\d+):\d+".to_string(),
        }
    }
}

/// Sandbox copy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Appended to the project path to name the copy
    pub suffix: String,
    /// Run once in a fresh copy, e.g. `npm ci`
    pub prepare_command: Option<String>,
    pub prepare_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            suffix: "-copy".to_string(),
            prepare_command: None,
            prepare_timeout_secs: 600,
        }
    }
}

/// Retry policy of the verification engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub max_repairs_per_stage: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_repairs_per_stage: 1,
        }
    }
}

/// Load project configuration
///
/// Tries, in order:
/// 1. `ccloop.toml`
/// 2. `.ccloop.json`
///
/// A file that fails to parse is reported and skipped; with no usable file
/// the defaults apply.
pub fn load_config(project_path: &Path) -> LoopConfig {
    let toml_path = project_path.join(CONFIG_FILE_NAME);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", toml_path.display(), e);
            }
        }
    }

    let json_path = project_path.join(JSON_CONFIG_FILE_NAME);
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", json_path.display(), e);
            }
        }
    }

    debug!("No config found, using defaults");
    LoopConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<LoopConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: LoopConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<LoopConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: LoopConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests;
