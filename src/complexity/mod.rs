//! Per-function cyclomatic complexity
//!
//! `ComplexityAnalyzer` walks a source tree (or a single code fragment),
//! parses recognized files with tree-sitter and reports one
//! [`FunctionRecord`] per function. The free functions in this module
//! aggregate and order scan results.
//!
//! Records are snapshots: after any change to the files, scan again.

mod languages;

pub use languages::{language_for_extension, ANONYMOUS};

use crate::config::AnalysisConfig;
use crate::models::{FunctionRecord, ProjectSummary};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by complexity analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("cannot aggregate an empty set of functions")]
    EmptyInput,

    #[error("no analyzable function found in snippet {snippet_name}")]
    NoFunctionFound { snippet_name: String },

    #[error("no grammar for {}", path.display())]
    UnsupportedLanguage { path: PathBuf },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid exclude pattern: {0}")]
    InvalidExclude(#[from] ignore::Error),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Computes complexity metrics over trees and snippets
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    extensions: Vec<String>,
    exclude: Vec<String>,
    snippet_name: String,
}

/// Normalize configured extensions, dropping those no grammar handles
fn supported_extensions<'a>(exts: impl Iterator<Item = &'a String>) -> Vec<String> {
    exts.map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| {
            let known = language_for_extension(e).is_some();
            if !known {
                warn!("No grammar for .{} files, ignoring that extension", e);
            }
            known
        })
        .collect()
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            extensions: supported_extensions(config.extensions.iter()),
            exclude: config.exclude.clone(),
            snippet_name: config.snippet_name.clone(),
        }
    }

    /// Restrict recognized files to these extensions
    pub fn with_extensions(mut self, exts: Vec<String>) -> Self {
        self.extensions = supported_extensions(exts.iter());
        self
    }

    /// Replace the exclude globs (gitignore syntax, relative to the scan root)
    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Synthetic file name used to pick a grammar for snippets
    pub fn with_snippet_name(mut self, name: impl Into<String>) -> Self {
        self.snippet_name = name.into();
        self
    }

    fn is_recognized(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.contains(&e))
    }

    /// Discover every function under `root`.
    ///
    /// Files that cannot be read or parsed are skipped with a warning; only an
    /// inaccessible root is an error. The order of the result is unspecified.
    pub fn scan(&self, root: &Path) -> AnalysisResult<Vec<FunctionRecord>> {
        std::fs::metadata(root).map_err(|source| AnalysisError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut overrides = OverrideBuilder::new(root);
        for pattern in &self.exclude {
            overrides.add(&format!("!{}", pattern))?;
        }
        let overrides = overrides.build()?;

        let files: Vec<PathBuf> = WalkBuilder::new(root)
            .standard_filters(false)
            .overrides(overrides)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| self.is_recognized(path))
            .collect();

        debug!("Scanning {} files under {}", files.len(), root.display());

        let records: Vec<FunctionRecord> = files
            .par_iter()
            .flat_map_iter(|path| match self.analyze_file(path) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    Vec::new()
                }
            })
            .collect();

        Ok(records)
    }

    /// Functions in one file on disk
    pub fn analyze_file(&self, path: &Path) -> AnalysisResult<Vec<FunctionRecord>> {
        let source = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.analyze_source(&source, path)
    }

    /// Functions in `source`, attributed to `path` (whose extension picks the grammar)
    pub fn analyze_source(&self, source: &str, path: &Path) -> AnalysisResult<Vec<FunctionRecord>> {
        let rules = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(languages::rules_for_extension)
            .ok_or_else(|| AnalysisError::UnsupportedLanguage {
                path: path.to_path_buf(),
            })?;
        rules.functions(source, path)
    }

    /// Highest complexity among the functions in a code fragment
    pub fn complexity_of_snippet(&self, code: &str) -> AnalysisResult<u32> {
        let functions = self.analyze_source(code, Path::new(&self.snippet_name))?;
        functions
            .iter()
            .map(|f| f.complexity)
            .max()
            .ok_or_else(|| {
                debug!("No function in snippet:\n{}", code);
                AnalysisError::NoFunctionFound {
                    snippet_name: self.snippet_name.clone(),
                }
            })
    }

    /// Current on-disk source of `record`, first-line indentation removed
    pub fn extract_source(record: &FunctionRecord) -> AnalysisResult<String> {
        let content = std::fs::read_to_string(&record.file).map_err(|source| AnalysisError::Io {
            path: record.file.clone(),
            source,
        })?;

        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let start = (record.start_line.max(1) as usize - 1).min(lines.len());
        let end = (record.end_line as usize).clamp(start, lines.len());

        let code = lines[start..end].concat();
        Ok(code.trim_start_matches([' ', '\t']).to_string())
    }
}

/// Arithmetic mean of the complexities
pub fn average_complexity(records: &[FunctionRecord]) -> AnalysisResult<f64> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    let total: u64 = records.iter().map(|r| r.complexity as u64).sum();
    Ok(total as f64 / records.len() as f64)
}

/// Most complex first; equal complexities keep their input order
pub fn rank_by_complexity(records: &[FunctionRecord]) -> Vec<FunctionRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by_key(|r| Reverse(r.complexity));
    ranked
}

/// Count and averages over one scan
pub fn summarize(records: &[FunctionRecord]) -> AnalysisResult<ProjectSummary> {
    let average_complexity = average_complexity(records)?;
    let total_nloc: u64 = records.iter().map(|r| r.nloc as u64).sum();
    Ok(ProjectSummary {
        function_count: records.len(),
        average_complexity,
        average_nloc: total_nloc as f64 / records.len() as f64,
        max_complexity: records.iter().map(|r| r.complexity).max().unwrap_or(0),
    })
}
