//! ccloop - complexity-driven refactoring verification
//!
//! Measures per-function cyclomatic complexity, keeps a disposable copy of
//! the project to experiment in, and decides whether a rewritten function
//! may replace the current one: it has to pass the lint tool, the test suite
//! and come out strictly simpler.

pub mod complexity;
pub mod config;
pub mod models;
pub mod sandbox;
pub mod tools;
pub mod verify;
