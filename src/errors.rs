// src/errors.rs

//! Crate-wide error aliases and configuration errors.
//!
//! Configuration problems get a structured `thiserror` enum so callers
//! can match on them; everything else propagates through `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

pub use anyhow::{Error, Result};

/// Errors raised before any step process is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no steps found in {dir:?} (expected files matching NNN_*)")]
    NoStepsFound { dir: PathBuf },

    #[error("exec command is empty")]
    EmptyExec,
}
