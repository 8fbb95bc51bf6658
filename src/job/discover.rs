// src/job/discover.rs

//! Step discovery: turn a source (a directory of numbered scripts, or a
//! single exec command) into an ordered list of concurrent step groups.
//!
//! Directory entries matching `^[0-9]{3}_.+` are sorted lexicographically,
//! and that sort order *is* the execution order; consecutive entries
//! sharing a numeric prefix form one group. Ids are assigned 1..n across
//! the whole job regardless of grouping, so discovery over an unchanged
//! directory is idempotent.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::errors::ConfigError;
use crate::job::group::StepGroup;
use crate::job::step::Step;

/// Where a job's steps come from. Exactly one source exists per job by
/// construction.
#[derive(Debug, Clone)]
pub enum StepSource {
    /// Directory holding `NNN_*` step files.
    Dir(PathBuf),
    /// A single command string (`path flag1 flag2 ...`).
    Exec(String),
}

impl fmt::Display for StepSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepSource::Dir(dir) => write!(f, "{}", dir.display()),
            StepSource::Exec(cmd) => write!(f, "{cmd}"),
        }
    }
}

/// Per-step flag overrides keyed by step name (file stem with numeric
/// prefix kept), each mapping flag name → value.
pub type FlagMap = BTreeMap<String, BTreeMap<String, String>>;

/// Discover the ordered groups for `source`.
pub fn discover(source: &StepSource, flags: &FlagMap) -> Result<Vec<StepGroup>> {
    match source {
        StepSource::Dir(dir) => discover_dir(dir, flags),
        StepSource::Exec(cmd) => discover_exec(cmd, flags),
    }
}

fn discover_dir(dir: &Path, flags: &FlagMap) -> Result<Vec<StepGroup>> {
    // ASCII digits only, so every matched name also has a parseable
    // position number.
    let pattern = Regex::new(r"^[0-9]{3}_.+").context("compiling step name pattern")?;

    let mut names: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("listing step directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| pattern.is_match(name))
        .collect();
    // Lexicographic order is execution order; prefixes are zero-padded
    // by convention so this sorts numerically too.
    names.sort();

    let mut groups: Vec<StepGroup> = Vec::new();
    let mut current: Vec<Step> = Vec::new();
    let mut last_number: Option<u32> = None;
    let mut step_id = 0;

    for name in names {
        let stem = file_stem(&name);
        let number = position_number(&stem);
        step_id += 1;

        let step = Step::new(
            step_id,
            number,
            dir.join(&name),
            stem.clone(),
            flags_for(&stem, flags),
        );

        if last_number == Some(number) {
            current.push(step);
        } else {
            if !current.is_empty() {
                groups.push(StepGroup::new(current));
            }
            current = vec![step];
        }
        last_number = Some(number);
    }
    if !current.is_empty() {
        groups.push(StepGroup::new(current));
    }

    if groups.is_empty() {
        return Err(ConfigError::NoStepsFound {
            dir: dir.to_path_buf(),
        }
        .into());
    }

    debug!(
        groups = groups.len(),
        steps = groups.iter().map(|g| g.steps.len()).sum::<usize>(),
        "discovered steps from directory"
    );
    Ok(groups)
}

fn discover_exec(cmd: &str, flags: &FlagMap) -> Result<Vec<StepGroup>> {
    let mut parts = cmd.split_whitespace();
    let path = parts.next().ok_or(ConfigError::EmptyExec)?;

    let stem = file_stem(path);
    let number = position_number(&stem);

    let mut step_flags: Vec<String> = parts.map(str::to_string).collect();
    step_flags.extend(flags_for(&stem, flags));

    let step = Step::new(1, number, PathBuf::from(path), stem, step_flags);
    Ok(vec![StepGroup::new(vec![step])])
}

/// Flag overrides for `stem`, rendered as `--key=value` in key order.
fn flags_for(stem: &str, flags: &FlagMap) -> Vec<String> {
    flags
        .get(stem)
        .map(|kv| kv.iter().map(|(k, v)| format!("--{k}={v}")).collect())
        .unwrap_or_default()
}

/// File name with only the extension stripped; the numeric prefix stays,
/// matching the keys used in the flag map.
fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Position number from the first three characters; 0 when the name has
/// no numeric prefix (single-command mode).
fn position_number(stem: &str) -> u32 {
    stem.get(..3).and_then(|s| s.parse().ok()).unwrap_or(0)
}
