// src/config/loader.rs

use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::config::model::FlagsFile;

/// Load a flag-override file and validate it.
///
/// Validation happens here, at configuration-error time, so a bad flag
/// file fails the run before anything is spawned or persisted.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<FlagsFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading flags file at {:?}", path))?;

    let flags: FlagsFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML flags from {:?}", path))?;

    validate(&flags)?;
    Ok(flags)
}

fn validate(flags: &FlagsFile) -> Result<()> {
    for (step, kv) in &flags.flags {
        if step.is_empty() {
            return Err(anyhow!("[flags] contains an empty step name"));
        }
        for name in kv.keys() {
            if name.is_empty() || name.contains(['=', ' ']) {
                return Err(anyhow!(
                    "flag name {name:?} for step '{step}' must be non-empty and free of '=' or spaces"
                ));
            }
        }
    }
    Ok(())
}
