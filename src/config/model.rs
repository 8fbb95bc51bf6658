// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Flag-override file as read from TOML.
///
/// Each `[flags.<step>]` table maps flag names to values; the step key is
/// the step file's name without its extension (numeric prefix kept):
///
/// ```toml
/// [flags.200_generate_random_numbers]
/// output = "/tmp/randnums"
///
/// [flags.300_shuffle]
/// input = "/tmp/randnums"
/// output = "/tmp/randnums2"
/// ```
///
/// During discovery each entry becomes a `--name=value` flag appended to
/// the matching step's flag list.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FlagsFile {
    /// All `[flags.<step>]` tables, keyed by step name.
    #[serde(default)]
    pub flags: BTreeMap<String, BTreeMap<String, String>>,
}
