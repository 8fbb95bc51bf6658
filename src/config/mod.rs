// src/config/mod.rs

//! Optional TOML flag-override file (`[flags.<step>]` tables).
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load and validate a flags file from disk (`loader.rs`).

pub mod loader;
pub mod model;

pub use loader::load_and_validate;
pub use model::FlagsFile;
