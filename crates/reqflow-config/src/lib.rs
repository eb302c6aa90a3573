//! Configuration for reqflow
//!
//! Hierarchical configuration with discovery and precedence:
//! environment > file > defaults. The file is TOML with `[review]`, `[cache]`,
//! `[llm]` and `[storage]` sections.

mod config;

pub use config::*;
