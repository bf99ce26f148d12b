//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration, fills in defaults
//! for anything missing, and validates the result before the host starts.

pub mod config;
