//! Configuration module
//!
//! Loading and saving the TOML configuration file.

pub mod config;
