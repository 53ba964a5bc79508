//! Data models: candidate regions and configuration.

pub mod candidate;
pub mod config;
