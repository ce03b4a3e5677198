//! # Storage Layer
//!
//! Persistence layer for the todo CLI with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks | JSONL (one JSON per line) | `.todo/tasks.jsonl` |
//! | Blueprints | JSONL (one JSON per line) | `.todo/blueprints.jsonl` |
//! | Config | TOML | `.todo/config.toml` |
//! | Blueprint imports | YAML | anywhere, read by `todo blueprint import` |
//!
//! ## Concurrency Safety
//!
//! - [`JsonlStore`] uses file locking (`fs2`) for concurrent access
//! - All writes are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a todo project
//! - [`TaskStore`] - Read/write task records as JSONL
//! - [`BlueprintStore`] - Read/write blueprints as JSONL
//! - [`Config`] - Project and global configuration

mod config;
mod jsonl;
mod project;

pub use config::{
    AutomationConfig, Config, ConfigError, EscalationConfig, GlobalConfig, OutputFormat,
    ProjectConfig,
};
pub use jsonl::{BlueprintStore, JsonlStore, TaskStore};
pub use project::{read_blueprint_file, Maintenance, Project, ProjectError};
