//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project management | `init`, `status`, `check`, `refresh` |
//! | Task | Work item management | `task add`, `task dep`, `task done` |
//! | Blueprint | Recurring work | `blueprint add`, `blueprint run` |
//! | Query | Task state queries | `ready`, `upcoming`, `overdue` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output; `RUST_LOG` overrides the
//! log filter:
//! ```bash
//! todo --verbose ready
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod blueprint;
mod output;
mod query;
mod session;
mod task;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
