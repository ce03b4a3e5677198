//! Output formatting for CLI commands
//!
//! Results go to stdout as text or one JSON document per command. Warnings
//! and diagnostics go to stderr; diagnostics are `tracing` events, shown
//! with `--verbose` or a matching `RUST_LOG`.

use serde::Serialize;
use tracing::debug;

pub use crate::storage::OutputFormat;

/// Writes command results in the selected format
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints a confirmation line (`{"success": true, ...}` in JSON mode)
    pub fn success(&self, message: &str) {
        if self.is_json() {
            self.data(&serde_json::json!({ "success": true, "message": message }));
        } else {
            println!("{}", message);
        }
    }

    /// Prints the outcome of a mutation: `value` in JSON mode, `message` otherwise
    pub fn report<T: Serialize>(&self, value: &T, message: &str) {
        if self.is_json() {
            self.data(value);
        } else {
            println!("{}", message);
        }
    }

    /// Prints a warning to stderr without failing the command
    pub fn warning(&self, message: &str) {
        if self.is_json() {
            eprintln!("{}", serde_json::json!({ "warning": message }));
        } else {
            eprintln!("Warning: {}", message);
        }
    }

    /// Prints structured data; pretty-printed in text mode
    pub fn data<T: Serialize>(&self, data: &T) {
        let rendered = match self.format {
            OutputFormat::Text => serde_json::to_string_pretty(data),
            OutputFormat::Json => serde_json::to_string(data),
        };
        if let Ok(rendered) = rendered {
            println!("{}", rendered);
        }
    }

    pub fn verbose(&self, message: &str) {
        debug!("{}", message);
    }

    /// Diagnostic tagged with the step that produced it
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        debug!(step = context, "{}", message);
    }
}
