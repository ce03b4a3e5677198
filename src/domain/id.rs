//! Identifiers for tasks and blueprints
//!
//! ID Format:
//! - Task IDs: `t-{8-char-hash}` (e.g., `t-9d3e5f21`)
//! - Blueprint IDs: `b-{8-char-hash}` (e.g., `b-7f2b4c10`)
//!
//! The hash is derived from the title, the creation timestamp and a
//! process-local sequence number, so two tasks created in the same instant
//! with the same title still get different IDs.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const HASH_LEN: usize = 8;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid task ID format: expected 't-{{8-char-hash}}', got '{0}'")]
    InvalidTaskId(String),

    #[error("Invalid blueprint ID format: expected 'b-{{8-char-hash}}', got '{0}'")]
    InvalidBlueprintId(String),
}

/// Generates a short hex hash from title, timestamp and sequence
fn generate_hash(title: &str, timestamp: DateTime<Utc>) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let input = format!(
        "{}{}{}",
        title,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        seq
    );
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..HASH_LEN].to_string()
}

fn parse_hash(s: &str, prefix: &str) -> Option<String> {
    let hash = s.strip_prefix(prefix)?;
    if hash.len() == HASH_LEN && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash.to_ascii_lowercase())
    } else {
        None
    }
}

/// Task ID in the format `t-{8-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    hash: String,
}

impl TaskId {
    /// Creates a new task ID from title and timestamp
    pub fn new(title: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(title, timestamp),
        }
    }

    /// Returns the hash portion of the ID
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t-{}", self.hash)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        parse_hash(s, "t-")
            .map(|hash| Self { hash })
            .ok_or_else(|| IdError::InvalidTaskId(s.to_string()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// Blueprint ID in the format `b-{8-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlueprintId {
    hash: String,
}

impl BlueprintId {
    /// Creates a new blueprint ID from its title pattern and timestamp
    pub fn new(pattern: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(pattern, timestamp),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for BlueprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b-{}", self.hash)
    }
}

impl FromStr for BlueprintId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        parse_hash(s, "b-")
            .map(|hash| Self { hash })
            .ok_or_else(|| IdError::InvalidBlueprintId(s.to_string()))
    }
}

impl TryFrom<String> for BlueprintId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlueprintId> for String {
    fn from(id: BlueprintId) -> Self {
        id.to_string()
    }
}
