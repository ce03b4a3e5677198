//! Task priorities
//!
//! Seven ordered ranks, from `blocking` (rank 1, most urgent) down to
//! `parked` (rank 7). Sorting ascending puts the most urgent work first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriorityError {
    #[error("Invalid priority '{0}'. Must be one of: blocking, essential, important, moderate, background, optional, parked")]
    InvalidPriority(String),

    #[error("Priority rank {0} is out of range (1-7)")]
    OutOfRange(i32),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Blocking = 1,
    Essential = 2,
    Important = 3,
    Moderate = 4,
    Background = 5,
    Optional = 6,
    #[default]
    Parked = 7,
}

impl Priority {
    /// All ranks, most urgent first
    pub const ALL: [Priority; 7] = [
        Priority::Blocking,
        Priority::Essential,
        Priority::Important,
        Priority::Moderate,
        Priority::Background,
        Priority::Optional,
        Priority::Parked,
    ];

    /// Rank number (1 = most urgent)
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Looks up a priority by rank number
    pub fn from_rank(rank: i32) -> Result<Self, PriorityError> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| i32::from(p.rank()) == rank)
            .ok_or(PriorityError::OutOfRange(rank))
    }

    pub fn name(self) -> &'static str {
        match self {
            Priority::Blocking => "blocking",
            Priority::Essential => "essential",
            Priority::Important => "important",
            Priority::Moderate => "moderate",
            Priority::Background => "background",
            Priority::Optional => "optional",
            Priority::Parked => "parked",
        }
    }

    /// Moves `n` ranks toward `parked`
    pub fn checked_add(self, n: i32) -> Result<Self, PriorityError> {
        Self::from_rank(i32::from(self.rank()).saturating_add(n))
    }

    /// Moves `n` ranks toward `blocking`
    pub fn checked_sub(self, n: i32) -> Result<Self, PriorityError> {
        Self::from_rank(i32::from(self.rank()).saturating_sub(n))
    }

    /// One rank more urgent, staying at `blocking` once there
    pub fn escalated(self) -> Self {
        self.checked_sub(1).unwrap_or(Priority::Blocking)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Priority {
    type Err = PriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == needle)
            .ok_or_else(|| PriorityError::InvalidPriority(s.trim().to_string()))
    }
}
