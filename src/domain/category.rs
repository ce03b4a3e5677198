//! Task categories
//!
//! Categories form a closed set. Tags are free-form but may not reuse a
//! category name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::task::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Philosophy,
    University,
    Work,
    Sport,
    Band,
    Reading,
    Room,
    Financial,
    Life,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Philosophy,
        Category::University,
        Category::Work,
        Category::Sport,
        Category::Band,
        Category::Reading,
        Category::Room,
        Category::Financial,
        Category::Life,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Philosophy => "Philosophy",
            Category::University => "University",
            Category::Work => "Work",
            Category::Sport => "Sport",
            Category::Band => "Band",
            Category::Reading => "Reading",
            Category::Room => "Room",
            Category::Financial => "Financial",
            Category::Life => "Life",
        }
    }

    /// Returns true if `name` spells a category (case-insensitive)
    pub fn is_category_name(name: &str) -> bool {
        let name = name.trim();
        Self::ALL.iter().any(|c| c.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TaskError::InvalidCategory(s.to_string()))
    }
}

impl TryFrom<String> for Category {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.name().to_string()
    }
}
